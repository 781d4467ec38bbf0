//! [`RecordHandler`] implementations that apply bulk records to the entity
//! tables.

use std::sync::Arc;

use async_trait::async_trait;
use estatecore_core::bulk::{HandlerRegistry, RecordError, RecordHandler};
use estatecore_core::entity::{EntityType, OperationType};
use estatecore_core::types::{DbId, Record};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::maintenance_request::{CreateMaintenanceRequest, UpdateMaintenanceRequest};
use crate::models::property::{CreateProperty, UpdateProperty};
use crate::models::tenant::{CreateTenant, UpdateTenant};
use crate::models::user::{CreateUser, UpdateUser};
use crate::repositories::{
    LifecycleRepo, MaintenanceRequestRepo, PropertyRepo, TenantRepo, UserRepo,
};
use crate::DbPool;

/// Applies one record of one entity type per call.
pub struct EntityRecordHandler {
    pool: DbPool,
    entity_type: EntityType,
}

impl EntityRecordHandler {
    pub fn new(pool: DbPool, entity_type: EntityType) -> Self {
        Self { pool, entity_type }
    }

    async fn create(&self, record: &Record) -> Result<(), RecordError> {
        let pool = &self.pool;
        match self.entity_type {
            EntityType::Properties => {
                PropertyRepo::create(pool, &decode::<CreateProperty>(record)?).await.map_err(record_error)?;
            }
            EntityType::Tenants => {
                TenantRepo::create(pool, &decode::<CreateTenant>(record)?).await.map_err(record_error)?;
            }
            EntityType::MaintenanceRequests => {
                MaintenanceRequestRepo::create(pool, &decode::<CreateMaintenanceRequest>(record)?)
                    .await.map_err(record_error)?;
            }
            EntityType::Users => {
                UserRepo::create(pool, &decode::<CreateUser>(record)?).await.map_err(record_error)?;
            }
        }
        Ok(())
    }

    async fn update(&self, id: DbId, record: &Record) -> Result<(), RecordError> {
        let pool = &self.pool;
        let found = match self.entity_type {
            EntityType::Properties => {
                PropertyRepo::update(pool, id, &decode::<UpdateProperty>(record)?)
                    .await.map_err(record_error)?
                    .is_some()
            }
            EntityType::Tenants => {
                TenantRepo::update(pool, id, &decode::<UpdateTenant>(record)?)
                    .await.map_err(record_error)?
                    .is_some()
            }
            EntityType::MaintenanceRequests => {
                let input = decode::<UpdateMaintenanceRequest>(record)?;
                MaintenanceRequestRepo::update(pool, id, &input)
                    .await.map_err(record_error)?
                    .is_some()
            }
            EntityType::Users => {
                UserRepo::update(pool, id, &decode::<UpdateUser>(record)?)
                    .await.map_err(record_error)?
                    .is_some()
            }
        };
        self.found(found, id)
    }

    fn found(&self, found: bool, id: DbId) -> Result<(), RecordError> {
        if found {
            Ok(())
        } else {
            Err(RecordError::NotFound(format!("{} {id}", self.entity_type)))
        }
    }
}

#[async_trait]
impl RecordHandler for EntityRecordHandler {
    async fn apply(
        &self,
        operation_type: OperationType,
        record: &Record,
    ) -> Result<(), RecordError> {
        let pool = &self.pool;
        let entity = self.entity_type;
        match operation_type {
            OperationType::Create | OperationType::Import => self.create(record).await,
            OperationType::Update => self.update(record_id(record)?, record).await,
            OperationType::Delete => {
                let id = record_id(record)?;
                self.found(LifecycleRepo::hard_delete(pool, entity, id).await.map_err(record_error)?, id)
            }
            OperationType::Archive => {
                let id = record_id(record)?;
                self.found(LifecycleRepo::archive(pool, entity, id).await.map_err(record_error)?, id)
            }
            OperationType::Activate => {
                let id = record_id(record)?;
                self.found(LifecycleRepo::activate(pool, entity, id).await.map_err(record_error)?, id)
            }
            OperationType::Deactivate => {
                let id = record_id(record)?;
                self.found(LifecycleRepo::deactivate(pool, entity, id).await.map_err(record_error)?, id)
            }
            OperationType::Export => Err(RecordError::Unsupported(operation_type)),
        }
    }
}

/// One handler per entity type, all sharing `pool`.
pub fn handler_registry(pool: DbPool) -> HandlerRegistry {
    EntityType::ALL
        .into_iter()
        .fold(HandlerRegistry::new(), |registry, entity_type| {
            registry.register(
                entity_type,
                Arc::new(EntityRecordHandler::new(pool.clone(), entity_type)),
            )
        })
}

/// Read the target row id: an integer or a numeric string.
pub fn record_id(record: &Record) -> Result<DbId, RecordError> {
    let id = match record.get("id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<DbId>().ok(),
        _ => None,
    };
    match id {
        Some(id) if id > 0 => Ok(id),
        _ => Err(RecordError::Rejected("Record has no valid 'id'".to_string())),
    }
}

fn decode<T: DeserializeOwned>(record: &Record) -> Result<T, RecordError> {
    serde_json::from_value(Value::Object(record.clone()))
        .map_err(|e| RecordError::Rejected(format!("Invalid record: {e}")))
}

fn record_error(err: sqlx::Error) -> RecordError {
    if let sqlx::Error::Database(db_err) = &err {
        // unique, foreign key and check violations are the record's fault
        if let Some(code @ ("23505" | "23503" | "23514")) = db_err.code().as_deref() {
            let constraint = db_err.constraint().unwrap_or("constraint");
            return RecordError::Rejected(format!("Violates {constraint} ({code})"));
        }
    }
    RecordError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn id_accepts_numbers_and_numeric_strings() {
        assert_eq!(record_id(&record(json!({"id": 7}))).unwrap(), 7);
        assert_eq!(record_id(&record(json!({"id": " 12 "}))).unwrap(), 12);
    }

    #[test]
    fn id_rejects_missing_or_bad_values() {
        assert_matches!(record_id(&record(json!({}))), Err(RecordError::Rejected(_)));
        assert_matches!(record_id(&record(json!({"id": "x"}))), Err(RecordError::Rejected(_)));
        assert_matches!(record_id(&record(json!({"id": 0}))), Err(RecordError::Rejected(_)));
        assert_matches!(record_id(&record(json!({"id": 1.5}))), Err(RecordError::Rejected(_)));
    }

    #[test]
    fn decode_ignores_extra_columns() {
        let input: CreateUser = decode(&record(json!({
            "username": "ada",
            "email": "ada@example.com",
            "role": "admin",
            "notes": "extra",
        })))
        .unwrap();
        assert_eq!(input.username, "ada");
        assert_eq!(input.first_name, None);
    }

    #[test]
    fn decode_reports_missing_fields_as_rejections() {
        let result = decode::<CreateProperty>(&record(json!({"city": "Springfield"})));
        assert_matches!(result, Err(RecordError::Rejected(msg)) if msg.contains("missing field"));
    }

    #[test]
    fn non_database_errors_are_storage_errors() {
        assert_matches!(record_error(sqlx::Error::PoolTimedOut), RecordError::Storage(_));
    }
}
