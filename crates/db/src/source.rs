//! [`RecordSource`] over the entity tables, used by exports.

use async_trait::async_trait;
use estatecore_core::bulk::RecordSource;
use estatecore_core::entity::EntityType;
use estatecore_core::error::CoreError;
use estatecore_core::types::Record;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::models::maintenance_request::MaintenanceRequestFilter;
use crate::models::property::PropertyFilter;
use crate::models::tenant::TenantFilter;
use crate::models::user::UserFilter;
use crate::repositories::{MaintenanceRequestRepo, PropertyRepo, TenantRepo, UserRepo};
use crate::DbPool;

#[derive(Clone)]
pub struct PgRecordSource {
    pool: DbPool,
}

impl PgRecordSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSource for PgRecordSource {
    async fn fetch(
        &self,
        entity_type: EntityType,
        filters: &Record,
    ) -> Result<Vec<Record>, CoreError> {
        let pool = &self.pool;
        match entity_type {
            EntityType::Properties => {
                let filter: PropertyFilter = parse_filters(entity_type, filters)?;
                to_records(PropertyRepo::list(pool, &filter).await.map_err(storage)?)
            }
            EntityType::Tenants => {
                let filter: TenantFilter = parse_filters(entity_type, filters)?;
                to_records(TenantRepo::list(pool, &filter).await.map_err(storage)?)
            }
            EntityType::MaintenanceRequests => {
                let filter: MaintenanceRequestFilter = parse_filters(entity_type, filters)?;
                to_records(MaintenanceRequestRepo::list(pool, &filter).await.map_err(storage)?)
            }
            EntityType::Users => {
                let filter: UserFilter = parse_filters(entity_type, filters)?;
                to_records(UserRepo::list(pool, &filter).await.map_err(storage)?)
            }
        }
    }
}

/// Decode export filters into the entity's typed filter. Unknown keys are
/// rejected rather than silently ignored.
pub fn parse_filters<T: DeserializeOwned>(
    entity_type: EntityType,
    filters: &Record,
) -> Result<T, CoreError> {
    serde_json::from_value(Value::Object(filters.clone())).map_err(|e| {
        CoreError::Validation(format!("Invalid export filters for {entity_type}: {e}"))
    })
}

fn to_records<T: Serialize>(rows: Vec<T>) -> Result<Vec<Record>, CoreError> {
    rows.into_iter()
        .map(|row| match serde_json::to_value(row) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CoreError::Internal("Row did not serialise to an object".into())),
            Err(e) => Err(CoreError::Internal(format!("Failed to serialise row: {e}"))),
        })
        .collect()
}

fn storage(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Export query failed");
    CoreError::Storage(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::property::Property;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn filters_parse_into_typed_struct() {
        let filter: TenantFilter = parse_filters(
            EntityType::Tenants,
            &record(json!({"property_id": 3, "status": "active"})),
        )
        .unwrap();
        assert_eq!(filter.property_id, Some(3));
        assert_eq!(filter.status.as_deref(), Some("active"));
        assert_eq!(filter.is_active, None);
    }

    #[test]
    fn empty_filters_match_everything() {
        let filter: UserFilter = parse_filters(EntityType::Users, &Record::new()).unwrap();
        assert!(filter.role.is_none() && filter.is_active.is_none());
    }

    #[test]
    fn unknown_filter_keys_are_rejected() {
        let result: Result<PropertyFilter, _> =
            parse_filters(EntityType::Properties, &record(json!({"colour": "red"})));
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("colour"));
    }

    #[test]
    fn rows_become_records_in_column_order() {
        let now = chrono::Utc::now();
        let rows = vec![Property {
            id: 1,
            property_name: "Oak Court".into(),
            address: "1 Oak St".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip_code: "62701".into(),
            property_type: "apartment".into(),
            units: Some(12),
            rent_amount: None,
            square_feet: None,
            is_active: true,
            archived_at: None,
            created_at: now,
            updated_at: now,
        }];
        let records = to_records(rows).unwrap();
        let keys: Vec<_> = records[0].keys().take(3).cloned().collect();
        assert_eq!(keys, vec!["id", "property_name", "address"]);
        assert_eq!(records[0]["units"], json!(12));
        assert_eq!(records[0]["rent_amount"], Value::Null);
    }
}
