//! Bulk operation row model and DTOs.
//!
//! Maps to the `bulk_operations` table and its `bulk_operation_types` /
//! `bulk_operation_statuses` lookup tables.

use estatecore_core::bulk::{Operation, Progress, RecordFailure};
use estatecore_core::entity::EntityType;
use estatecore_core::error::CoreError;
use estatecore_core::types::{DbId, Record, Timestamp};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::status::{BulkOperationStatus, BulkOperationType, StatusId};

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A row from the `bulk_operations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BulkOperationRow {
    pub id: Uuid,
    pub operation_type_id: StatusId,
    pub entity_type: String,
    pub status_id: StatusId,
    pub created_by: Option<DbId>,
    pub total_records: i64,
    pub processed_records: i64,
    pub successful_records: i64,
    pub failed_records: i64,
    pub progress_percentage: f64,
    pub parameters: serde_json::Value,
    pub results: serde_json::Value,
    pub errors: serde_json::Value,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<BulkOperationRow> for Operation {
    type Error = CoreError;

    fn try_from(row: BulkOperationRow) -> Result<Self, Self::Error> {
        let status = BulkOperationStatus::from_id(row.status_id).ok_or_else(|| {
            CoreError::Storage(format!("Unknown bulk operation status id {}", row.status_id))
        })?;
        let operation_type = BulkOperationType::from_id(row.operation_type_id).ok_or_else(|| {
            CoreError::Storage(format!(
                "Unknown bulk operation type id {}",
                row.operation_type_id
            ))
        })?;
        let errors: Vec<RecordFailure> = serde_json::from_value(row.errors)
            .map_err(|e| CoreError::Storage(format!("Corrupt bulk operation errors: {e}")))?;

        Ok(Operation {
            id: row.id,
            operation_type: operation_type.into(),
            entity_type: EntityType::from_str_value(&row.entity_type)?,
            status: status.into(),
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_by: row.created_by,
            total_records: row.total_records,
            processed_records: row.processed_records,
            successful_records: row.successful_records,
            failed_records: row.failed_records,
            parameters: into_record(row.parameters),
            results: into_record(row.results),
            errors,
            progress_percentage: row.progress_percentage,
        })
    }
}

fn into_record(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Record::new(),
    }
}

// ---------------------------------------------------------------------------
// Create DTO
// ---------------------------------------------------------------------------

/// DTO for inserting a new bulk operation.
#[derive(Debug)]
pub struct CreateBulkOperation {
    pub id: Uuid,
    pub operation_type_id: StatusId,
    pub entity_type: String,
    pub status_id: StatusId,
    pub created_by: Option<DbId>,
    pub parameters: serde_json::Value,
    pub created_at: Timestamp,
}

impl From<&Operation> for CreateBulkOperation {
    fn from(op: &Operation) -> Self {
        Self {
            id: op.id,
            operation_type_id: BulkOperationType::from(op.operation_type).id(),
            entity_type: op.entity_type.as_str().to_string(),
            status_id: BulkOperationStatus::from(op.status).id(),
            created_by: op.created_by,
            parameters: serde_json::Value::Object(op.parameters.clone()),
            created_at: op.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress DTO
// ---------------------------------------------------------------------------

/// Counter snapshot plus the failures to append to `errors`.
#[derive(Debug)]
pub struct BulkProgressUpdate {
    pub total_records: i64,
    pub processed_records: i64,
    pub successful_records: i64,
    pub failed_records: i64,
    pub progress_percentage: f64,
    /// JSON array appended to the stored `errors` array.
    pub new_errors: serde_json::Value,
}

impl From<&Progress> for BulkProgressUpdate {
    fn from(p: &Progress) -> Self {
        Self {
            total_records: p.total_records,
            processed_records: p.processed_records,
            successful_records: p.successful_records,
            failed_records: p.failed_records,
            progress_percentage: p.progress_percentage,
            new_errors: failures_json(&p.new_errors),
        }
    }
}

/// Serialise failures to a JSON array (empty array on failure).
pub fn failures_json(failures: &[RecordFailure]) -> serde_json::Value {
    serde_json::to_value(failures).unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
}
