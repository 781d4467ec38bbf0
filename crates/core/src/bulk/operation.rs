//! Bulk operation record, summaries and execution results.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{EntityType, OperationStatus, OperationType};
use crate::types::{DbId, Record, Timestamp};
use crate::validation::rules::{FieldError, InvalidRecord};

/// Opaque operation identifier (UUID v7, so ids sort by creation time).
pub type OperationId = Uuid;

/// Input for creating a new operation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOperation {
    pub operation_type: OperationType,
    pub entity_type: EntityType,
    #[serde(default)]
    pub created_by: Option<DbId>,
    #[serde(default)]
    pub parameters: Record,
}

/// One bulk job and everything known about its progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub operation_type: OperationType,
    pub entity_type: EntityType,
    pub status: OperationStatus,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_by: Option<DbId>,
    pub total_records: i64,
    pub processed_records: i64,
    pub successful_records: i64,
    pub failed_records: i64,
    pub parameters: Record,
    pub results: Record,
    pub errors: Vec<RecordFailure>,
    pub progress_percentage: f64,
}

impl Operation {
    /// A fresh operation in `queued` state with zeroed counters.
    pub fn new(input: NewOperation) -> Self {
        Self {
            id: Uuid::now_v7(),
            operation_type: input.operation_type,
            entity_type: input.entity_type,
            status: OperationStatus::Queued,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            created_by: input.created_by,
            total_records: 0,
            processed_records: 0,
            successful_records: 0,
            failed_records: 0,
            parameters: input.parameters,
            results: Record::new(),
            errors: Vec::new(),
            progress_percentage: 0.0,
        }
    }

    pub fn summary(&self) -> OperationSummary {
        OperationSummary {
            id: self.id,
            operation_type: self.operation_type,
            entity_type: self.entity_type,
            status: self.status,
            created_at: self.created_at,
            completed_at: self.completed_at,
            total_records: self.total_records,
            successful_records: self.successful_records,
            failed_records: self.failed_records,
            progress_percentage: self.progress_percentage,
            created_by: self.created_by,
        }
    }

    /// Apply a counter snapshot. Counters are last-write-wins.
    pub fn apply_progress(&mut self, progress: &Progress) {
        self.total_records = progress.total_records;
        self.processed_records = progress.processed_records;
        self.successful_records = progress.successful_records;
        self.failed_records = progress.failed_records;
        self.progress_percentage = progress.progress_percentage;
        self.errors.extend(progress.new_errors.iter().cloned());
    }
}

/// Listing view of an operation. Timestamps serialise as ISO-8601.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub id: OperationId,
    pub operation_type: OperationType,
    pub entity_type: EntityType,
    pub status: OperationStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub total_records: i64,
    pub successful_records: i64,
    pub failed_records: i64,
    pub progress_percentage: f64,
    pub created_by: Option<DbId>,
}

/// Why one record (or the whole batch) failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Position in the list handed to the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// 1-based row in the submitted batch (validation failures).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

impl RecordFailure {
    pub fn processing(index: usize, record: &Record, message: String) -> Self {
        Self {
            index: Some(index),
            row: None,
            record: Some(record.clone()),
            message,
            field_errors: Vec::new(),
        }
    }

    pub fn validation(invalid: &InvalidRecord) -> Self {
        let fields: Vec<&str> = invalid.errors.iter().map(|e| e.field.as_str()).collect();
        Self {
            index: None,
            row: Some(invalid.row),
            record: Some(invalid.record.clone()),
            message: format!("Validation failed for: {}", fields.join(", ")),
            field_errors: invalid.errors.clone(),
        }
    }

    /// A batch-level failure not tied to any record.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            index: None,
            row: None,
            record: None,
            message: message.into(),
            field_errors: Vec::new(),
        }
    }
}

/// Counter snapshot written after every chunk.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Progress {
    pub total_records: i64,
    pub processed_records: i64,
    pub successful_records: i64,
    pub failed_records: i64,
    pub progress_percentage: f64,
    /// Failures discovered since the previous snapshot; appended, not replaced.
    pub new_errors: Vec<RecordFailure>,
}

impl Progress {
    pub fn new(total: usize, processed: usize, successful: usize, failed: usize) -> Self {
        Self {
            total_records: total as i64,
            processed_records: processed as i64,
            successful_records: successful as i64,
            failed_records: failed as i64,
            progress_percentage: progress_percentage(processed, total),
            new_errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<RecordFailure>) -> Self {
        self.new_errors = errors;
        self
    }
}

/// Terminal write for an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub status: OperationStatus,
    /// Final counters; `None` leaves the last snapshot untouched.
    pub progress: Option<Progress>,
    pub results: Record,
    /// Appended to the operation's error list.
    pub errors: Vec<RecordFailure>,
}

impl Completion {
    /// A batch-fatal failure: counters stay as they were.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Failed,
            progress: None,
            results: Record::new(),
            errors: vec![RecordFailure::fatal(message)],
        }
    }
}

/// `processed / total × 100`, clamped to 0..=100. An empty batch is done.
pub fn progress_percentage(processed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (processed as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Summary returned to the caller once an execution call finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperationResult {
    pub operation_id: OperationId,
    pub status: OperationStatus,
    pub success: bool,
    pub total_processed: i64,
    pub successful: i64,
    pub failed: i64,
    pub errors: Vec<RecordFailure>,
    pub execution_time_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

impl BulkOperationResult {
    pub fn from_operation(
        operation: &Operation,
        execution_time_secs: f64,
        output_file: Option<PathBuf>,
    ) -> Self {
        Self {
            operation_id: operation.id,
            status: operation.status,
            success: operation.status == OperationStatus::Completed,
            total_processed: operation.processed_records,
            successful: operation.successful_records,
            failed: operation.failed_records,
            errors: operation.errors.clone(),
            execution_time_secs,
            output_file,
        }
    }
}
