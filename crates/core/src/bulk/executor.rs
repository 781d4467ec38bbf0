//! Chunked, fault-isolated record execution.
//!
//! Records are split into contiguous chunks; each record goes through the
//! entity's [`RecordHandler`] on its own, so one failing record never
//! aborts its siblings. Progress is written to the [`OperationStore`] after
//! every chunk, and the cancellation token is checked before every chunk.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::operation::{OperationId, Progress, RecordFailure};
use super::tracker::OperationStore;
use crate::entity::{EntityType, OperationType};
use crate::error::CoreError;
use crate::types::Record;

/// Why a single record could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Record rejected: {0}")]
    Rejected(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Operation '{0}' is not supported for this entity")]
    Unsupported(OperationType),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Applies one operation to one record of a specific entity type.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    async fn apply(&self, operation_type: OperationType, record: &Record)
        -> Result<(), RecordError>;
}

/// Record handlers keyed by entity type.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EntityType, Arc<dyn RecordHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, entity_type: EntityType, handler: Arc<dyn RecordHandler>) -> Self {
        self.handlers.insert(entity_type, handler);
        self
    }

    pub fn get(&self, entity_type: EntityType) -> Option<Arc<dyn RecordHandler>> {
        self.handlers.get(&entity_type).cloned()
    }
}

/// Result of running one chunk.
#[derive(Debug, Default)]
pub struct ChunkOutcome {
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<RecordFailure>,
}

/// Apply `operation_type` to every record of a chunk.
///
/// `offset` is the index of the chunk's first record in the full list, so
/// reported indices refer to the full list.
pub async fn process_chunk(
    handler: &dyn RecordHandler,
    operation_type: OperationType,
    chunk: &[Record],
    offset: usize,
) -> ChunkOutcome {
    let mut outcome = ChunkOutcome::default();
    for (i, record) in chunk.iter().enumerate() {
        let index = offset + i;
        match handler.apply(operation_type, record).await {
            Ok(()) => outcome.successful += 1,
            Err(e) => {
                tracing::warn!(index, error = %e, "Bulk record failed");
                outcome.failed += 1;
                outcome
                    .errors
                    .push(RecordFailure::processing(index, record, e.to_string()));
            }
        }
    }
    outcome
}

/// Fixed parameters of one chunked run.
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlan {
    pub operation_id: OperationId,
    pub operation_type: OperationType,
    pub chunk_size: usize,
    /// Total records of the operation (including ones rejected earlier).
    pub total_records: usize,
    /// Records already accounted for before this run (validation rejects).
    pub already_processed: usize,
    pub already_failed: usize,
}

/// Aggregate result of a chunked run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionTotals {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub chunks: usize,
    /// The run stopped at a chunk boundary because of cancellation.
    pub cancelled: bool,
    /// Records the handler applied in a chunk whose progress write was
    /// refused because the operation had been cancelled meanwhile.
    pub applied_after_cancel: usize,
}

impl ExecutionTotals {
    pub fn progress(&self, total: usize) -> Progress {
        Progress::new(total, self.processed, self.successful, self.failed)
    }
}

/// Process `records` chunk by chunk, persisting progress after each chunk.
///
/// Stops before the next chunk if `cancel` fires or if the store refuses
/// the progress write (the operation was cancelled elsewhere). In the latter
/// case the chunk's applied records are reported in
/// [`ExecutionTotals::applied_after_cancel`].
pub async fn run_chunks(
    store: &dyn OperationStore,
    handler: &dyn RecordHandler,
    plan: ChunkPlan,
    records: &[Record],
    cancel: &CancellationToken,
) -> Result<ExecutionTotals, CoreError> {
    let mut totals = ExecutionTotals {
        processed: plan.already_processed,
        failed: plan.already_failed,
        ..Default::default()
    };

    for (chunk_index, chunk) in records.chunks(plan.chunk_size.max(1)).enumerate() {
        if cancel.is_cancelled() {
            tracing::info!(
                operation_id = %plan.operation_id,
                chunk = chunk_index,
                "Bulk operation cancelled at chunk boundary",
            );
            totals.cancelled = true;
            return Ok(totals);
        }

        let offset = chunk_index * plan.chunk_size.max(1);
        let outcome = process_chunk(handler, plan.operation_type, chunk, offset).await;

        totals.processed += chunk.len();
        totals.successful += outcome.successful;
        totals.failed += outcome.failed;
        totals.chunks += 1;

        let progress = totals
            .progress(plan.total_records)
            .with_errors(outcome.errors);
        tracing::debug!(
            operation_id = %plan.operation_id,
            chunk = chunk_index,
            processed = totals.processed,
            total = plan.total_records,
            progress = progress.progress_percentage,
            "Bulk chunk processed",
        );

        if !store.record_progress(plan.operation_id, &progress).await? {
            tracing::warn!(
                operation_id = %plan.operation_id,
                applied = outcome.successful,
                "Bulk operation no longer processing; chunk applied after cancellation",
            );
            totals.cancelled = true;
            totals.applied_after_cancel = outcome.successful;
            return Ok(totals);
        }
    }

    Ok(totals)
}
