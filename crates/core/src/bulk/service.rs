//! The bulk operations service.
//!
//! [`BulkOperations`] is built once at startup and shared by reference. It
//! owns the operation store, the per-entity record handlers, the exporter,
//! the concurrency permits and the cancellation tokens of in-flight runs.
//!
//! Every run holds a [`RunSlot`] for its operation. [`BulkOperations::reserve`]
//! hands out at most one slot per operation id, so a second submission for
//! the same operation is refused before any work starts. A run then goes
//! through these steps on the caller's task:
//!
//! 1. the operation must exist, be `queued` and match the job kind;
//! 2. it waits (still `queued`) for one of `max_concurrent_operations`
//!    permits, aborting if cancelled meanwhile;
//! 3. it moves to `processing`, validates, runs chunks, and finishes in
//!    exactly one terminal status.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::config::BulkConfig;
use super::executor::{run_chunks, ChunkPlan, HandlerRegistry};
use super::export::{Exporter, RecordSource};
use super::operation::{
    BulkOperationResult, Completion, NewOperation, Operation, OperationId, OperationSummary,
    Progress, RecordFailure,
};
use super::payload::{parse_payload, read_upload, PayloadFormat};
use super::tracker::{clamp_limit, summarize, OperationStore};
use crate::entity::{EntityType, OperationStatus, OperationType};
use crate::error::CoreError;
use crate::types::{DbId, Record};
use crate::validation::evaluator::coerce_record;
use crate::validation::{validate_with, RuleSet, ValidationMode, ValidationResult};

type RunningMap = Mutex<HashMap<OperationId, CancellationToken>>;

/// The input of one run.
pub enum Job<'a> {
    /// Records already in memory.
    Records(Vec<Record>),
    /// A raw CSV/JSON upload.
    Payload { bytes: &'a [u8], format: PayloadFormat },
    /// A file name inside the upload directory.
    File(&'a str),
    Export { filters: Record, format: &'a str },
}

impl Job<'_> {
    fn is_export(&self) -> bool {
        matches!(self, Job::Export { .. })
    }
}

/// How a run ended before the terminal write.
enum RunEnd {
    Finished {
        completion: Completion,
        output_file: Option<PathBuf>,
    },
    /// Stopped by cancellation; `notes` are merged into the results of the
    /// cancelled operation.
    Cancelled { notes: Record },
}

pub struct BulkOperations {
    config: BulkConfig,
    store: Arc<dyn OperationStore>,
    handlers: HandlerRegistry,
    exporter: Exporter,
    permits: Arc<Semaphore>,
    running: Arc<RunningMap>,
    shutdown: CancellationToken,
}

impl BulkOperations {
    pub fn new(
        config: BulkConfig,
        store: Arc<dyn OperationStore>,
        handlers: HandlerRegistry,
        source: Arc<dyn RecordSource>,
    ) -> Self {
        let exporter = Exporter::new(source, config.output_dir.clone());
        let permits = Arc::new(Semaphore::new(config.max_concurrent_operations.max(1)));
        Self {
            config,
            store,
            handlers,
            exporter,
            permits,
            running: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    /// Number of reserved runs (spawning, waiting for a permit or executing).
    pub fn in_flight(&self) -> usize {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    // -----------------------------------------------------------------------
    // Tracking
    // -----------------------------------------------------------------------

    /// Register a new `queued` operation.
    pub async fn create_operation(&self, input: NewOperation) -> Result<OperationId, CoreError> {
        let operation = Operation::new(input);
        self.store.insert(&operation).await?;
        tracing::info!(
            operation_id = %operation.id,
            operation_type = %operation.operation_type,
            entity_type = %operation.entity_type,
            created_by = ?operation.created_by,
            "Bulk operation created",
        );
        Ok(operation.id)
    }

    pub async fn get_status(&self, id: OperationId) -> Result<Option<Operation>, CoreError> {
        self.store.get(id).await
    }

    /// Summaries newest first, optionally for one owner.
    pub async fn list(
        &self,
        created_by: Option<DbId>,
        limit: Option<usize>,
    ) -> Result<Vec<OperationSummary>, CoreError> {
        let operations = self.store.list(created_by, clamp_limit(limit)).await?;
        Ok(summarize(&operations))
    }

    /// Cancel a queued or processing operation.
    ///
    /// Returns `Ok(false)` if the operation is already terminal. A running
    /// execution stops before its next chunk; a queued one stops waiting.
    pub async fn cancel(&self, id: OperationId) -> Result<bool, CoreError> {
        let cancelled = self.store.cancel(id).await?;
        if cancelled {
            if let Some(token) = self
                .running
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&id)
            {
                token.cancel();
            }
            tracing::info!(operation_id = %id, "Bulk operation cancelled");
        }
        Ok(cancelled)
    }

    /// Cancel every in-flight run. Runs stop at their next chunk boundary
    /// and end `cancelled`.
    pub fn shutdown(&self) {
        tracing::info!(in_flight = self.in_flight(), "Shutting down bulk operations");
        self.shutdown.cancel();
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(
        &self,
        entity_type: EntityType,
        mode: ValidationMode,
        records: &[Record],
    ) -> ValidationResult {
        let rules = RuleSet::for_entity(entity_type).for_mode(mode);
        validate_with(&rules, records)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Check that `id` can be run by a records call (`export == false`) or
    /// an export call, without changing anything.
    pub async fn ensure_runnable(
        &self,
        id: OperationId,
        export: bool,
    ) -> Result<Operation, CoreError> {
        let operation = self
            .store
            .get(id)
            .await?
            .ok_or(CoreError::OperationNotFound(id))?;

        if operation.status != OperationStatus::Queued {
            return Err(CoreError::Conflict(format!(
                "Bulk operation {id} is {}, only queued operations can run",
                operation.status
            )));
        }

        let is_export = operation.operation_type == OperationType::Export;
        if is_export != export {
            let expected = if is_export { "an export" } else { "a record submission" };
            return Err(CoreError::Validation(format!(
                "Bulk operation {id} is a {} operation and expects {expected}",
                operation.operation_type
            )));
        }

        Ok(operation)
    }

    /// Claim the single run slot of `id`.
    ///
    /// Fails with `Conflict` while another run of the same operation holds
    /// its slot. The slot is released when dropped.
    pub fn reserve(&self, id: OperationId) -> Result<RunSlot, CoreError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.contains_key(&id) {
            return Err(CoreError::Conflict(format!(
                "Bulk operation {id} has already been submitted"
            )));
        }
        let token = self.shutdown.child_token();
        running.insert(id, token.clone());
        Ok(RunSlot {
            running: Arc::clone(&self.running),
            id,
            token,
        })
    }

    /// Apply the operation to an in-memory record list.
    pub async fn execute_records(
        &self,
        id: OperationId,
        records: Vec<Record>,
    ) -> Result<BulkOperationResult, CoreError> {
        self.execute(self.reserve(id)?, Job::Records(records)).await
    }

    /// Apply the operation to a raw CSV/JSON upload.
    pub async fn execute_payload(
        &self,
        id: OperationId,
        bytes: &[u8],
        format: PayloadFormat,
    ) -> Result<BulkOperationResult, CoreError> {
        self.execute(self.reserve(id)?, Job::Payload { bytes, format })
            .await
    }

    /// Apply the operation to a file in the upload directory.
    pub async fn execute_file(
        &self,
        id: OperationId,
        file_name: &str,
    ) -> Result<BulkOperationResult, CoreError> {
        self.execute(self.reserve(id)?, Job::File(file_name)).await
    }

    /// Run an export operation.
    pub async fn export(
        &self,
        id: OperationId,
        filters: Record,
        format: &str,
    ) -> Result<BulkOperationResult, CoreError> {
        self.execute(self.reserve(id)?, Job::Export { filters, format })
            .await
    }

    /// Run `job` for the operation `slot` was reserved for.
    pub async fn execute(
        &self,
        slot: RunSlot,
        job: Job<'_>,
    ) -> Result<BulkOperationResult, CoreError> {
        let started = Instant::now();
        let id = slot.id;
        let operation = self.ensure_runnable(id, job.is_export()).await?;
        let token = slot.token.clone();

        // Stay queued until a permit is free.
        let permit = tokio::select! {
            biased;
            () = token.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => Some(permit.map_err(|_| {
                CoreError::Internal("Bulk execution permits are closed".into())
            })?),
        };
        if permit.is_none() {
            tracing::info!(operation_id = %id, "Bulk operation cancelled while queued");
            self.store.cancel(id).await?;
            return self.result(id, started, None).await;
        }

        if !self.store.mark_started(id).await? {
            let current = self.store.get(id).await?;
            return match current {
                Some(op) if op.status == OperationStatus::Cancelled => {
                    self.result(id, started, None).await
                }
                _ => Err(CoreError::Conflict(format!(
                    "Bulk operation {id} was started by another caller"
                ))),
            };
        }
        tracing::info!(
            operation_id = %id,
            operation_type = %operation.operation_type,
            entity_type = %operation.entity_type,
            "Bulk operation started",
        );

        let max_bytes = self.config.max_file_size_bytes();
        let end = match job {
            Job::Export { filters, format } => self.run_export(&operation, &filters, format).await,
            Job::Records(records) => self.run_records(&operation, records, &token).await,
            Job::Payload { bytes, format } => match parse_payload(bytes, format, max_bytes) {
                Ok(records) => self.run_records(&operation, records, &token).await,
                Err(e) => Err(e),
            },
            Job::File(name) => match read_upload(&self.config.upload_dir, name, max_bytes).await {
                Ok(records) => self.run_records(&operation, records, &token).await,
                Err(e) => Err(e),
            },
        };

        let output_file = match end {
            Ok(RunEnd::Finished {
                completion,
                output_file,
            }) => {
                self.store.finish(id, &completion).await?;
                tracing::info!(
                    operation_id = %id,
                    status = %completion.status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Bulk operation finished",
                );
                output_file
            }
            Ok(RunEnd::Cancelled { notes }) => {
                self.store.cancel(id).await?;
                if !notes.is_empty() {
                    self.store.note_results(id, &notes).await?;
                }
                tracing::info!(operation_id = %id, "Bulk operation stopped after cancellation");
                None
            }
            Err(e) => {
                tracing::error!(operation_id = %id, error = %e, "Bulk operation failed");
                self.store.finish(id, &Completion::failed(e.to_string())).await?;
                None
            }
        };

        drop(slot);
        self.result(id, started, output_file).await
    }

    async fn run_records(
        &self,
        operation: &Operation,
        records: Vec<Record>,
        token: &CancellationToken,
    ) -> Result<RunEnd, CoreError> {
        let handler = self.handlers.get(operation.entity_type).ok_or_else(|| {
            CoreError::Configuration(format!(
                "No record handler registered for {}",
                operation.entity_type
            ))
        })?;

        let rules = RuleSet::for_entity(operation.entity_type)
            .for_mode(validation_mode(operation.operation_type));
        let validation = validate_with(&rules, &records);

        let total = records.len();
        let rejected = validation.invalid_records.len();
        let rejections: Vec<RecordFailure> = validation
            .invalid_records
            .iter()
            .map(RecordFailure::validation)
            .collect();

        let snapshot = Progress::new(total, rejected, 0, rejected).with_errors(rejections);
        if !self.store.record_progress(operation.id, &snapshot).await? {
            return Ok(RunEnd::Cancelled {
                notes: Record::new(),
            });
        }

        let mut results = Record::new();
        results.insert("validated_records".into(), json!(validation.valid_records.len()));
        results.insert("rejected_records".into(), json!(rejected));
        results.insert(
            "warnings".into(),
            serde_json::to_value(&validation.warnings).unwrap_or(Value::Null),
        );

        if total > 0 && validation.valid_records.is_empty() {
            tracing::warn!(
                operation_id = %operation.id,
                total,
                "No record passed validation",
            );
            return Ok(RunEnd::Finished {
                completion: Completion {
                    status: OperationStatus::Failed,
                    progress: None,
                    results,
                    errors: Vec::new(),
                },
                output_file: None,
            });
        }

        let valid: Vec<Record> = validation
            .valid_records
            .iter()
            .map(|r| coerce_record(&rules, r))
            .collect();

        let plan = ChunkPlan {
            operation_id: operation.id,
            operation_type: operation.operation_type,
            chunk_size: self.config.chunk_size,
            total_records: total,
            already_processed: rejected,
            already_failed: rejected,
        };
        let totals = run_chunks(self.store.as_ref(), handler.as_ref(), plan, &valid, token).await?;
        if totals.cancelled {
            let mut notes = Record::new();
            if totals.applied_after_cancel > 0 {
                notes.insert(
                    "applied_after_cancel".into(),
                    json!(totals.applied_after_cancel),
                );
            }
            return Ok(RunEnd::Cancelled { notes });
        }

        results.insert("chunks".into(), json!(totals.chunks));
        let status = if totals.failed == 0 {
            OperationStatus::Completed
        } else {
            OperationStatus::PartialSuccess
        };

        Ok(RunEnd::Finished {
            completion: Completion {
                status,
                progress: Some(totals.progress(total)),
                results,
                errors: Vec::new(),
            },
            output_file: None,
        })
    }

    async fn run_export(
        &self,
        operation: &Operation,
        filters: &Record,
        format: &str,
    ) -> Result<RunEnd, CoreError> {
        let outcome = self
            .exporter
            .export(operation.entity_type, filters, format)
            .await?;
        let count = outcome.record_count;

        let mut results = Record::new();
        results.insert("record_count".into(), json!(count));
        results.insert("format".into(), json!(format.trim().to_ascii_lowercase()));
        results.insert(
            "output_file".into(),
            outcome
                .output_file
                .as_ref()
                .map(|p| json!(p.display().to_string()))
                .unwrap_or(Value::Null),
        );

        Ok(RunEnd::Finished {
            completion: Completion {
                status: OperationStatus::Completed,
                progress: Some(Progress::new(count, count, count, 0)),
                results,
                errors: Vec::new(),
            },
            output_file: outcome.output_file,
        })
    }

    async fn result(
        &self,
        id: OperationId,
        started: Instant,
        output_file: Option<PathBuf>,
    ) -> Result<BulkOperationResult, CoreError> {
        let operation = self
            .store
            .get(id)
            .await?
            .ok_or(CoreError::OperationNotFound(id))?;
        Ok(BulkOperationResult::from_operation(
            &operation,
            started.elapsed().as_secs_f64(),
            output_file,
        ))
    }
}

/// Exclusive claim on running one operation, from [`BulkOperations::reserve`].
///
/// Holds the run's cancellation token; dropping the slot releases the claim.
pub struct RunSlot {
    running: Arc<RunningMap>,
    id: OperationId,
    token: CancellationToken,
}

impl RunSlot {
    pub fn id(&self) -> OperationId {
        self.id
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Validation strictness for an operation type.
pub fn validation_mode(operation_type: OperationType) -> ValidationMode {
    if operation_type.creates_records() {
        ValidationMode::Full
    } else if operation_type.is_lifecycle() {
        ValidationMode::KeyOnly
    } else {
        ValidationMode::Partial
    }
}
