//! Operation tracker: the registry of bulk operations.
//!
//! [`OperationStore`] is the persistence seam. `estatecore-db` provides the
//! PostgreSQL implementation; [`InMemoryOperationStore`] serves tests and
//! single-process deployments. Both enforce the same lifecycle guards: once
//! an operation is terminal, every mutating call is a no-op returning
//! `false`. The one exception is [`OperationStore::note_results`], which may
//! add result entries to a `cancelled` operation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::operation::{Completion, Operation, OperationId, OperationSummary, Progress};
use crate::entity::OperationStatus;
use crate::error::CoreError;
use crate::types::{DbId, Record};

/// Default number of summaries returned by a listing.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Maximum number of summaries returned by a listing.
pub const MAX_LIST_LIMIT: usize = 500;

/// Clamp a caller-supplied listing limit into `1..=MAX_LIST_LIMIT`.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Persist a newly created operation.
    async fn insert(&self, operation: &Operation) -> Result<(), CoreError>;

    async fn get(&self, id: OperationId) -> Result<Option<Operation>, CoreError>;

    /// Operations newest first, optionally restricted to one owner.
    async fn list(
        &self,
        created_by: Option<DbId>,
        limit: usize,
    ) -> Result<Vec<Operation>, CoreError>;

    /// `queued` -> `processing`, stamping `started_at`.
    ///
    /// Returns `false` if the operation is not queued.
    async fn mark_started(&self, id: OperationId) -> Result<bool, CoreError>;

    /// Write a counter snapshot. Returns `false` unless the operation is
    /// still `processing`.
    async fn record_progress(&self, id: OperationId, progress: &Progress)
        -> Result<bool, CoreError>;

    /// Move an active operation to a terminal status, stamping
    /// `completed_at`. Returns `false` if it was already terminal.
    async fn finish(&self, id: OperationId, completion: &Completion) -> Result<bool, CoreError>;

    /// Cancel a queued or processing operation. Returns `false` (without
    /// touching the record) for any other status.
    async fn cancel(&self, id: OperationId) -> Result<bool, CoreError>;

    /// Merge `results` into a `cancelled` operation's result map. Returns
    /// `false` for any other status.
    async fn note_results(&self, id: OperationId, results: &Record) -> Result<bool, CoreError>;
}

/// Process-local store backed by a map behind a single lock.
#[derive(Default)]
pub struct InMemoryOperationStore {
    operations: RwLock<HashMap<OperationId, Operation>>,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn insert(&self, operation: &Operation) -> Result<(), CoreError> {
        let mut operations = self.operations.write().await;
        if operations.contains_key(&operation.id) {
            return Err(CoreError::Conflict(format!(
                "Bulk operation {} already exists",
                operation.id
            )));
        }
        operations.insert(operation.id, operation.clone());
        Ok(())
    }

    async fn get(&self, id: OperationId) -> Result<Option<Operation>, CoreError> {
        Ok(self.operations.read().await.get(&id).cloned())
    }

    async fn list(
        &self,
        created_by: Option<DbId>,
        limit: usize,
    ) -> Result<Vec<Operation>, CoreError> {
        let operations = self.operations.read().await;
        let mut matching: Vec<Operation> = operations
            .values()
            .filter(|op| created_by.is_none() || op.created_by == created_by)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn mark_started(&self, id: OperationId) -> Result<bool, CoreError> {
        let mut operations = self.operations.write().await;
        match operations.get_mut(&id) {
            Some(op) if op.status == OperationStatus::Queued => {
                op.status = OperationStatus::Processing;
                op.started_at = Some(chrono::Utc::now());
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(CoreError::OperationNotFound(id)),
        }
    }

    async fn record_progress(
        &self,
        id: OperationId,
        progress: &Progress,
    ) -> Result<bool, CoreError> {
        let mut operations = self.operations.write().await;
        match operations.get_mut(&id) {
            Some(op) if op.status == OperationStatus::Processing => {
                op.apply_progress(progress);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(CoreError::OperationNotFound(id)),
        }
    }

    async fn finish(&self, id: OperationId, completion: &Completion) -> Result<bool, CoreError> {
        let mut operations = self.operations.write().await;
        match operations.get_mut(&id) {
            Some(op) if op.status.is_active() => {
                if let Some(progress) = &completion.progress {
                    op.apply_progress(progress);
                }
                op.status = completion.status;
                op.results.extend(completion.results.clone());
                op.errors.extend(completion.errors.iter().cloned());
                op.completed_at = Some(chrono::Utc::now());
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(CoreError::OperationNotFound(id)),
        }
    }

    async fn cancel(&self, id: OperationId) -> Result<bool, CoreError> {
        let mut operations = self.operations.write().await;
        match operations.get_mut(&id) {
            Some(op) if op.status.is_active() => {
                op.status = OperationStatus::Cancelled;
                op.completed_at = Some(chrono::Utc::now());
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(CoreError::OperationNotFound(id)),
        }
    }

    async fn note_results(&self, id: OperationId, results: &Record) -> Result<bool, CoreError> {
        let mut operations = self.operations.write().await;
        match operations.get_mut(&id) {
            Some(op) if op.status == OperationStatus::Cancelled => {
                op.results.extend(results.clone());
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(CoreError::OperationNotFound(id)),
        }
    }
}

/// Summaries for a listing.
pub fn summarize(operations: &[Operation]) -> Vec<OperationSummary> {
    operations.iter().map(Operation::summary).collect()
}
