//! PostgreSQL-backed [`OperationStore`].

use async_trait::async_trait;
use estatecore_core::bulk::{Completion, Operation, OperationId, OperationStore, Progress};
use estatecore_core::error::CoreError;
use estatecore_core::types::{DbId, Record};

use crate::models::bulk_operation::{failures_json, BulkProgressUpdate, CreateBulkOperation};
use crate::models::status::BulkOperationStatus;
use crate::repositories::BulkOperationRepo;
use crate::DbPool;

/// Operation registry persisted in `bulk_operations`.
///
/// Status guards live in the SQL `WHERE` clauses; a `false` from a
/// conditional update is disambiguated into "terminal" or "missing" with a
/// follow-up existence check.
#[derive(Clone)]
pub struct PgOperationStore {
    pool: DbPool,
}

impl PgOperationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Turn a `false` from a guarded update into `OperationNotFound` when
    /// the row does not exist at all.
    async fn guarded(&self, id: OperationId, changed: bool) -> Result<bool, CoreError> {
        if changed {
            return Ok(true);
        }
        if BulkOperationRepo::exists(&self.pool, id).await.map_err(storage)? {
            Ok(false)
        } else {
            Err(CoreError::OperationNotFound(id))
        }
    }
}

fn storage(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Bulk operation store query failed");
    CoreError::Storage(err.to_string())
}

#[async_trait]
impl OperationStore for PgOperationStore {
    async fn insert(&self, operation: &Operation) -> Result<(), CoreError> {
        let body = CreateBulkOperation::from(operation);
        match BulkOperationRepo::create(&self.pool, &body).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                Err(CoreError::Conflict(format!(
                    "Bulk operation {} already exists",
                    operation.id
                )))
            }
            Err(e) => Err(storage(e)),
        }
    }

    async fn get(&self, id: OperationId) -> Result<Option<Operation>, CoreError> {
        BulkOperationRepo::find_by_id(&self.pool, id)
            .await
            .map_err(storage)?
            .map(Operation::try_from)
            .transpose()
    }

    async fn list(
        &self,
        created_by: Option<DbId>,
        limit: usize,
    ) -> Result<Vec<Operation>, CoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        BulkOperationRepo::list(&self.pool, created_by, limit)
            .await
            .map_err(storage)?
            .into_iter()
            .map(Operation::try_from)
            .collect()
    }

    async fn mark_started(&self, id: OperationId) -> Result<bool, CoreError> {
        let changed = BulkOperationRepo::mark_started(&self.pool, id)
            .await
            .map_err(storage)?;
        self.guarded(id, changed).await
    }

    async fn record_progress(
        &self,
        id: OperationId,
        progress: &Progress,
    ) -> Result<bool, CoreError> {
        let update = BulkProgressUpdate::from(progress);
        let changed = BulkOperationRepo::record_progress(&self.pool, id, &update)
            .await
            .map_err(storage)?;
        self.guarded(id, changed).await
    }

    async fn finish(&self, id: OperationId, completion: &Completion) -> Result<bool, CoreError> {
        let progress = completion.progress.as_ref().map(BulkProgressUpdate::from);
        let results = serde_json::Value::Object(completion.results.clone());
        let errors = failures_json(&completion.errors);
        let changed = BulkOperationRepo::finish(
            &self.pool,
            id,
            BulkOperationStatus::from(completion.status).id(),
            progress.as_ref(),
            &results,
            &errors,
        )
        .await
        .map_err(storage)?;
        self.guarded(id, changed).await
    }

    async fn cancel(&self, id: OperationId) -> Result<bool, CoreError> {
        let changed = BulkOperationRepo::cancel(&self.pool, id)
            .await
            .map_err(storage)?;
        self.guarded(id, changed).await
    }

    async fn note_results(&self, id: OperationId, results: &Record) -> Result<bool, CoreError> {
        let results = serde_json::Value::Object(results.clone());
        let changed = BulkOperationRepo::note_cancelled_results(&self.pool, id, &results)
            .await
            .map_err(storage)?;
        self.guarded(id, changed).await
    }
}
