//! Repository for the `bulk_operations` table.
//!
//! Every state transition is a conditional UPDATE on `status_id`, so a
//! terminal operation can never be modified, even by a concurrent instance.

use sqlx::PgPool;
use uuid::Uuid;

use estatecore_core::types::DbId;

use crate::models::bulk_operation::{BulkOperationRow, BulkProgressUpdate, CreateBulkOperation};
use crate::models::status::{BulkOperationStatus, StatusId};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, operation_type_id, entity_type, status_id, created_by, \
    total_records, processed_records, successful_records, failed_records, \
    progress_percentage, parameters, results, errors, started_at, completed_at, \
    created_at, updated_at";

/// Provides persistence for bulk operations.
pub struct BulkOperationRepo;

impl BulkOperationRepo {
    /// Insert a new bulk operation record, returning the created row.
    pub async fn create(
        pool: &PgPool,
        body: &CreateBulkOperation,
    ) -> Result<BulkOperationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO bulk_operations \
                (id, operation_type_id, entity_type, status_id, created_by, \
                 parameters, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BulkOperationRow>(&query)
            .bind(body.id)
            .bind(body.operation_type_id)
            .bind(&body.entity_type)
            .bind(body.status_id)
            .bind(body.created_by)
            .bind(&body.parameters)
            .bind(body.created_at)
            .fetch_one(pool)
            .await
    }

    /// Find a single bulk operation by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: Uuid,
    ) -> Result<Option<BulkOperationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM bulk_operations WHERE id = $1");
        sqlx::query_as::<_, BulkOperationRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM bulk_operations WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// List bulk operations newest first, optionally for one owner.
    pub async fn list(
        pool: &PgPool,
        created_by: Option<DbId>,
        limit: i64,
    ) -> Result<Vec<BulkOperationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM bulk_operations \
             WHERE ($1::BIGINT IS NULL OR created_by = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, BulkOperationRow>(&query)
            .bind(created_by)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// `queued` -> `processing`. Returns `true` if a row changed.
    pub async fn mark_started(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bulk_operations SET status_id = $2, started_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(BulkOperationStatus::Processing.id())
        .bind(BulkOperationStatus::Queued.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Write a counter snapshot while the operation is `processing`.
    pub async fn record_progress(
        pool: &PgPool,
        id: Uuid,
        progress: &BulkProgressUpdate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bulk_operations SET \
                total_records = $2, \
                processed_records = $3, \
                successful_records = $4, \
                failed_records = $5, \
                progress_percentage = $6, \
                errors = errors || $7::jsonb \
             WHERE id = $1 AND status_id = $8",
        )
        .bind(id)
        .bind(progress.total_records)
        .bind(progress.processed_records)
        .bind(progress.successful_records)
        .bind(progress.failed_records)
        .bind(progress.progress_percentage)
        .bind(&progress.new_errors)
        .bind(BulkOperationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move an active operation to a terminal status.
    ///
    /// `progress` of `None` keeps the stored counters. `results` is merged
    /// into the stored object; `errors` is appended to the stored array.
    pub async fn finish(
        pool: &PgPool,
        id: Uuid,
        status_id: StatusId,
        progress: Option<&BulkProgressUpdate>,
        results: &serde_json::Value,
        errors: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let progress_errors = progress
            .map(|p| p.new_errors.clone())
            .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
        let result = sqlx::query(
            "UPDATE bulk_operations SET \
                status_id = $2, \
                total_records = COALESCE($3, total_records), \
                processed_records = COALESCE($4, processed_records), \
                successful_records = COALESCE($5, successful_records), \
                failed_records = COALESCE($6, failed_records), \
                progress_percentage = COALESCE($7, progress_percentage), \
                results = results || $8::jsonb, \
                errors = errors || $9::jsonb || $10::jsonb, \
                completed_at = NOW() \
             WHERE id = $1 AND status_id IN ($11, $12)",
        )
        .bind(id)
        .bind(status_id)
        .bind(progress.map(|p| p.total_records))
        .bind(progress.map(|p| p.processed_records))
        .bind(progress.map(|p| p.successful_records))
        .bind(progress.map(|p| p.failed_records))
        .bind(progress.map(|p| p.progress_percentage))
        .bind(results)
        .bind(&progress_errors)
        .bind(errors)
        .bind(BulkOperationStatus::Queued.id())
        .bind(BulkOperationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel a queued or processing operation.
    pub async fn cancel(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bulk_operations SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND status_id IN ($3, $4)",
        )
        .bind(id)
        .bind(BulkOperationStatus::Cancelled.id())
        .bind(BulkOperationStatus::Queued.id())
        .bind(BulkOperationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Merge `results` into a cancelled operation's result object.
    pub async fn note_cancelled_results(
        pool: &PgPool,
        id: Uuid,
        results: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bulk_operations SET results = results || $2::jsonb \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(results)
        .bind(BulkOperationStatus::Cancelled.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
