//! Repository for the `maintenance_requests` table.

use estatecore_core::types::DbId;
use sqlx::PgPool;

use crate::models::maintenance_request::{
    CreateMaintenanceRequest, MaintenanceRequest, MaintenanceRequestFilter,
    UpdateMaintenanceRequest,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, property_id, title, description, priority, status, estimated_cost, \
    is_active, archived_at, created_at, updated_at";

/// Provides CRUD operations for maintenance requests.
pub struct MaintenanceRequestRepo;

impl MaintenanceRequestRepo {
    /// Insert a new maintenance request, returning the created row.
    ///
    /// If `status` is `None` in the input, defaults to `open`.
    pub async fn create(
        pool: &PgPool,
        input: &CreateMaintenanceRequest,
    ) -> Result<MaintenanceRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO maintenance_requests
                (property_id, title, description, priority, status, estimated_cost)
             VALUES ($1, $2, $3, $4, COALESCE($5, 'open'), $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MaintenanceRequest>(&query)
            .bind(input.property_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.priority)
            .bind(&input.status)
            .bind(input.estimated_cost)
            .fetch_one(pool)
            .await
    }

    /// List requests matching every set filter, oldest first.
    pub async fn list(
        pool: &PgPool,
        filter: &MaintenanceRequestFilter,
    ) -> Result<Vec<MaintenanceRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM maintenance_requests
             WHERE ($1::BIGINT IS NULL OR property_id = $1)
               AND ($2::TEXT IS NULL OR priority = $2)
               AND ($3::TEXT IS NULL OR status = $3)
               AND ($4::BOOL IS NULL OR is_active = $4)
             ORDER BY id"
        );
        sqlx::query_as::<_, MaintenanceRequest>(&query)
            .bind(filter.property_id)
            .bind(&filter.priority)
            .bind(&filter.status)
            .bind(filter.is_active)
            .fetch_all(pool)
            .await
    }

    /// Update a request. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateMaintenanceRequest,
    ) -> Result<Option<MaintenanceRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE maintenance_requests SET
                property_id = COALESCE($2, property_id),
                title = COALESCE($3, title),
                description = COALESCE($4, description),
                priority = COALESCE($5, priority),
                status = COALESCE($6, status),
                estimated_cost = COALESCE($7, estimated_cost)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MaintenanceRequest>(&query)
            .bind(id)
            .bind(input.property_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.priority)
            .bind(&input.status)
            .bind(input.estimated_cost)
            .fetch_optional(pool)
            .await
    }
}
