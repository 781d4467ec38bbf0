//! Repository for the `tenants` table.

use estatecore_core::types::DbId;
use sqlx::PgPool;

use crate::models::tenant::{CreateTenant, Tenant, TenantFilter, UpdateTenant};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, first_name, last_name, email, phone, property_id, monthly_rent, \
    status, is_active, archived_at, created_at, updated_at";

/// Provides CRUD operations for tenants.
pub struct TenantRepo;

impl TenantRepo {
    /// Insert a new tenant, returning the created row.
    ///
    /// If `status` is `None` in the input, defaults to `active`.
    pub async fn create(pool: &PgPool, input: &CreateTenant) -> Result<Tenant, sqlx::Error> {
        let query = format!(
            "INSERT INTO tenants
                (first_name, last_name, email, phone, property_id, monthly_rent, status)
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'active'))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(input.property_id)
            .bind(input.monthly_rent)
            .bind(&input.status)
            .fetch_one(pool)
            .await
    }

    /// List tenants matching every set filter, oldest first.
    pub async fn list(pool: &PgPool, filter: &TenantFilter) -> Result<Vec<Tenant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tenants
             WHERE ($1::BIGINT IS NULL OR property_id = $1)
               AND ($2::TEXT IS NULL OR status = $2)
               AND ($3::BOOL IS NULL OR is_active = $3)
             ORDER BY id"
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(filter.property_id)
            .bind(&filter.status)
            .bind(filter.is_active)
            .fetch_all(pool)
            .await
    }

    /// Update a tenant. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTenant,
    ) -> Result<Option<Tenant>, sqlx::Error> {
        let query = format!(
            "UPDATE tenants SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                property_id = COALESCE($6, property_id),
                monthly_rent = COALESCE($7, monthly_rent),
                status = COALESCE($8, status)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tenant>(&query)
            .bind(id)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.email)
            .bind(&input.phone)
            .bind(input.property_id)
            .bind(input.monthly_rent)
            .bind(&input.status)
            .fetch_optional(pool)
            .await
    }
}
