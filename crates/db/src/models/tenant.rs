//! Tenant entity model and DTOs.

use estatecore_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tenant row from the `tenants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tenant {
    pub id: DbId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub property_id: Option<DbId>,
    pub monthly_rent: Option<f64>,
    pub status: String,
    pub is_active: bool,
    pub archived_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new tenant.
///
/// `status` defaults to `active` if omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenant {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub property_id: Option<DbId>,
    pub monthly_rent: Option<f64>,
    pub status: Option<String>,
}

/// DTO for updating an existing tenant. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTenant {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub property_id: Option<DbId>,
    pub monthly_rent: Option<f64>,
    pub status: Option<String>,
}

/// Equality filters accepted by tenant exports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantFilter {
    pub property_id: Option<DbId>,
    pub status: Option<String>,
    pub is_active: Option<bool>,
}
