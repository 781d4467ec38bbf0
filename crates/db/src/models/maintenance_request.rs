//! Maintenance request entity model and DTOs.

use estatecore_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `maintenance_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MaintenanceRequest {
    pub id: DbId,
    pub property_id: DbId,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub estimated_cost: Option<f64>,
    pub is_active: bool,
    pub archived_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new maintenance request.
///
/// `status` defaults to `open` if omitted.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMaintenanceRequest {
    pub property_id: DbId,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: Option<String>,
    pub estimated_cost: Option<f64>,
}

/// DTO for updating an existing maintenance request. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMaintenanceRequest {
    pub property_id: Option<DbId>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub estimated_cost: Option<f64>,
}

/// Equality filters accepted by maintenance request exports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaintenanceRequestFilter {
    pub property_id: Option<DbId>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub is_active: Option<bool>,
}
