//! Property entity model and DTOs.

use estatecore_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A property row from the `properties` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Property {
    pub id: DbId,
    pub property_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub property_type: String,
    pub units: Option<i32>,
    pub rent_amount: Option<f64>,
    pub square_feet: Option<i32>,
    pub is_active: bool,
    pub archived_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new property.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProperty {
    pub property_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub property_type: String,
    pub units: Option<i32>,
    pub rent_amount: Option<f64>,
    pub square_feet: Option<i32>,
}

/// DTO for updating an existing property. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProperty {
    pub property_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub property_type: Option<String>,
    pub units: Option<i32>,
    pub rent_amount: Option<f64>,
    pub square_feet: Option<i32>,
}

/// Equality filters accepted by property exports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyFilter {
    pub property_type: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub is_active: Option<bool>,
}
