//! Query parameter types for API handlers.

use estatecore_core::types::DbId;
use serde::Deserialize;

/// `?created_by=&limit=` for operation listings. The limit is clamped by
/// the bulk service.
#[derive(Debug, Deserialize)]
pub struct ListOperationsParams {
    pub created_by: Option<DbId>,
    pub limit: Option<usize>,
}

/// `?format=csv|json` for raw uploads.
#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub format: Option<String>,
}
