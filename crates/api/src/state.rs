use std::sync::Arc;

use estatecore_core::bulk::BulkOperations;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool. `None` when the bulk service runs on the
    /// in-memory store.
    pub pool: Option<estatecore_db::DbPool>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The bulk operations service.
    pub bulk: Arc<BulkOperations>,
}
