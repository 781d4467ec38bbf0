//! Route definitions for the `/bulk` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::bulk;
use crate::state::AppState;

/// Routes mounted at `/bulk`.
///
/// ```text
/// POST   /validate                    -> validate
/// GET    /operations                  -> list_operations (?created_by=&limit=)
/// POST   /operations                  -> create_operation
/// GET    /operations/{id}             -> get_operation
/// POST   /operations/{id}/cancel      -> cancel_operation
/// POST   /operations/{id}/records     -> submit_records
/// POST   /operations/{id}/upload      -> submit_upload (?format=)
/// POST   /operations/{id}/file        -> submit_file
/// POST   /operations/{id}/export      -> run_export
/// ```
///
/// The upload route lifts the default body limit; the bulk service enforces
/// `BULK_MAX_FILE_SIZE_MB` itself and fails the operation when exceeded.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/validate", post(bulk::validate))
        .route(
            "/operations",
            get(bulk::list_operations).post(bulk::create_operation),
        )
        .route("/operations/{id}", get(bulk::get_operation))
        .route("/operations/{id}/cancel", post(bulk::cancel_operation))
        .route("/operations/{id}/records", post(bulk::submit_records))
        .route(
            "/operations/{id}/upload",
            post(bulk::submit_upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/operations/{id}/file", post(bulk::submit_file))
        .route("/operations/{id}/export", post(bulk::run_export))
}
