pub mod bulk;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /bulk/validate                          dry-run validation (POST)
/// /bulk/operations                        list, create
/// /bulk/operations/{id}                   get
/// /bulk/operations/{id}/cancel            cancel (POST)
/// /bulk/operations/{id}/records           run on JSON records (POST)
/// /bulk/operations/{id}/upload            run on a raw CSV/JSON body (POST)
/// /bulk/operations/{id}/file              run on an uploaded file (POST)
/// /bulk/operations/{id}/export            run an export (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/bulk", bulk::router())
}
