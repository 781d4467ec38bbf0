//! PostgreSQL persistence for EstateCore.
//!
//! Models and repositories for the bulk operation registry and the four
//! entity tables, plus the implementations of the core bulk traits:
//! [`PgOperationStore`], [`EntityRecordHandler`] and [`PgRecordSource`].

use sqlx::postgres::PgPoolOptions;

pub mod handlers;
pub mod models;
pub mod repositories;
pub mod source;
pub mod store;

pub use handlers::{handler_registry, EntityRecordHandler};
pub use source::PgRecordSource;
pub use store::PgOperationStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}

/// Apply the embedded migrations in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
