use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use estatecore_api::config::ServerConfig;
use estatecore_api::router::build_app_router;
use estatecore_api::state::AppState;
use estatecore_core::bulk::{BulkConfig, BulkOperations};
use estatecore_db::{handler_registry, PgOperationStore, PgRecordSource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "estatecore_api=debug,estatecore_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let bulk_config = BulkConfig::from_env();
    tracing::info!(
        max_concurrent_operations = bulk_config.max_concurrent_operations,
        chunk_size = bulk_config.chunk_size,
        max_file_size_mb = bulk_config.max_file_size_mb,
        upload_dir = %bulk_config.upload_dir.display(),
        output_dir = %bulk_config.output_dir.display(),
        "Loaded bulk configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = estatecore_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    estatecore_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    estatecore_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Bulk operations ---
    let bulk = Arc::new(BulkOperations::new(
        bulk_config,
        Arc::new(PgOperationStore::new(pool.clone())),
        handler_registry(pool.clone()),
        Arc::new(PgRecordSource::new(pool.clone())),
    ));

    // --- App state ---
    let state = AppState {
        pool: Some(pool),
        config: Arc::new(config.clone()),
        bulk: Arc::clone(&bulk),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // In-flight runs stop at their next chunk boundary and end cancelled.
    bulk.shutdown();
    let drained = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        wait_for_bulk_drain(&bulk),
    )
    .await;
    match drained {
        Ok(()) => tracing::info!("Bulk operations drained"),
        Err(_) => tracing::warn!(
            in_flight = bulk.in_flight(),
            "Timed out waiting for bulk operations to stop"
        ),
    }

    tracing::info!("Graceful shutdown complete");
}

async fn wait_for_bulk_drain(bulk: &BulkOperations) {
    while bulk.in_flight() > 0 {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
