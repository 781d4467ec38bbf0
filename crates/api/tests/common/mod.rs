#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use estatecore_api::config::ServerConfig;
use estatecore_api::router::build_app_router;
use estatecore_api::state::AppState;
use estatecore_core::bulk::{
    BulkConfig, BulkOperations, HandlerRegistry, InMemoryOperationStore, RecordError,
    RecordHandler, RecordSource,
};
use estatecore_core::entity::{EntityType, OperationType};
use estatecore_core::error::CoreError;
use estatecore_core::types::Record;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

/// Accepts every record except those whose `username` is `"reject-me"`.
#[derive(Default)]
pub struct TestHandler {
    pub applied: AtomicUsize,
}

#[async_trait]
impl RecordHandler for TestHandler {
    async fn apply(&self, _: OperationType, record: &Record) -> Result<(), RecordError> {
        if record.get("username").and_then(Value::as_str) == Some("reject-me") {
            return Err(RecordError::Rejected("username is blocked".into()));
        }
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves a fixed set of records for every export.
pub struct StubSource(pub Vec<Record>);

#[async_trait]
impl RecordSource for StubSource {
    async fn fetch(&self, _: EntityType, _: &Record) -> Result<Vec<Record>, CoreError> {
        Ok(self.0.clone())
    }
}

/// A running test application plus the pieces tests inspect directly.
pub struct TestApp {
    pub router: Router,
    pub bulk: Arc<BulkOperations>,
    pub handler: Arc<TestHandler>,
    pub dir: tempfile::TempDir,
}

/// Build the full application router on the in-memory store, with upload
/// and export directories inside a fresh temp dir.
pub fn build_test_app(export_records: Vec<Record>) -> TestApp {
    build_test_app_with(export_records, |_| {})
}

pub fn build_test_app_with(
    export_records: Vec<Record>,
    tweak: impl FnOnce(&mut BulkConfig),
) -> TestApp {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut bulk_config = BulkConfig {
        upload_dir: dir.path().join("uploads"),
        output_dir: dir.path().join("exports"),
        chunk_size: 2,
        ..BulkConfig::default()
    };
    tweak(&mut bulk_config);

    let handler = Arc::new(TestHandler::default());
    let handlers = HandlerRegistry::new().register(EntityType::Users, handler.clone());
    let bulk = Arc::new(BulkOperations::new(
        bulk_config,
        Arc::new(InMemoryOperationStore::new()),
        handlers,
        Arc::new(StubSource(export_records)),
    ));

    let config = test_config();
    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        bulk: Arc::clone(&bulk),
    };

    TestApp {
        router: build_app_router(state, &config),
        bulk,
        handler,
        dir,
    }
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("record must be a JSON object")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("request failed")
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_raw(app: &Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(body.into())
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Create an operation and return its id.
pub async fn create_operation(app: &Router, operation_type: &str, entity_type: &str) -> String {
    let response = post_json(
        app,
        "/api/v1/bulk/operations",
        serde_json::json!({
            "operation_type": operation_type,
            "entity_type": entity_type,
            "created_by": 7,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"]
        .as_str()
        .expect("operation id")
        .to_string()
}

/// Poll an operation until it leaves `queued`/`processing`.
pub async fn wait_until_terminal(app: &Router, id: &str) -> Value {
    let uri = format!("/api/v1/bulk/operations/{id}");
    for _ in 0..200 {
        let json = body_json(get(app, &uri).await).await;
        let status = json["data"]["status"].as_str().unwrap_or_default().to_string();
        if status != "queued" && status != "processing" {
            return json["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("operation {id} never finished");
}
