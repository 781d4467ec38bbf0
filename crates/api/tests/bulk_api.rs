//! Integration tests for the `/api/v1/bulk` endpoints, run against the
//! in-memory operation store.

mod common;

use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, build_test_app_with, create_operation, get, post_json, post_raw,
    record, wait_until_terminal,
};
use serde_json::json;

fn user(username: &str) -> serde_json::Value {
    json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "role": "staff",
    })
}

// ---------------------------------------------------------------------------
// Health and middleware
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok_without_database() {
    let app = build_test_app(Vec::new());
    let response = get(&app.router, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["db_healthy"].is_null());
    assert_eq!(json["bulk_in_flight"], 0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_test_app(Vec::new());
    let response = get(&app.router, "/api/v1/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validate_reports_invalid_and_duplicate_records() {
    let app = build_test_app(Vec::new());
    let response = post_json(
        &app.router,
        "/api/v1/bulk/validate",
        json!({
            "entity_type": "users",
            "records": [
                user("ada"),
                {"username": "bob", "email": "not-an-email", "role": "staff"},
                user("ada"),
            ],
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["is_valid"], false);
    assert_eq!(data["invalid_records"].as_array().unwrap().len(), 1);
    assert_eq!(data["invalid_records"][0]["row"], 2);
    assert_eq!(data["valid_records"].as_array().unwrap().len(), 2);
    assert!(!data["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn validate_rejects_unknown_entity_type() {
    let app = build_test_app(Vec::new());
    let response = post_json(
        &app.router,
        "/api/v1/bulk/validate",
        json!({"entity_type": "buildings", "records": []}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_queued_operation() {
    let app = build_test_app(Vec::new());
    let response = post_json(
        &app.router,
        "/api/v1/bulk/operations",
        json!({
            "operation_type": "import",
            "entity_type": "users",
            "created_by": 3,
            "parameters": {"source": "test"},
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["status"], "queued");
    assert_eq!(data["operation_type"], "import");
    assert_eq!(data["entity_type"], "users");
    assert_eq!(data["created_by"], 3);
    assert_eq!(data["parameters"]["source"], "test");
    assert_eq!(data["total_records"], 0);
}

#[tokio::test]
async fn create_rejects_unknown_operation_type() {
    let app = build_test_app(Vec::new());
    let response = post_json(
        &app.router,
        "/api/v1/bulk/operations",
        json!({"operation_type": "merge", "entity_type": "users"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_operation_is_404() {
    let app = build_test_app(Vec::new());
    let id = uuid::Uuid::now_v7();

    let response = get(&app.router, &format!("/api/v1/bulk/operations/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_json(
        &app.router,
        &format!("/api/v1/bulk/operations/{id}/cancel"),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_filters_by_owner() {
    let app = build_test_app(Vec::new());
    create_operation(&app.router, "create", "users").await;
    create_operation(&app.router, "delete", "tenants").await;
    post_json(
        &app.router,
        "/api/v1/bulk/operations",
        json!({"operation_type": "update", "entity_type": "properties", "created_by": 99}),
    )
    .await;

    let all = body_json(get(&app.router, "/api/v1/bulk/operations").await).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 3);

    let uri = "/api/v1/bulk/operations?created_by=7&limit=1";
    let mine = body_json(get(&app.router, uri).await).await;
    let mine = mine["data"].as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["created_by"], 7);
    assert_eq!(mine[0]["entity_type"], "tenants");
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_queued_then_again_conflicts() {
    let app = build_test_app(Vec::new());
    let id = create_operation(&app.router, "import", "users").await;
    let uri = format!("/api/v1/bulk/operations/{id}/cancel");

    let response = post_json(&app.router, &uri, json!({})).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(&app.router, &uri, json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let op = body_json(get(&app.router, &format!("/api/v1/bulk/operations/{id}")).await).await;
    assert_eq!(op["data"]["status"], "cancelled");
    assert!(op["data"]["completed_at"].is_string());
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn records_run_in_background_to_partial_success() {
    let app = build_test_app(Vec::new());
    let id = create_operation(&app.router, "import", "users").await;

    let response = post_json(
        &app.router,
        &format!("/api/v1/bulk/operations/{id}/records"),
        json!({"records": [
            user("ada"),
            user("reject-me"),
            {"username": "", "email": "x@example.com", "role": "staff"},
            user("bob"),
            user("cy"),
        ]}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["data"]["operation_id"], id.as_str());

    let op = wait_until_terminal(&app.router, &id).await;
    assert_eq!(op["status"], "partial_success");
    assert_eq!(op["total_records"], 5);
    assert_eq!(op["processed_records"], 5);
    assert_eq!(op["successful_records"], 3);
    assert_eq!(op["failed_records"], 2);
    assert_eq!(op["progress_percentage"], 100.0);
    assert_eq!(op["errors"].as_array().unwrap().len(), 2);
    assert_eq!(op["results"]["validated_records"], 4);
    assert_eq!(app.handler.applied.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn running_twice_conflicts() {
    let app = build_test_app(Vec::new());
    let id = create_operation(&app.router, "create", "users").await;
    let uri = format!("/api/v1/bulk/operations/{id}/records");

    let response = post_json(&app.router, &uri, json!({"records": [user("ada")]})).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let op = wait_until_terminal(&app.router, &id).await;
    assert_eq!(op["status"], "completed");

    let response = post_json(&app.router, &uri, json!({"records": [user("bob")]})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.handler.applied.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_submissions_accept_exactly_one() {
    let app = build_test_app(Vec::new());
    let id = create_operation(&app.router, "import", "users").await;
    let uri = format!("/api/v1/bulk/operations/{id}/records");

    let (first, second) = tokio::join!(
        post_json(&app.router, &uri, json!({"records": [user("ada")]})),
        post_json(&app.router, &uri, json!({"records": [user("bob")]})),
    );
    let mut statuses = vec![first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::ACCEPTED, StatusCode::CONFLICT]);

    let op = wait_until_terminal(&app.router, &id).await;
    assert_eq!(op["status"], "completed");
    assert_eq!(op["total_records"], 1);
    assert_eq!(app.handler.applied.load(Ordering::SeqCst), 1);
    assert_eq!(app.bulk.in_flight(), 0);
}

#[tokio::test]
async fn submission_while_run_slot_is_held_conflicts() {
    let app = build_test_app(Vec::new());
    let id = create_operation(&app.router, "import", "users").await;
    let uri = format!("/api/v1/bulk/operations/{id}/records");
    let operation_id = id.parse().unwrap();

    let slot = app.bulk.reserve(operation_id).unwrap();
    let response = post_json(&app.router, &uri, json!({"records": [user("ada")]})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");

    let op = body_json(get(&app.router, &format!("/api/v1/bulk/operations/{id}")).await).await;
    assert_eq!(op["data"]["status"], "queued");

    drop(slot);
    let response = post_json(&app.router, &uri, json!({"records": [user("ada")]})).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(wait_until_terminal(&app.router, &id).await["status"], "completed");
}

#[tokio::test]
async fn export_operation_refuses_records() {
    let app = build_test_app(Vec::new());
    let id = create_operation(&app.router, "export", "users").await;

    let response = post_json(
        &app.router,
        &format!("/api/v1/bulk/operations/{id}/records"),
        json!({"records": []}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let op = body_json(get(&app.router, &format!("/api/v1/bulk/operations/{id}")).await).await;
    assert_eq!(op["data"]["status"], "queued");
}

#[tokio::test]
async fn entity_without_handler_fails_the_operation() {
    let app = build_test_app(Vec::new());
    let id = create_operation(&app.router, "import", "tenants").await;

    let response = post_json(
        &app.router,
        &format!("/api/v1/bulk/operations/{id}/records"),
        json!({"records": [{"first_name": "A", "last_name": "B", "email": "a@b.co"}]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let op = wait_until_terminal(&app.router, &id).await;
    assert_eq!(op["status"], "failed");
    assert_eq!(op["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn csv_upload_is_parsed_and_applied() {
    let app = build_test_app(Vec::new());
    let id = create_operation(&app.router, "import", "users").await;

    let csv = "username,email,role\nada,ada@example.com,admin\nbob,bob@example.com,staff\n";
    let response = post_raw(
        &app.router,
        &format!("/api/v1/bulk/operations/{id}/upload?format=csv"),
        csv,
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let op = wait_until_terminal(&app.router, &id).await;
    assert_eq!(op["status"], "completed");
    assert_eq!(op["successful_records"], 2);
}

#[tokio::test]
async fn upload_requires_a_known_format() {
    let app = build_test_app(Vec::new());
    let id = create_operation(&app.router, "import", "users").await;
    let base = format!("/api/v1/bulk/operations/{id}/upload");

    let response = post_raw(&app.router, &base, "[]").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_raw(&app.router, &format!("{base}?format=xml"), "[]").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_PAYLOAD");
}

#[tokio::test]
async fn oversized_upload_fails_the_operation() {
    let app = build_test_app_with(Vec::new(), |config| config.max_file_size_mb = 1);
    let id = create_operation(&app.router, "import", "users").await;

    let body = format!("[{}]", " ".repeat(1024 * 1024 + 1));
    let response = post_raw(
        &app.router,
        &format!("/api/v1/bulk/operations/{id}/upload?format=json"),
        body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let op = wait_until_terminal(&app.router, &id).await;
    assert_eq!(op["status"], "failed");
    assert_eq!(op["processed_records"], 0);
    assert_eq!(app.handler.applied.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn file_import_reads_from_upload_dir() {
    let app = build_test_app(Vec::new());
    let uploads = app.dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    std::fs::write(
        uploads.join("users.json"),
        json!([user("ada"), user("bob"), user("cy")]).to_string(),
    )
    .unwrap();

    let id = create_operation(&app.router, "import", "users").await;
    let response = post_json(
        &app.router,
        &format!("/api/v1/bulk/operations/{id}/file"),
        json!({"file_name": "users.json"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let op = wait_until_terminal(&app.router, &id).await;
    assert_eq!(op["status"], "completed");
    assert_eq!(op["successful_records"], 3);
    assert_eq!(op["results"]["chunks"], 2);
}

#[tokio::test]
async fn export_writes_file_and_completes() {
    let app = build_test_app(vec![
        record(json!({"id": 1, "username": "ada"})),
        record(json!({"id": 2, "username": "bob"})),
    ]);
    let id = create_operation(&app.router, "export", "users").await;

    let response = post_json(
        &app.router,
        &format!("/api/v1/bulk/operations/{id}/export"),
        json!({"filters": {"role": "admin"}, "format": "json"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let op = wait_until_terminal(&app.router, &id).await;
    assert_eq!(op["status"], "completed");
    assert_eq!(op["results"]["record_count"], 2);
    assert_eq!(op["results"]["format"], "json");

    let path = op["results"]["output_file"].as_str().unwrap();
    assert!(path.ends_with(".json"));
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written[1]["username"], "bob");
}

#[tokio::test]
async fn export_with_unknown_format_fails() {
    let app = build_test_app(vec![record(json!({"id": 1}))]);
    let id = create_operation(&app.router, "export", "users").await;

    let response = post_json(
        &app.router,
        &format!("/api/v1/bulk/operations/{id}/export"),
        json!({"format": "xlsx"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let op = wait_until_terminal(&app.router, &id).await;
    assert_eq!(op["status"], "failed");
    assert!(op["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("xlsx"));
}

#[tokio::test]
async fn shutdown_leaves_no_runs_in_flight() {
    let app = build_test_app(Vec::new());
    let id = create_operation(&app.router, "import", "users").await;
    post_json(
        &app.router,
        &format!("/api/v1/bulk/operations/{id}/records"),
        json!({"records": [user("ada")]}),
    )
    .await;

    wait_until_terminal(&app.router, &id).await;
    app.bulk.shutdown();
    assert_eq!(app.bulk.in_flight(), 0);
}
