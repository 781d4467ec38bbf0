//! Handlers for the `/bulk` resource.
//!
//! Creating, inspecting and cancelling operations is synchronous. The
//! execution endpoints claim the operation's run slot, check that it can
//! run, hand the work and the slot to a background task and answer
//! `202 Accepted`; clients poll `GET /bulk/operations/{id}` for progress.
//! A second submission for the same operation gets `409 Conflict`.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use estatecore_core::bulk::{
    BulkOperationResult, BulkOperations, Job, NewOperation, Operation, OperationId,
    OperationSummary, PayloadFormat, RunSlot,
};
use estatecore_core::entity::{EntityType, OperationType};
use estatecore_core::error::CoreError;
use estatecore_core::types::{DbId, Record};
use estatecore_core::validation::rules::{ValidationMode, ValidationResult};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::query::{ListOperationsParams, UploadParams};
use crate::response::DataResponse;
use crate::state::AppState;

// ── Request / response bodies ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub entity_type: String,
    pub records: Vec<Record>,
    #[serde(default)]
    pub mode: ValidationMode,
}

#[derive(Debug, Deserialize)]
pub struct CreateOperationRequest {
    pub operation_type: String,
    pub entity_type: String,
    pub created_by: Option<DbId>,
    #[serde(default)]
    pub parameters: Record,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRecordsRequest {
    pub records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitFileRequest {
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub filters: Record,
    #[serde(default = "default_export_format")]
    pub format: String,
}

fn default_export_format() -> String {
    "csv".to_string()
}

/// Body of every `202 Accepted` answer.
#[derive(Debug, Serialize)]
pub struct Accepted {
    pub operation_id: OperationId,
    pub operation_type: OperationType,
    pub entity_type: EntityType,
}

impl From<&Operation> for Accepted {
    fn from(op: &Operation) -> Self {
        Self {
            operation_id: op.id,
            operation_type: op.operation_type,
            entity_type: op.entity_type,
        }
    }
}

type AcceptedResponse = (StatusCode, Json<DataResponse<Accepted>>);

// ── Validation ───────────────────────────────────────────────────────────

/// POST /api/v1/bulk/validate
///
/// Validate a batch without creating an operation.
pub async fn validate(
    State(state): State<AppState>,
    Json(body): Json<ValidateRequest>,
) -> AppResult<Json<DataResponse<ValidationResult>>> {
    let entity_type = EntityType::from_str_value(&body.entity_type)?;
    let result = state.bulk.validate(entity_type, body.mode, &body.records);
    Ok(Json(DataResponse { data: result }))
}

// ── Tracking ─────────────────────────────────────────────────────────────

/// GET /api/v1/bulk/operations
pub async fn list_operations(
    State(state): State<AppState>,
    Query(params): Query<ListOperationsParams>,
) -> AppResult<Json<DataResponse<Vec<OperationSummary>>>> {
    let summaries = state.bulk.list(params.created_by, params.limit).await?;
    Ok(Json(DataResponse { data: summaries }))
}

/// POST /api/v1/bulk/operations
pub async fn create_operation(
    State(state): State<AppState>,
    Json(body): Json<CreateOperationRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Operation>>)> {
    let input = NewOperation {
        operation_type: OperationType::from_str_value(&body.operation_type)?,
        entity_type: EntityType::from_str_value(&body.entity_type)?,
        created_by: body.created_by,
        parameters: body.parameters,
    };
    let id = state.bulk.create_operation(input).await?;
    let operation = find_operation(&state.bulk, id).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: operation })))
}

/// GET /api/v1/bulk/operations/{id}
pub async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<OperationId>,
) -> AppResult<Json<DataResponse<Operation>>> {
    let operation = find_operation(&state.bulk, id).await?;
    Ok(Json(DataResponse { data: operation }))
}

/// POST /api/v1/bulk/operations/{id}/cancel
///
/// 204 on success, 404 for an unknown id, 409 if the operation already
/// finished.
pub async fn cancel_operation(
    State(state): State<AppState>,
    Path(id): Path<OperationId>,
) -> AppResult<StatusCode> {
    if state.bulk.cancel(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Core(CoreError::Conflict(format!(
            "Bulk operation {id} has already finished"
        ))))
    }
}

// ── Execution ────────────────────────────────────────────────────────────

/// POST /api/v1/bulk/operations/{id}/records
pub async fn submit_records(
    State(state): State<AppState>,
    Path(id): Path<OperationId>,
    Json(body): Json<SubmitRecordsRequest>,
) -> AppResult<AcceptedResponse> {
    let (slot, operation) = claim(&state.bulk, id, false).await?;
    spawn_run(&state.bulk, id, move |bulk| async move {
        bulk.execute(slot, Job::Records(body.records)).await
    });
    Ok(accepted(&operation))
}

/// POST /api/v1/bulk/operations/{id}/upload?format=csv|json
///
/// The raw request body is the payload.
pub async fn submit_upload(
    State(state): State<AppState>,
    Path(id): Path<OperationId>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> AppResult<AcceptedResponse> {
    let format = params
        .format
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Query parameter 'format' is required".into()))
        .and_then(|f| PayloadFormat::from_str_value(f).map_err(AppError::from))?;

    let (slot, operation) = claim(&state.bulk, id, false).await?;
    spawn_run(&state.bulk, id, move |bulk| async move {
        bulk.execute(slot, Job::Payload { bytes: &body, format })
            .await
    });
    Ok(accepted(&operation))
}

/// POST /api/v1/bulk/operations/{id}/file
///
/// `file_name` is resolved inside the upload directory.
pub async fn submit_file(
    State(state): State<AppState>,
    Path(id): Path<OperationId>,
    Json(body): Json<SubmitFileRequest>,
) -> AppResult<AcceptedResponse> {
    let (slot, operation) = claim(&state.bulk, id, false).await?;
    spawn_run(&state.bulk, id, move |bulk| async move {
        bulk.execute(slot, Job::File(&body.file_name)).await
    });
    Ok(accepted(&operation))
}

/// POST /api/v1/bulk/operations/{id}/export
pub async fn run_export(
    State(state): State<AppState>,
    Path(id): Path<OperationId>,
    Json(body): Json<ExportRequest>,
) -> AppResult<AcceptedResponse> {
    let (slot, operation) = claim(&state.bulk, id, true).await?;
    spawn_run(&state.bulk, id, move |bulk| async move {
        let job = Job::Export {
            filters: body.filters,
            format: &body.format,
        };
        bulk.execute(slot, job).await
    });
    Ok(accepted(&operation))
}

// ── Private helpers ──────────────────────────────────────────────────────

async fn find_operation(bulk: &BulkOperations, id: OperationId) -> AppResult<Operation> {
    bulk.get_status(id)
        .await?
        .ok_or(AppError::Core(CoreError::OperationNotFound(id)))
}

/// Reserve the run slot of `id`, then check the operation can run.
///
/// The slot is released again if the check fails.
async fn claim(
    bulk: &BulkOperations,
    id: OperationId,
    export: bool,
) -> AppResult<(RunSlot, Operation)> {
    let slot = bulk.reserve(id)?;
    let operation = bulk.ensure_runnable(id, export).await?;
    Ok((slot, operation))
}

fn accepted(operation: &Operation) -> AcceptedResponse {
    (
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: Accepted::from(operation),
        }),
    )
}

/// Run an execution call on a background task, logging how it ended.
fn spawn_run<F, Fut>(bulk: &Arc<BulkOperations>, id: OperationId, run: F)
where
    F: FnOnce(Arc<BulkOperations>) -> Fut,
    Fut: Future<Output = Result<BulkOperationResult, CoreError>> + Send + 'static,
{
    let task = run(Arc::clone(bulk));
    tokio::spawn(async move {
        match task.await {
            Ok(result) => tracing::info!(
                operation_id = %id,
                status = %result.status,
                successful = result.successful,
                failed = result.failed,
                "Bulk operation run finished",
            ),
            Err(e) => tracing::error!(operation_id = %id, error = %e, "Bulk operation run failed"),
        }
    });
}
