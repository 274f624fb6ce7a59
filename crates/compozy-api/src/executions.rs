//! Execution endpoints: the idempotency gate, SSE stream, and sync payload wired
//! into a small set of axum handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use compozy_core::config::RequestConfig;
use compozy_core::Id;
use compozy_storage::task_state::{NewTaskState, TaskComponent, TaskStateRepository, TaskStatus};
use compozy_storage::usage::UsageRepository;

use crate::error::ApiError;
use crate::idempotency::{CheckResult, IdempotencyGate};
use crate::sse::SseWriter;
use crate::stream_telemetry::{CloseInfo, CloseReason, StreamKind, StreamTelemetry};
use crate::sync_payload::{build_sync_payload, SyncPayloadOptions};
use compozy_observability::Instruments;

#[derive(Clone)]
pub struct ExecutionsState {
    pub task_states: Arc<TaskStateRepository>,
    pub usage: Arc<UsageRepository>,
    pub idempotency: Arc<IdempotencyGate>,
    pub instruments: Arc<Instruments>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct TriggerExecutionRequest {
    pub workflow_id: String,
    #[serde(default)]
    pub input: Option<Value>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TriggerExecutionResponse {
    pub exec_id: String,
    pub unique: bool,
}

/// `POST /v1/executions` — idempotency-gated trigger. A duplicate claim is not an
/// error to the caller: it is reported as `unique: false` with a 200.
#[utoipa::path(
    post,
    path = "/v1/executions",
    request_body = TriggerExecutionRequest,
    responses(
        (status = 200, description = "Execution accepted or deduplicated", body = TriggerExecutionResponse),
        (status = 400, description = "Validation failure", content_type = "application/problem+json"),
        (status = 413, description = "Body too large", content_type = "application/problem+json"),
    ),
    tag = "executions"
)]
pub async fn trigger_execution(
    State(state): State<ExecutionsState>,
    Extension(config): Extension<Arc<RequestConfig>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    match trigger_execution_inner(state, &config, &headers, &body).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response_with(&headers),
    }
}

async fn trigger_execution_inner(
    state: ExecutionsState,
    config: &RequestConfig,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<TriggerExecutionResponse, ApiError> {
    let idempotency_header = headers.get("idempotency-key").and_then(|v| v.to_str().ok());
    let check = state
        .idempotency
        .check_and_set(
            config,
            "POST",
            "/v1/executions",
            idempotency_header,
            body,
            None,
            Duration::ZERO,
        )
        .await?;

    let request: TriggerExecutionRequest =
        serde_json::from_slice(body).map_err(|_| ApiError::validation("invalid request body"))?;

    match check {
        CheckResult::Duplicate => Ok(TriggerExecutionResponse {
            exec_id: String::new(),
            unique: false,
        }),
        CheckResult::Unique => {
            let exec_id = Id::new(uuid::Uuid::now_v7().to_string());
            state
                .task_states
                .upsert_state(NewTaskState {
                    task_exec_id: exec_id.clone(),
                    workflow_exec_id: exec_id.clone(),
                    workflow_id: request.workflow_id,
                    task_id: "root".to_string(),
                    parent_task_exec_id: None,
                    component: TaskComponent::Workflow,
                    agent_id: None,
                    action_id: None,
                    tool_id: None,
                    execution_type: "basic".to_string(),
                    status: TaskStatus::Running,
                    input: request.input.map(|v| v.try_into()).transpose().map_err(|_| {
                        ApiError::validation("input must be a JSON object")
                    })?,
                    output: None,
                    error: None,
                })
                .await?;
            Ok(TriggerExecutionResponse { exec_id: exec_id.into_string(), unique: true })
        }
    }
}

/// `GET /v1/executions/{exec_id}` — the sync-execution snapshot payload.
#[utoipa::path(
    get,
    path = "/v1/executions/{exec_id}",
    params(("exec_id" = String, Path, description = "Execution id")),
    responses((status = 200, description = "Execution snapshot")),
    tag = "executions"
)]
pub async fn get_execution(
    State(state): State<ExecutionsState>,
    Path(exec_id): Path<String>,
) -> Json<Value> {
    let payload = build_sync_payload(
        state.task_states,
        state.usage,
        SyncPayloadOptions {
            exec_id: Id::from(exec_id),
            known_output: None,
            include_state: true,
        },
        |task_state| (serde_json::to_value(task_state).unwrap_or(Value::Null), false),
    )
    .await;
    Json(Value::Object(payload))
}

/// `GET /v1/executions/{exec_id}/stream` — SSE status stream, polling the repository
/// until the execution reaches a terminal status.
pub async fn stream_execution(
    State(state): State<ExecutionsState>,
    Path(exec_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let exec_id = Id::from(exec_id);
    let (_last_id, _present) =
        crate::sse::parse_last_event_id(headers.get("last-event-id").and_then(|v| v.to_str().ok()))
            .unwrap_or((0, false));

    let (writer, response) = SseWriter::start();
    let telemetry = StreamTelemetry::new(StreamKind::Workflow, exec_id.as_str(), state.instruments.clone());

    tokio::spawn(async move {
        let mut sequence: i64 = 0;
        loop {
            match state.task_states.get_state(&exec_id).await {
                Ok(Some(task_state)) => {
                    sequence += 1;
                    let data = serde_json::to_string(&task_state).unwrap_or_else(|_| "{}".to_string());
                    if writer.write_event(sequence, Some("state"), &data).await.is_err() {
                        telemetry.close(CloseReason::StreamError, CloseInfo::new().with_error("write failed"));
                        return;
                    }
                    telemetry.record_event("state", sequence == 1).await;
                    if task_state.status.is_terminal() {
                        telemetry.close(
                            CloseReason::TerminalStatus,
                            CloseInfo::new().with_status(task_state.status.as_str()),
                        );
                        return;
                    }
                }
                Ok(None) => {
                    telemetry.close(
                        CloseReason::InitialSnapshotFailed,
                        CloseInfo::new().with_error("execution not found"),
                    );
                    return;
                }
                Err(err) => {
                    telemetry.close(CloseReason::StreamError, CloseInfo::new().with_error(err.to_string()));
                    return;
                }
            }
            if writer.write_heartbeat().await.is_err() {
                telemetry.close(CloseReason::StreamError, CloseInfo::new().with_error("heartbeat failed"));
                return;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    });

    response
}
