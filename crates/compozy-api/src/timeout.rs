//! Timeout responder: the canonical HTTP 408 body for a per-request deadline
//! exhaustion, with a best-effort state snapshot that never blocks the response on
//! its own failure.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use opentelemetry::KeyValue;
use serde_json::{json, Value};

use compozy_core::Id;
use compozy_observability::Instruments;
use compozy_storage::task_state::TaskStateRepository;

pub async fn timeout_response(
    task_states: &TaskStateRepository,
    instruments: &Arc<Instruments>,
    exec_id: &Id,
    resource_kind: &str,
) -> Response {
    tracing::warn!(resource_kind, exec_id = %exec_id, "request deadline exceeded");

    if !resource_kind.is_empty() {
        instruments
            .execution_sync_timeouts_total
            .add(1, &[KeyValue::new("kind", resource_kind.to_string())]);
    }

    let state_snapshot: Option<Value> = match task_states.get_state(exec_id).await {
        Ok(Some(state)) => serde_json::to_value(&state).ok(),
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(exec_id = %exec_id, error = %err, "best-effort state snapshot failed during timeout response");
            None
        }
    };

    let mut body = json!({
        "exec_id": exec_id.as_str(),
        "message": "execution timeout",
        "error": { "code": "DEADLINE_EXCEEDED" },
    });
    if let Some(state) = state_snapshot {
        body["state"] = state;
    }

    (StatusCode::REQUEST_TIMEOUT, axum::Json(body)).into_response()
}
