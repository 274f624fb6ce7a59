//! Library surface behind the `compozy-api` binary: the router assembly lives here so
//! integration tests can drive it with `tower::ServiceExt::oneshot` instead of binding
//! a real socket.

pub mod error;
pub mod etag;
pub mod executions;
pub mod idempotency;
pub mod pagination;
pub mod problem;
pub mod query_params;
pub mod sse;
pub mod stream_telemetry;
pub mod sync_payload;
pub mod timeout;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use compozy_core::config::RequestConfig;
use executions::ExecutionsState;

#[derive(Clone)]
pub struct HealthState {
    pub pool: sqlx::PgPool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    postgres_connections_open: u32,
    postgres_connections_idle: usize,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        postgres_connections_open: state.pool.size(),
        postgres_connections_idle: state.pool.num_idle(),
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(executions::trigger_execution, executions::get_execution),
    components(schemas(executions::TriggerExecutionRequest, executions::TriggerExecutionResponse)),
    tags((name = "executions", description = "Execution trigger, snapshot, and streaming endpoints")),
    info(
        title = "Compozy API",
        version = "0.1.0",
        description = "Idempotent execution triggers, sync snapshots, and SSE streaming for Compozy workflows",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

/// Assembles the full axum `Router`, shared by the real binary and by tests that drive
/// it with `tower::ServiceExt::oneshot` against an in-process service.
pub fn build_router(
    executions_state: ExecutionsState,
    health_state: HealthState,
    request_config: Arc<RequestConfig>,
) -> Router {
    Router::new()
        .route("/healthz", get(health).with_state(health_state))
        .route("/v1/executions", post(executions::trigger_execution))
        .route("/v1/executions/:exec_id", get(executions::get_execution))
        .route("/v1/executions/:exec_id/stream", get(executions::stream_execution))
        .with_state(executions_state)
        .layer(Extension(request_config))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
