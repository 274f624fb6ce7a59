// Compozy API server
// Decision: the task DSL, planner, Temporal worker, and LLM provider adapters are
// external collaborators this binary does not run — see DESIGN.md.

use std::sync::Arc;

use anyhow::{Context, Result};

use compozy_api::executions::ExecutionsState;
use compozy_api::idempotency::IdempotencyGate;
use compozy_api::{build_router, HealthState};
use compozy_cache::{CacheConfig, RedisLeaseStore};
use compozy_core::config::{RequestConfig, StorageConfig};
use compozy_observability::{Instruments, ObservabilityConfig};
use compozy_storage::task_state::TaskStateRepository;
use compozy_storage::usage::UsageRepository;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let observability_config = ObservabilityConfig::from_env();
    compozy_observability::init_observability(&observability_config)
        .context("failed to initialize tracing/metrics")?;

    tracing::info!("compozy-api starting...");

    let storage_config = StorageConfig::from_env().context("storage configuration")?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(storage_config.max_connections)
        .min_connections(storage_config.min_connections)
        .connect(&storage_config.database_url)
        .await
        .context("failed to connect to postgres")?;
    sqlx::migrate!("../compozy-storage/migrations").run(&pool).await.context("failed to run migrations")?;
    tracing::info!("connected to postgres and applied migrations");

    let cache_config = CacheConfig::from_env().context("cache configuration")?;
    let lease_store = RedisLeaseStore::connect(&cache_config.redis_url)
        .await
        .context("failed to connect to redis")?;
    tracing::info!("connected to redis");

    let task_states = Arc::new(TaskStateRepository::new(pool.clone()));
    let usage = Arc::new(UsageRepository::new(pool.clone()));
    let idempotency = Arc::new(IdempotencyGate::new(Arc::new(lease_store)));
    let instruments = Arc::new(Instruments::new());
    let request_config = Arc::new(RequestConfig::default());

    let executions_state = ExecutionsState {
        task_states,
        usage,
        idempotency,
        instruments,
    };
    let health_state = HealthState { pool: pool.clone() };

    let app = build_router(executions_state, health_state, request_config);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.context("failed to bind to address")?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
