//! Observability configuration, loaded from environment variables.

use std::env;

/// Loaded once at startup from environment variables, never a `static`/`OnceLock`.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub otlp_endpoint: Option<String>,
    pub log_filter: String,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        let service_name = env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "compozy".to_string());
        let otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();
        let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        Self {
            service_name,
            otlp_endpoint,
            log_filter,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
