//! Observability bootstrap: tracing subscriber setup and the shared OpenTelemetry
//! instrument set used across `compozy-storage`, `compozy-cache` and `compozy-api`.

pub mod config;
pub mod init;
pub mod instruments;

pub use config::ObservabilityConfig;
pub use init::init as init_observability;
pub use instruments::{Instruments, STREAM_TRACER_NAME};
