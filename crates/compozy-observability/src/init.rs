//! Tracing and metrics bootstrap, run once from each binary's `main`.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Installs the process-wide subscriber and OpenTelemetry providers.
///
/// No exporter or reader is configured here: this workspace has no Langfuse-equivalent
/// backend to ship spans and metrics to, so they are recorded and structured correctly
/// but stay in-process. Wiring a real exporter only needs a reader/exporter attached to
/// the providers built below; `config.otlp_endpoint` is read and plumbed through for
/// that future wiring but unused until then.
pub fn init(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let tracer_provider = TracerProvider::builder().build();
    let tracer = tracer_provider.tracer(config.service_name.clone());
    opentelemetry::global::set_tracer_provider(tracer_provider);

    let meter_provider = SdkMeterProvider::builder().build();
    opentelemetry::global::set_meter_provider(meter_provider);

    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()
        .map_err(|err| anyhow::anyhow!("install tracing subscriber: {err}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_an_info_filter() {
        let config = ObservabilityConfig {
            service_name: "compozy-test".to_string(),
            otlp_endpoint: None,
            log_filter: "info".to_string(),
        };
        assert_eq!(config.log_filter, "info");
    }
}
