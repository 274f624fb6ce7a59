//! The named instrument set: pre-registered metrics built once at startup and passed
//! by `Arc` to callers, rather than looked up by string name per call.

use opentelemetry::metrics::{Counter, Histogram, UpDownCounter};

/// Tracer name used for every span this workspace opens around a stream — see
/// `compozy-api`'s `stream_telemetry` module for the `stream.<kind>` span names
/// themselves.
pub const STREAM_TRACER_NAME: &str = "compozy.stream";

pub struct Instruments {
    pub postgres_connections_open: UpDownCounter<i64>,
    pub postgres_connections_in_use: UpDownCounter<i64>,
    pub postgres_connections_idle: UpDownCounter<i64>,
    pub postgres_connections_max_open: UpDownCounter<i64>,
    pub postgres_connection_wait_duration_seconds: Histogram<f64>,

    pub stream_connect_total: Counter<u64>,
    pub stream_disconnect_total: Counter<u64>,
    pub stream_event_total: Counter<u64>,
    pub stream_error_total: Counter<u64>,
    pub stream_duration_seconds: Histogram<f64>,
    pub stream_time_to_first_event_seconds: Histogram<f64>,

    pub execution_sync_latency_seconds: Histogram<f64>,
    pub execution_sync_errors_total: Counter<u64>,
    pub execution_sync_timeouts_total: Counter<u64>,
}

impl Instruments {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("compozy");
        Self {
            postgres_connections_open: meter
                .i64_up_down_counter("postgres_connections_open")
                .with_description("Open Postgres connections in the pool")
                .init(),
            postgres_connections_in_use: meter
                .i64_up_down_counter("postgres_connections_in_use")
                .with_description("Postgres connections currently checked out")
                .init(),
            postgres_connections_idle: meter
                .i64_up_down_counter("postgres_connections_idle")
                .with_description("Postgres connections idle in the pool")
                .init(),
            postgres_connections_max_open: meter
                .i64_up_down_counter("postgres_connections_max_open_connections")
                .with_description("Configured pool size")
                .init(),
            postgres_connection_wait_duration_seconds: meter
                .f64_histogram("postgres_connection_wait_duration_seconds")
                .with_description("Time spent waiting for a pooled connection")
                .init(),
            stream_connect_total: meter
                .u64_counter("stream_connect_total")
                .with_description("SSE streams opened")
                .init(),
            stream_disconnect_total: meter
                .u64_counter("stream_disconnect_total")
                .with_description("SSE streams closed, by reason")
                .init(),
            stream_event_total: meter
                .u64_counter("stream_event_total")
                .with_description("SSE events written")
                .init(),
            stream_error_total: meter
                .u64_counter("stream_error_total")
                .with_description("SSE stream write errors")
                .init(),
            stream_duration_seconds: meter
                .f64_histogram("stream_duration_seconds")
                .with_description("SSE stream lifetime from open to close")
                .init(),
            stream_time_to_first_event_seconds: meter
                .f64_histogram("stream_time_to_first_event_seconds")
                .with_description("Latency from stream open to its first event")
                .init(),
            execution_sync_latency_seconds: meter
                .f64_histogram("execution_sync_latency_seconds")
                .with_description("Latency of synchronous execution requests")
                .init(),
            execution_sync_errors_total: meter
                .u64_counter("execution_sync_errors_total")
                .with_description("Synchronous execution requests that errored")
                .init(),
            execution_sync_timeouts_total: meter
                .u64_counter("execution_sync_timeouts_total")
                .with_description("Synchronous execution requests that timed out")
                .init(),
        }
    }
}

impl Default for Instruments {
    fn default() -> Self {
        Self::new()
    }
}
