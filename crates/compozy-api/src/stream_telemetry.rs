//! Stream telemetry: wraps an SSE connection with a tracing span, connection/event/
//! error counters, and duration/time-to-first-event histograms.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio::sync::Mutex;
use tracing::Span;

use compozy_observability::Instruments;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Workflow,
    Task,
    Agent,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Workflow => "workflow",
            StreamKind::Task => "task",
            StreamKind::Agent => "agent",
        }
    }
}

/// The canonical close-reason set. Stored as a string on the wire (metrics labels,
/// log fields) but kept as an enum here so call sites can't typo a reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Initializing,
    TerminalStatus,
    Completed,
    ContextCanceled,
    InitialSnapshotFailed,
    StreamError,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Initializing => "initializing",
            CloseReason::TerminalStatus => "terminal_status",
            CloseReason::Completed => "completed",
            CloseReason::ContextCanceled => "context_canceled",
            CloseReason::InitialSnapshotFailed => "initial_snapshot_failed",
            CloseReason::StreamError => "stream_error",
        }
    }
}

#[derive(Debug, Default)]
pub struct CloseInfo {
    pub error: Option<String>,
    pub status: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl CloseInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

pub struct StreamTelemetry {
    kind: StreamKind,
    exec_id: String,
    start: Instant,
    first_event_at: Mutex<Option<Instant>>,
    event_count: AtomicU64,
    span: Span,
    closed: AtomicBool,
    instruments: Arc<Instruments>,
}

impl StreamTelemetry {
    pub fn new(kind: StreamKind, exec_id: impl Into<String>, instruments: Arc<Instruments>) -> Arc<Self> {
        let exec_id = exec_id.into();
        let span = tracing::info_span!(
            "stream.kind",
            otel.name = format!("stream.{}", kind.as_str()).as_str(),
            stream.kind = kind.as_str(),
            stream.exec_id = %exec_id,
            stream.time_to_first_event_seconds = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
        );
        instruments.stream_connect_total.add(1, &[KeyValue::new("kind", kind.as_str())]);
        Arc::new(Self {
            kind,
            exec_id,
            start: Instant::now(),
            first_event_at: Mutex::new(None),
            event_count: AtomicU64::new(0),
            span,
            closed: AtomicBool::new(false),
            instruments,
        })
    }

    /// `counts_as_first` lets callers exclude synthetic/replay events (e.g. a
    /// reconnect replay) from the time-to-first-event measurement.
    pub async fn record_event(&self, event_type: &str, counts_as_first: bool) {
        self.event_count.fetch_add(1, Ordering::Relaxed);
        if counts_as_first {
            let mut first = self.first_event_at.lock().await;
            if first.is_none() {
                let elapsed = self.start.elapsed().as_secs_f64();
                self.instruments
                    .stream_time_to_first_event_seconds
                    .record(elapsed, &[KeyValue::new("kind", self.kind.as_str())]);
                self.span.record("stream.time_to_first_event_seconds", elapsed);
                *first = Some(Instant::now());
            }
        }
        self.instruments.stream_event_total.add(
            1,
            &[KeyValue::new("kind", self.kind.as_str()), KeyValue::new("event_type", event_type.to_string())],
        );
        self.span.in_scope(|| tracing::trace!(event_type, "stream event"));
    }

    /// Idempotent: only the first call records anything. Later calls are no-ops, so
    /// callers in a `select!` racing shutdown paths can all call `close` freely.
    pub fn close(&self, reason: CloseReason, info: CloseInfo) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let duration = self.start.elapsed().as_secs_f64();
        let events = self.event_count.load(Ordering::Relaxed);
        let kind = self.kind.as_str();

        self.instruments
            .stream_disconnect_total
            .add(1, &[KeyValue::new("kind", kind), KeyValue::new("reason", reason.as_str())]);
        self.instruments.stream_duration_seconds.record(duration, &[KeyValue::new("kind", kind)]);
        if info.error.is_some() {
            self.instruments
                .stream_error_total
                .add(1, &[KeyValue::new("kind", kind), KeyValue::new("reason", reason.as_str())]);
        }

        if let Some(error) = &info.error {
            tracing::error!(
                exec_id = %self.exec_id,
                duration_seconds = duration,
                events,
                reason = reason.as_str(),
                status = info.status.as_deref().unwrap_or(""),
                error,
                "stream closed with error"
            );
            self.span.record("otel.status_code", "ERROR");
        } else {
            tracing::info!(
                exec_id = %self.exec_id,
                duration_seconds = duration,
                events,
                reason = reason.as_str(),
                status = info.status.as_deref().unwrap_or(""),
                "stream closed"
            );
            self.span.record("otel.status_code", "OK");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_reason_strings_match_the_canonical_set() {
        assert_eq!(CloseReason::Initializing.as_str(), "initializing");
        assert_eq!(CloseReason::TerminalStatus.as_str(), "terminal_status");
        assert_eq!(CloseReason::Completed.as_str(), "completed");
        assert_eq!(CloseReason::ContextCanceled.as_str(), "context_canceled");
        assert_eq!(CloseReason::InitialSnapshotFailed.as_str(), "initial_snapshot_failed");
        assert_eq!(CloseReason::StreamError.as_str(), "stream_error");
    }

    #[tokio::test]
    async fn close_is_a_once_latch() {
        let instruments = Arc::new(Instruments::new());
        let telemetry = StreamTelemetry::new(StreamKind::Task, "exec-1", instruments);
        telemetry.close(CloseReason::Completed, CloseInfo::new());
        // A second close must not panic or double-count; there's no public counter
        // to assert on here, so this just exercises the guard for a panic.
        telemetry.close(CloseReason::StreamError, CloseInfo::new().with_error("boom"));
    }
}
