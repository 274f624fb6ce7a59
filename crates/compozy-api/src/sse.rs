//! A manual Server-Sent-Events writer.
//!
//! Not `axum::response::sse::Sse`: that helper cannot express the exact per-write
//! flush and heartbeat contract this stream needs, so frames are serialized by hand and
//! pushed onto a channel whose receiver becomes the response body stream. Each
//! channel send is the flush: once it lands in the channel it is immediately
//! available to the body stream's consumer, with nothing buffered on our side.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, Response, StatusCode};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Error)]
pub enum SseError {
    #[error("stream receiver dropped")]
    ReceiverGone,
}

pub struct SseWriter {
    tx: tokio::sync::Mutex<mpsc::Sender<Result<Bytes, Infallible>>>,
}

impl SseWriter {
    /// Returns a writer plus the HTTP response whose body streams whatever the
    /// writer sends. `Start` is implicit in the response headers built here.
    pub fn start() -> (Self, Response<Body>) {
        let (tx, rx) = mpsc::channel(64);
        let body = Body::from_stream(ReceiverStream::new(rx));
        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        );
        headers.insert(
            axum::http::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
        (Self { tx: tokio::sync::Mutex::new(tx) }, response)
    }

    /// `data` is split on `\n` so multi-line payloads preserve their line structure;
    /// an empty `data` still emits one empty `data:` line.
    pub async fn write_event(&self, id: i64, event: Option<&str>, data: &str) -> Result<(), SseError> {
        let mut frame = format!("id: {id}\n");
        if let Some(event) = event {
            let sanitized: String = event.chars().filter(|c| *c != '\r' && *c != '\n').collect();
            frame.push_str(&format!("event: {sanitized}\n"));
        }
        if data.is_empty() {
            frame.push_str("data:\n");
        } else {
            for line in data.split('\n') {
                frame.push_str(&format!("data: {line}\n"));
            }
        }
        frame.push('\n');
        self.send(frame).await
    }

    pub async fn write_heartbeat(&self) -> Result<(), SseError> {
        self.send(": ping\n\n".to_string()).await
    }

    async fn send(&self, frame: String) -> Result<(), SseError> {
        let tx = self.tx.lock().await;
        tx.send(Ok(Bytes::from(frame))).await.map_err(|_| SseError::ReceiverGone)
    }
}

/// Parses `Last-Event-ID` as a signed 64-bit integer. Returns `(id, present)`;
/// `present = false` when the header is absent (id is then meaningless, always 0).
pub fn parse_last_event_id(header: Option<&str>) -> Result<(i64, bool), std::num::ParseIntError> {
    match header {
        None => Ok((0, false)),
        Some(raw) => raw.trim().parse::<i64>().map(|id| (id, true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn multi_line_data_splits_into_multiple_data_lines() {
        let (writer, response) = SseWriter::start();
        writer.write_event(9, Some("multi"), "line1\nline2").await.unwrap();
        drop(writer);

        let body = response.into_body();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(text, "id: 9\nevent: multi\ndata: line1\ndata: line2\n\n");
    }

    #[tokio::test]
    async fn empty_data_emits_a_bare_data_line() {
        let (writer, response) = SseWriter::start();
        writer.write_event(1, None, "").await.unwrap();
        drop(writer);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "id: 1\ndata:\n\n");
    }

    #[tokio::test]
    async fn heartbeat_frame_is_a_comment() {
        let (writer, response) = SseWriter::start();
        writer.write_heartbeat().await.unwrap();
        drop(writer);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), ": ping\n\n");
    }

    #[test]
    fn last_event_id_absent_header_is_zero_and_not_present() {
        assert_eq!(parse_last_event_id(None).unwrap(), (0, false));
    }

    #[test]
    fn last_event_id_parses_present_header() {
        assert_eq!(parse_last_event_id(Some("42")).unwrap(), (42, true));
    }

    #[test]
    fn last_event_id_rejects_non_integer() {
        assert!(parse_last_event_id(Some("nope")).is_err());
    }
}
