//! RFC 7807 `application/problem+json` error bodies.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

const CONTENT_TYPE: &str = "application/problem+json";

#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>) -> Self {
        Self {
            type_: "about:blank".to_string(),
            title: title.into(),
            status: status.as_u16(),
            detail: None,
            code: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Always aborts the normal response flow: a problem body is terminal, there is
    /// no further handler-level writing after it.
    pub fn into_response_with(self, headers: &HeaderMap) -> Response {
        let status = self.status();
        let correlation_id = correlation_id(headers);
        let body = serde_json::to_vec(&self).unwrap_or_else(|_| b"{}".to_vec());
        let mut response = (status, body).into_response();
        response
            .headers_mut()
            .insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
        if let Some(id) = correlation_id {
            if let Ok(value) = HeaderValue::from_str(&id) {
                response.headers_mut().insert("x-correlation-id", value);
            }
        }
        response
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::to_vec(&self).unwrap_or_else(|_| b"{}".to_vec());
        let mut response = (status, body).into_response();
        response
            .headers_mut()
            .insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
        response
    }
}

/// `X-Correlation-ID` wins over `X-Request-ID`; absent if neither is set.
pub fn correlation_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-correlation-id")
        .or_else(|| headers.get("x-request-id"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_prefers_correlation_over_request() {
        let mut headers = HeaderMap::new();
        headers.insert("x-correlation-id", HeaderValue::from_static("corr-1"));
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));
        assert_eq!(correlation_id(&headers), Some("corr-1".to_string()));
    }

    #[test]
    fn correlation_id_falls_back_to_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));
        assert_eq!(correlation_id(&headers), Some("req-1".to_string()));
    }

    #[test]
    fn problem_serializes_without_detail() {
        let problem = Problem::new(StatusCode::NOT_FOUND, "not found");
        let json = serde_json::to_value(&problem).unwrap();
        assert!(json.get("detail").is_none());
    }
}
