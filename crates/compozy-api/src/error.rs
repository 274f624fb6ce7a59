//! The HTTP-facing error kinds, mapped to RFC 7807 bodies.
//!
//! Each variant is logged exactly once, at the point this error is turned into a
//! response — callers must not re-log an `ApiError` they received from a lower layer.

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::problem::Problem;
use compozy_cache::LeaseError;
use compozy_storage::task_state::TaskStateError;
use compozy_storage::usage::UsageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("validation: {0}")]
    Validation(String),
    #[error("request entity too large")]
    PayloadTooLarge,
    #[error("execution timeout")]
    Timeout,
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("referential error: {0}")]
    Referential(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<TaskStateError> for ApiError {
    fn from(err: TaskStateError) -> Self {
        match err {
            TaskStateError::NotFound(_) => ApiError::NotFound,
            TaskStateError::NotInTransaction => ApiError::Precondition(err.to_string()),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<UsageError> for ApiError {
    fn from(err: UsageError) -> Self {
        match err {
            UsageError::NotFound(_) => ApiError::NotFound,
            UsageError::Validation(_) | UsageError::InvalidComponent(_) => {
                ApiError::Validation(err.to_string())
            }
            UsageError::ReferencedExecutionNotFound(_) => ApiError::Referential(err.to_string()),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<LeaseError> for ApiError {
    fn from(err: LeaseError) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

/// Not [`IntoResponse`] directly: the problem emitter needs the request's headers to
/// resolve the correlation ID, so handlers call [`ApiError::into_response_with`].
impl ApiError {
    pub fn into_response_with(self, headers: &HeaderMap) -> Response {
        let problem = match &self {
            ApiError::NotFound => Problem::new(StatusCode::NOT_FOUND, "not found"),
            ApiError::Validation(detail) => {
                Problem::new(StatusCode::BAD_REQUEST, "validation failed")
                    .with_detail(detail.clone())
                    .with_code("VALIDATION")
            }
            ApiError::PayloadTooLarge => {
                Problem::new(StatusCode::PAYLOAD_TOO_LARGE, "request entity too large")
            }
            ApiError::Timeout => Problem::new(StatusCode::REQUEST_TIMEOUT, "execution timeout"),
            ApiError::Precondition(detail) => {
                Problem::new(StatusCode::CONFLICT, "precondition failed")
                    .with_detail(detail.clone())
                    .with_code("PRECONDITION")
            }
            ApiError::Referential(detail) => {
                Problem::new(StatusCode::UNPROCESSABLE_ENTITY, "referential error")
                    .with_detail(detail.clone())
                    .with_code("REFERENTIAL")
            }
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "unhandled api error");
                Problem::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };
        problem.into_response_with(headers)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with(&HeaderMap::new())
    }
}
