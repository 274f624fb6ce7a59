//! Error kind for the usage repository.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UsageError {
    #[error("usage row {0} not found")]
    NotFound(String),
    #[error("invalid usage upsert: {0}")]
    Validation(String),
    #[error("invalid usage component {0:?}")]
    InvalidComponent(String),
    #[error("referenced execution does not exist: {0}")]
    ReferencedExecutionNotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UsageError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_component(raw: impl Into<String>) -> Self {
        Self::InvalidComponent(raw.into())
    }

    pub fn referenced_execution_not_found(detail: impl Into<String>) -> Self {
        Self::ReferencedExecutionNotFound(detail.into())
    }
}

pub type Result<T> = std::result::Result<T, UsageError>;
