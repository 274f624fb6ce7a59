//! Error kind for the task-state repository.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskStateError {
    #[error("task state {0} not found")]
    NotFound(String),
    #[error("invalid task status {0:?}")]
    InvalidStatus(String),
    #[error("invalid task component {0:?}")]
    InvalidComponent(String),
    #[error("operation requires an active transaction")]
    NotInTransaction,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Jsonb(#[from] compozy_core::jsonb::JsonbError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskStateError {
    pub fn not_found(task_exec_id: impl Into<String>) -> Self {
        Self::NotFound(task_exec_id.into())
    }

    pub fn invalid_status(raw: impl Into<String>) -> Self {
        Self::InvalidStatus(raw.into())
    }

    pub fn invalid_component(raw: impl Into<String>) -> Self {
        Self::InvalidComponent(raw.into())
    }

    pub fn not_in_transaction() -> Self {
        Self::NotInTransaction
    }
}

pub type Result<T> = std::result::Result<T, TaskStateError>;
