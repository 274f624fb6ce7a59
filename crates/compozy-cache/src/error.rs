//! Error kind for the lease store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("lease key {0:?} is already held")]
    Duplicate(String),
    #[error("lease store backend error: {0}")]
    Backend(String),
}

impl LeaseError {
    pub fn duplicate(key: impl Into<String>) -> Self {
        Self::Duplicate(key.into())
    }

    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<redis::RedisError> for LeaseError {
    fn from(err: redis::RedisError) -> Self {
        Self::backend(err)
    }
}
