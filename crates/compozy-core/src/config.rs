//! Process-level and request-scoped configuration.
//!
//! Two surfaces, never a `static`/`OnceLock` global: process config is loaded once at
//! startup via `from_env()`; request-scoped config is carried as an axum `Extension`
//! and read by handlers/repositories, defaulting whenever the extension is absent
//! (e.g. a repository built directly in a unit test).

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Process-wide storage configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let max_connections = parse_env_or("DATABASE_MAX_CONNECTIONS", 10)?;
        let min_connections = parse_env_or("DATABASE_MIN_CONNECTIONS", 0)?;
        Ok(Self {
            database_url,
            max_connections,
            min_connections,
        })
    }
}

fn parse_env_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            key,
            value: raw.clone(),
        }),
    }
}

/// Request-scoped limits, attached to the axum router as an `Extension` and read by
/// handlers/repositories that need them.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Maximum depth (exclusive) returned by `GetTaskTree`. Default 100.
    pub max_tree_depth: i64,
    /// Maximum accepted idempotency header length in bytes. Default 50.
    pub max_idempotency_key_len: usize,
    /// Maximum accepted request body size for idempotency hashing, in bytes. `None`
    /// disables the cap.
    pub max_idempotency_body_len: Option<usize>,
    /// Default idempotency lease TTL when the caller supplies a non-positive value.
    pub default_idempotency_ttl: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_tree_depth: 100,
            max_idempotency_key_len: 50,
            max_idempotency_body_len: Some(1024 * 1024),
            default_idempotency_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl RequestConfig {
    /// The effective tree-depth bound: a positive override wins, else the default.
    pub fn tree_depth_bound(&self, override_depth: Option<i64>) -> i64 {
        match override_depth {
            Some(d) if d > 0 => d,
            _ => self.max_tree_depth,
        }
    }

    /// The effective TTL: a positive duration wins, else the configured default.
    pub fn idempotency_ttl(&self, requested: Duration) -> Duration {
        if requested.is_zero() {
            self.default_idempotency_ttl
        } else {
            requested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_depth_bound_falls_back_on_non_positive_override() {
        let cfg = RequestConfig::default();
        assert_eq!(cfg.tree_depth_bound(Some(0)), cfg.max_tree_depth);
        assert_eq!(cfg.tree_depth_bound(Some(-3)), cfg.max_tree_depth);
        assert_eq!(cfg.tree_depth_bound(None), cfg.max_tree_depth);
    }

    #[test]
    fn tree_depth_bound_honors_positive_override() {
        let cfg = RequestConfig::default();
        assert_eq!(cfg.tree_depth_bound(Some(5)), 5);
    }

    #[test]
    fn idempotency_ttl_falls_back_on_zero() {
        let cfg = RequestConfig::default();
        assert_eq!(cfg.idempotency_ttl(Duration::ZERO), cfg.default_idempotency_ttl);
        assert_eq!(cfg.idempotency_ttl(Duration::from_secs(30)), Duration::from_secs(30));
    }
}
