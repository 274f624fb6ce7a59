//! The API idempotency gate: deterministic key derivation plus an atomic claim
//! against a [`LeaseStore`].

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use compozy_cache::LeaseStore;
use compozy_core::config::RequestConfig;

use crate::error::ApiError;

pub enum CheckResult {
    Unique,
    Duplicate,
}

pub struct IdempotencyGate {
    store: Arc<dyn LeaseStore>,
}

impl IdempotencyGate {
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self { store }
    }

    /// `namespace` is an optional extra path segment (e.g. a workflow name) between
    /// the fixed prefix and the derived key.
    pub async fn check_and_set(
        &self,
        config: &RequestConfig,
        method: &str,
        path: &str,
        idempotency_header: Option<&str>,
        body: &[u8],
        namespace: Option<&str>,
        ttl: Duration,
    ) -> Result<CheckResult, ApiError> {
        let derived = derive_key(config, method, path, idempotency_header, body)?;
        let key = match namespace {
            Some(ns) => format!("idempotency:api:execs:{ns}:{derived}"),
            None => format!("idempotency:api:execs:{derived}"),
        };
        let ttl = config.idempotency_ttl(ttl);
        let claimed = self.store.claim_if_absent(&key, "1", ttl).await?;
        if claimed {
            Ok(CheckResult::Unique)
        } else {
            Ok(CheckResult::Duplicate)
        }
    }
}

/// First non-empty of: the escaped URL path, the raw path, the original request URI
/// truncated before its first `?`, then the router's parameterized path pattern.
pub fn resolve_path(
    escaped_path: Option<&str>,
    raw_path: Option<&str>,
    original_uri: Option<&str>,
    templated_path: Option<&str>,
) -> String {
    escaped_path
        .filter(|s| !s.is_empty())
        .or_else(|| raw_path.filter(|s| !s.is_empty()))
        .map(|s| s.to_string())
        .or_else(|| original_uri.map(|uri| uri.split('?').next().unwrap_or(uri).to_string()))
        .or_else(|| templated_path.map(|s| s.to_string()))
        .unwrap_or_default()
}

/// Empty body normalizes to the empty string; otherwise the body is parsed as JSON
/// and re-serialized so key-reordered-but-equivalent bodies hash identically.
fn normalize_body(body: &[u8]) -> Result<String, ApiError> {
    if body.is_empty() {
        return Ok(String::new());
    }
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| ApiError::validation("idempotency body must be JSON"))?;
    serde_json::to_string(&value).map_err(|err| ApiError::Internal(err.into()))
}

fn derive_key(
    config: &RequestConfig,
    method: &str,
    path: &str,
    idempotency_header: Option<&str>,
    body: &[u8],
) -> Result<String, ApiError> {
    let header = idempotency_header.map(str::trim).filter(|s| !s.is_empty());
    let normalized_body = if let Some(header) = header {
        if header.len() > config.max_idempotency_key_len {
            return Err(ApiError::validation("idempotency key exceeds maximum length"));
        }
        return Ok(hash_parts(method, path, header));
    } else {
        // Oversize-body rejection happens before any JSON parsing, so the cost of an
        // adversarial payload is bounded regardless of shape.
        if let Some(cap) = config.max_idempotency_body_len {
            if body.len() > cap {
                return Err(ApiError::PayloadTooLarge);
            }
        }
        normalize_body(body)?
    };
    Ok(hash_parts(method, path, &normalized_body))
}

fn hash_parts(method: &str, path: &str, body_or_header: &str) -> String {
    let joined = format!("{}\n{path}\n{body_or_header}", method.to_uppercase());
    let digest = Sha256::digest(joined.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RequestConfig {
        RequestConfig::default()
    }

    #[test]
    fn same_key_regardless_of_body_field_order() {
        let a = derive_key(&config(), "post", "/v1/executions", None, br#"{"a":1,"b":2}"#).unwrap();
        let b = derive_key(&config(), "POST", "/v1/executions", None, br#"{"b":2,"a":1}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn header_bypasses_body_entirely() {
        let a = derive_key(&config(), "POST", "/v1/executions", Some("key-1"), b"not json at all").unwrap();
        let b = derive_key(&config(), "POST", "/v1/executions", Some("key-1"), b"{}").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversize_header_is_rejected() {
        let header = "x".repeat(51);
        let result = derive_key(&config(), "POST", "/v1/executions", Some(&header), b"{}");
        assert!(result.is_err());
    }

    #[test]
    fn non_json_body_without_header_is_rejected() {
        let result = derive_key(&config(), "POST", "/v1/executions", None, b"not json");
        assert!(result.is_err());
    }

    #[test]
    fn resolve_path_prefers_escaped_then_raw_then_uri_then_template() {
        assert_eq!(resolve_path(Some("/a"), Some("/b"), Some("/c?x=1"), Some("/:id")), "/a");
        assert_eq!(resolve_path(None, Some("/b"), Some("/c?x=1"), Some("/:id")), "/b");
        assert_eq!(resolve_path(None, None, Some("/c?x=1"), Some("/:id")), "/c");
        assert_eq!(resolve_path(None, None, None, Some("/:id")), "/:id");
    }
}
