//! Process-level cache configuration.

use std::env;
use std::time::Duration;

use compozy_core::config::ConfigError;

/// Loaded once at startup via [`CacheConfig::from_env`], in the style of
/// `compozy_core::config::StorageConfig::from_env`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: String,
    pub default_lease_ttl: Duration,
}

impl CacheConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let redis_url = env::var("REDIS_URL").map_err(|_| ConfigError::Missing("REDIS_URL"))?;
        let default_lease_ttl_secs = match env::var("LEASE_DEFAULT_TTL_SECS") {
            Err(_) => 86_400,
            Ok(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "LEASE_DEFAULT_TTL_SECS",
                value: raw.clone(),
            })?,
        };
        Ok(Self {
            redis_url,
            default_lease_ttl: Duration::from_secs(default_lease_ttl_secs),
        })
    }
}
