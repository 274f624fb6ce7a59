//! Redis-backed `LeaseStore`, using `SET key value NX PX ttl_ms` for the claim.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::LeaseError;
use crate::lease::LeaseStore;

#[derive(Clone)]
pub struct RedisLeaseStore {
    conn: ConnectionManager,
}

impl RedisLeaseStore {
    pub async fn connect(redis_url: &str) -> Result<Self, LeaseError> {
        let client = redis::Client::open(redis_url).map_err(LeaseError::backend)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl LeaseStore for RedisLeaseStore {
    async fn claim_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LeaseError> {
        let mut conn = self.conn.clone();
        let ttl_ms = ttl.as_millis().max(1) as u64;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        let claimed = reply.is_some();
        debug!(key, claimed, "lease claim attempted");
        Ok(claimed)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LeaseError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_if_present(&self, key: &str, value: &str) -> Result<bool, LeaseError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), LeaseError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::conformance;

    // Gated on REDIS_URL so the default test run never needs a live Redis instance,
    // matching how `durable`'s Postgres integration tests gate on DATABASE_URL.
    #[tokio::test]
    #[ignore]
    async fn conforms_to_lease_store_contract() {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let store = RedisLeaseStore::connect(&url)
            .await
            .expect("connect to redis");
        conformance::run(&store).await;
    }
}
