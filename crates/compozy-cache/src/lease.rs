//! The lease store trait boundary between the idempotency gate and its backing cache.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::LeaseError;

/// A claim-if-absent lock keyed by an arbitrary string, with a bound lifetime.
///
/// `RedisLeaseStore` is the production implementation; `InMemoryLeaseStore` is a test
/// fake. Both must satisfy the same semantics, exercised in `conformance::run` from
/// each implementation's own test module so they cannot silently diverge.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Atomically claim `key` with `value`, only if no live lease exists under it.
    /// Returns `true` if this call created the lease, `false` if one was already held
    /// (the idempotent-retry case).
    async fn claim_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LeaseError>;

    /// The value currently stored under `key`, if a live lease exists.
    async fn get(&self, key: &str) -> Result<Option<String>, LeaseError>;

    /// Overwrite the value stored under `key`, preserving its existing TTL. Returns
    /// `false` without effect if no live lease exists under `key`.
    async fn set_if_present(&self, key: &str, value: &str) -> Result<bool, LeaseError>;

    /// Remove any lease held under `key`.
    async fn delete(&self, key: &str) -> Result<(), LeaseError>;
}

#[cfg(test)]
pub(crate) mod conformance {
    use super::*;

    /// Runs the same sequence of assertions against any `LeaseStore` implementation.
    pub(crate) async fn run(store: &dyn LeaseStore) {
        let key = "conformance-key";
        let ttl = Duration::from_secs(30);

        assert_eq!(store.get(key).await.unwrap(), None);

        assert!(store.claim_if_absent(key, "first", ttl).await.unwrap());
        assert_eq!(store.get(key).await.unwrap(), Some("first".to_string()));

        assert!(!store.claim_if_absent(key, "second", ttl).await.unwrap());
        assert_eq!(store.get(key).await.unwrap(), Some("first".to_string()));

        assert!(store.set_if_present(key, "updated").await.unwrap());
        assert_eq!(store.get(key).await.unwrap(), Some("updated".to_string()));

        store.delete(key).await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), None);

        assert!(!store.set_if_present(key, "never").await.unwrap());

        assert!(store.claim_if_absent(key, "reclaimed", ttl).await.unwrap());
        assert_eq!(store.get(key).await.unwrap(), Some("reclaimed".to_string()));
    }
}
