//! An in-memory `LeaseStore` for tests that shouldn't need a real Redis instance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::LeaseError;
use crate::lease::LeaseStore;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Expiry is checked lazily on each access rather than swept by a background task.
#[derive(Default)]
pub struct InMemoryLeaseStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_live(entry: &Entry, now: Instant) -> bool {
        entry.expires_at > now
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn claim_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LeaseError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key) {
            if Self::is_live(existing, now) {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LeaseError> {
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|e| Self::is_live(e, now))
            .map(|e| e.value.clone()))
    }

    async fn set_if_present(&self, key: &str, value: &str) -> Result<bool, LeaseError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if Self::is_live(entry, now) => {
                entry.value = value.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), LeaseError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::conformance;

    #[tokio::test]
    async fn conforms_to_lease_store_contract() {
        let store = InMemoryLeaseStore::new();
        conformance::run(&store).await;
    }

    #[tokio::test]
    async fn expired_lease_can_be_reclaimed() {
        let store = InMemoryLeaseStore::new();
        assert!(store
            .claim_if_absent("k", "v1", Duration::from_millis(1))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store
            .claim_if_absent("k", "v2", Duration::from_secs(30))
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
    }
}
