//! Memory Backend Module
//!
//! In-process reference implementation of the backend capability. Enforces a
//! per-item size limit like a real memcache daemon and expires items lazily
//! on read.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::{BackendClient, DEFAULT_MAX_ITEM_SIZE};
use crate::error::Result;
use crate::store::{current_timestamp_ms, CacheRecord};

// == Stored Item ==
/// A record plus the backend-side expiry derived from the set call's TTL.
#[derive(Debug, Clone)]
struct StoredItem {
    record: CacheRecord,
    /// Unix ms after which the backend no longer serves the item
    expires_at: Option<i64>,
}

impl StoredItem {
    fn is_live(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

// == Memory Backend ==
/// HashMap-backed cache honoring the memcache item-size limit.
#[derive(Debug)]
pub struct MemoryBackend {
    items: RwLock<HashMap<String, StoredItem>>,
    max_item_size: usize,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates a backend with the default 1 MiB item-size limit.
    pub fn new() -> Self {
        Self::with_max_item_size(DEFAULT_MAX_ITEM_SIZE)
    }

    /// Creates a backend with an explicit item-size limit.
    pub fn with_max_item_size(max_item_size: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            max_item_size,
        }
    }

    /// Number of live items currently held.
    pub async fn len(&self) -> usize {
        let now = current_timestamp_ms();
        self.items
            .read()
            .await
            .values()
            .filter(|item| item.is_live(now))
            .count()
    }

    /// Returns true if the backend holds no live items.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keys of all live items, in no particular order.
    ///
    /// A real memcache cannot enumerate keys; this exists for inspection in
    /// tests of chunk bookkeeping.
    pub async fn keys(&self) -> Vec<String> {
        let now = current_timestamp_ms();
        self.items
            .read()
            .await
            .iter()
            .filter(|(_, item)| item.is_live(now))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendClient for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>> {
        let now = current_timestamp_ms();
        let items = self.items.read().await;
        Ok(items
            .get(key)
            .filter(|item| item.is_live(now))
            .map(|item| item.record.clone()))
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, CacheRecord>> {
        let now = current_timestamp_ms();
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| {
                items
                    .get(key)
                    .filter(|item| item.is_live(now))
                    .map(|item| (key.clone(), item.record.clone()))
            })
            .collect())
    }

    async fn set(&self, key: &str, record: CacheRecord, ttl_seconds: i64) -> Result<bool> {
        // Only inline payloads count against the item limit. A multipart
        // parent is a short key list, negligible next to any payload slot.
        if !record.data.is_multipart() && record.data.size() > self.max_item_size {
            return Ok(false);
        }

        let expires_at = (ttl_seconds > 0).then(|| current_timestamp_ms() + ttl_seconds * 1000);
        let mut items = self.items.write().await;
        items.insert(key.to_string(), StoredItem { record, expires_at });
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut items = self.items.write().await;
        items.remove(key);
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RecordPayload, TTL_PERMANENT};

    fn record(key: &str, payload: &[u8]) -> CacheRecord {
        CacheRecord::new(
            key.into(),
            RecordPayload::Inline(payload.to_vec()),
            TTL_PERMANENT,
            vec![],
            0,
        )
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let backend = MemoryBackend::new();

        assert!(backend.set("k", record("k", b"v"), 0).await.unwrap());
        let fetched = backend.get("k").await.unwrap().unwrap();

        assert_eq!(fetched.data, RecordPayload::Inline(b"v".to_vec()));
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let backend = MemoryBackend::new();
        assert!(backend.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_multi_skips_missing() {
        let backend = MemoryBackend::new();
        backend.set("a", record("a", b"1"), 0).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string()];
        let fetched = backend.get_multi(&keys).await.unwrap();

        assert_eq!(fetched.len(), 1);
        assert!(fetched.contains_key("a"));
    }

    #[tokio::test]
    async fn test_rejects_oversized_item() {
        let backend = MemoryBackend::with_max_item_size(4);

        assert!(!backend.set("k", record("k", b"too big"), 0).await.unwrap());
        assert!(backend.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_noop_for_missing() {
        let backend = MemoryBackend::new();
        backend.delete("missing").await.unwrap();

        backend.set("k", record("k", b"v"), 0).await.unwrap();
        backend.delete("k").await.unwrap();
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_backend_ttl_expires_lazily() {
        let backend = MemoryBackend::new();
        backend.set("k", record("k", b"v"), 1).await.unwrap();

        assert!(backend.get("k").await.unwrap().is_some());

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        assert!(backend.get("k").await.unwrap().is_none());
        assert!(backend.is_empty().await);
    }
}
