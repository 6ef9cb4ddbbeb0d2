//! Expirable Store Module
//!
//! The public-facing engine: composes the backend client, serializer,
//! chunker, and validity checker into the get/set/delete contract for one
//! collection. The backend offers no transactions, so every multi-key
//! operation here is best-effort and every reconstruction failure on the
//! read path is folded into a miss.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::BackendClient;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::serialize::Serializer;
use crate::store::chunker;
use crate::store::invalidation::InvalidationState;
use crate::store::record::{
    canonical_tags, CacheRecord, MultipartReference, RecordPayload, TTL_PERMANENT,
};
use crate::store::validity;

// == Expirable Store ==
/// Key/value store with per-item expiration over a memcache-style backend.
///
/// Scoped to one collection; keys are prefixed with the collection name so
/// collections sharing a backend never collide. Oversized values are split
/// into chunk records transparently; reads validate every record against the
/// bin watermark and its tag checksum before surfacing it.
#[derive(Debug)]
pub struct ExpirableStore<B, S> {
    /// Collection (bin) name, used as the key prefix
    collection: String,
    /// Transport to the cache backend
    backend: B,
    /// Caller-value codec
    serializer: S,
    /// Size limits driving the chunking fallback
    config: StoreConfig,
    /// Watermark and tag generations, shared across stores of this bin
    invalidation: Arc<RwLock<InvalidationState>>,
    /// Tag stamped on every record of this collection
    bin_tag: String,
}

impl<B, S> ExpirableStore<B, S>
where
    B: BackendClient,
    S: Serializer,
{
    // == Constructor ==
    /// Creates a store for `collection` with a fresh invalidation state.
    ///
    /// The fresh state trusts whatever the backend already holds: the
    /// watermark starts at zero and no tag has been invalidated.
    pub fn new(
        collection: impl Into<String>,
        backend: B,
        serializer: S,
        config: StoreConfig,
    ) -> Result<Self> {
        Self::with_shared_invalidation(
            collection,
            backend,
            serializer,
            config,
            Arc::new(RwLock::new(InvalidationState::new())),
        )
    }

    /// Creates a store sharing an existing invalidation state, so several
    /// store instances (or collaborators) see the same watermark and tag
    /// generations for one bin.
    pub fn with_shared_invalidation(
        collection: impl Into<String>,
        backend: B,
        serializer: S,
        config: StoreConfig,
        invalidation: Arc<RwLock<InvalidationState>>,
    ) -> Result<Self> {
        config.validate()?;
        let collection = collection.into();
        let bin_tag = format!("kv:{collection}");
        Ok(Self {
            collection,
            backend,
            serializer,
            config,
            invalidation,
            bin_tag,
        })
    }

    /// The collection this store is scoped to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Handle to the shared invalidation state of this bin.
    pub fn invalidation_handle(&self) -> Arc<RwLock<InvalidationState>> {
        Arc::clone(&self.invalidation)
    }

    /// Full backend key for a caller key.
    fn item_key(&self, key: &str) -> String {
        format!("{}:{}", self.collection, key)
    }

    // == Has ==
    /// Returns true iff a fresh, checksum-valid, non-expired record exists.
    ///
    /// Single-key fetch rather than a separate existence probe, so there is
    /// no window between "exists" and "fetchable". Multipart parents are
    /// validated without fetching their chunks.
    pub async fn has(&self, key: &str) -> Result<bool> {
        match self.backend.get(&self.item_key(key)).await? {
            Some(record) => {
                let state = self.invalidation.read().await;
                Ok(validity::check(&record, &state).is_valid())
            }
            None => Ok(false),
        }
    }

    // == Get ==
    /// Fetches a single value, or None if the key holds no valid record.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut fetched = self.get_multiple(&[key]).await?;
        Ok(fetched.remove(key))
    }

    // == Get Multiple ==
    /// Bulk fetch. Keys with no valid record are absent from the result;
    /// callers distinguish present from absent solely by map membership.
    ///
    /// A record is dropped, never errored, when it is stale by watermark,
    /// checksum-invalid, expired, an undecodable payload, or a multipart
    /// parent whose chunks cannot all be fetched.
    pub async fn get_multiple<T: DeserializeOwned>(
        &self,
        keys: &[&str],
    ) -> Result<HashMap<String, T>> {
        let full_keys: Vec<String> = keys.iter().map(|key| self.item_key(key)).collect();
        let mut cache = self.backend.get_multi(&full_keys).await?;

        let mut fetched = HashMap::new();
        let state = self.invalidation.read().await;

        for (key, full_key) in keys.iter().zip(&full_keys) {
            let Some(record) = cache.remove(full_key) else {
                continue;
            };

            let verdict = validity::check(&record, &state);
            if !verdict.is_valid() {
                debug!(key, ?verdict, "dropping invalid record");
                continue;
            }

            let bytes = match record.data {
                RecordPayload::Inline(bytes) => bytes,
                RecordPayload::Multipart(multi) => {
                    match self.fetch_chunks(full_key, &multi).await {
                        Ok(bytes) => bytes,
                        Err(StoreError::IncompleteChunkSet {
                            expected, found, ..
                        }) => {
                            // A concurrent writer or eviction took a chunk
                            // out from under us; the parent is unusable.
                            debug!(key, expected, found, "missing chunks, treating as miss");
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                }
            };

            match self.serializer.decode(&bytes) {
                Ok(value) => {
                    fetched.insert((*key).to_string(), value);
                }
                Err(e) => {
                    warn!(key, error = %e, "undecodable cached payload, treating as miss");
                }
            }
        }

        Ok(fetched)
    }

    /// Fetches and reassembles the chunks behind a multipart parent.
    async fn fetch_chunks(
        &self,
        parent_key: &str,
        multi: &MultipartReference,
    ) -> Result<Vec<u8>> {
        let fetched = self.backend.get_multi(&multi.child_keys).await?;

        let mut parts = HashMap::with_capacity(fetched.len());
        for (chunk_key, record) in fetched {
            // A chunk slot overwritten by something that is not an inline
            // payload counts as absent.
            if let RecordPayload::Inline(bytes) = record.data {
                parts.insert(chunk_key, bytes);
            }
        }

        chunker::combine(parent_key, &multi.child_keys, parts)
    }

    // == Set ==
    /// Stores a value permanently: removed only by explicit delete, backend
    /// eviction, or the bin watermark.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_expire(key, value, TTL_PERMANENT).await
    }

    // == Set With Expire ==
    /// Stores a value with a time to live.
    ///
    /// `ttl_seconds <= 0` stores permanently. If the backend rejects the
    /// record as too large, the payload is split into chunks which are
    /// written first; the parent referencing them is only committed once
    /// every chunk write succeeded.
    pub async fn set_with_expire<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: i64,
    ) -> Result<()> {
        self.set_tagged::<T, &str>(key, value, ttl_seconds, &[]).await
    }

    // == Set Tagged ==
    /// Same as [`set_with_expire`](Self::set_with_expire) with caller tags
    /// folded into the record's canonical tag set. The bin tag is always
    /// included.
    pub async fn set_tagged<T, G>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: i64,
        extra_tags: &[G],
    ) -> Result<()>
    where
        T: Serialize,
        G: AsRef<str>,
    {
        let bytes = self.serializer.encode(value)?;
        let mut tags: Vec<String> = extra_tags
            .iter()
            .map(|tag| tag.as_ref().to_string())
            .collect();
        tags.push(self.bin_tag.clone());
        self.write_record(key, bytes, ttl_seconds, canonical_tags(tags))
            .await
    }

    /// Shared write path: direct write with chunked fallback.
    ///
    /// `tags` must already be canonical.
    async fn write_record(
        &self,
        key: &str,
        bytes: Vec<u8>,
        ttl_seconds: i64,
        tags: Vec<String>,
    ) -> Result<()> {
        let checksum = self.invalidation.read().await.checksum_for(&tags);
        let full_key = self.item_key(key);
        let record = CacheRecord::new(
            full_key.clone(),
            RecordPayload::Inline(bytes.clone()),
            ttl_seconds,
            tags.clone(),
            checksum,
        );

        if self.backend.set(&full_key, record.clone(), ttl_seconds).await? {
            return Ok(());
        }

        // The backend rejected the item, so it exceeds one slot. Write the
        // chunks first: a parent must never point at chunks that were not
        // all committed.
        debug!(key, size = bytes.len(), "item rejected by backend, splitting into chunks");
        let parts = chunker::split(&full_key, &bytes, self.config.chunk_size());
        let mut child_keys = Vec::with_capacity(parts.len());
        for (index, (chunk_key, chunk_bytes)) in parts.into_iter().enumerate() {
            let chunk_record = CacheRecord::new(
                chunk_key.clone(),
                RecordPayload::Inline(chunk_bytes),
                ttl_seconds,
                tags.clone(),
                checksum,
            );
            if !self.backend.set(&chunk_key, chunk_record, ttl_seconds).await? {
                warn!(key, chunk = index, "chunk write rejected, aborting multipart write");
                return Err(StoreError::PartialWriteFailure {
                    key: key.to_string(),
                    reason: format!("chunk {index} write rejected by backend"),
                });
            }
            child_keys.push(chunk_key);
        }

        let parent = CacheRecord {
            data: RecordPayload::Multipart(MultipartReference { child_keys }),
            ..record
        };
        if self.backend.set(&full_key, parent, ttl_seconds).await? {
            Ok(())
        } else {
            Err(StoreError::ValueTooLarge {
                key: key.to_string(),
                size: bytes.len(),
                limit: self.config.max_item_size,
            })
        }
    }

    // == Set Multiple With Expire ==
    /// Applies [`set_with_expire`](Self::set_with_expire) per item. No
    /// cross-item atomicity: keys written before a failure stay written, and
    /// the failed keys are reported together afterwards.
    pub async fn set_multiple_with_expire<T: Serialize>(
        &self,
        items: &HashMap<String, T>,
        ttl_seconds: i64,
    ) -> Result<()> {
        let mut failed: Vec<String> = Vec::new();
        for (key, value) in items {
            if let Err(e) = self.set_with_expire(key, value, ttl_seconds).await {
                warn!(key = %key, error = %e, "batch write failed for key");
                failed.push(key.clone());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            failed.sort();
            Err(StoreError::PartialWriteFailure {
                key: failed.join(", "),
                reason: "one or more keys failed in batch write".to_string(),
            })
        }
    }

    // == Conditional Writes ==
    /// Writes only if the key holds no valid record. Returns `Ok(false)`
    /// without writing when it does.
    ///
    /// Check-then-act: racy against concurrent writers, since the backend
    /// offers no compare-and-swap. Callers needing strict exclusivity must
    /// coordinate externally.
    pub async fn set_if_not_exists<T: Serialize>(&self, key: &str, value: &T) -> Result<bool> {
        self.set_with_expire_if_not_exists(key, value, TTL_PERMANENT)
            .await
    }

    /// TTL variant of [`set_if_not_exists`](Self::set_if_not_exists).
    pub async fn set_with_expire_if_not_exists<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: i64,
    ) -> Result<bool> {
        if self.has(key).await? {
            return Ok(false);
        }
        self.set_with_expire(key, value, ttl_seconds).await?;
        Ok(true)
    }

    // == Rename ==
    /// Moves a record to a new key, preserving its remaining TTL and tags,
    /// then deletes the old key and any chunks.
    ///
    /// Fails with [`StoreError::KeyNotFound`] if the source key holds no
    /// valid record, including a multipart parent that cannot be
    /// reconstructed.
    pub async fn rename(&self, key: &str, new_key: &str) -> Result<()> {
        let full_key = self.item_key(key);
        let Some(record) = self.backend.get(&full_key).await? else {
            return Err(StoreError::KeyNotFound(key.to_string()));
        };

        {
            let state = self.invalidation.read().await;
            if !validity::check(&record, &state).is_valid() {
                return Err(StoreError::KeyNotFound(key.to_string()));
            }
        }

        let ttl_seconds = record.ttl_remaining_seconds().unwrap_or(TTL_PERMANENT);
        let bytes = match record.data {
            RecordPayload::Inline(bytes) => bytes,
            RecordPayload::Multipart(multi) => {
                match self.fetch_chunks(&full_key, &multi).await {
                    Ok(bytes) => bytes,
                    Err(StoreError::IncompleteChunkSet { .. }) => {
                        return Err(StoreError::KeyNotFound(key.to_string()));
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        // Tags from the fetched record are already canonical; the checksum
        // is recomputed inside write_record since this is a fresh write.
        self.write_record(new_key, bytes, ttl_seconds, record.tags)
            .await?;
        self.delete_multiple(&[key]).await
    }

    // == Delete ==
    /// Removes a single key; missing keys are a no-op.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.delete_multiple(&[key]).await
    }

    // == Delete Multiple ==
    /// Removes records and, for multipart parents, their chunks. Chunks go
    /// first so a crash between the two deletes cannot leave a parent
    /// pointing at freed slots being reused.
    pub async fn delete_multiple(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            let full_key = self.item_key(key);
            if let Some(record) = self.backend.get(&full_key).await? {
                if let RecordPayload::Multipart(multi) = record.data {
                    for child_key in &multi.child_keys {
                        self.backend.delete(child_key).await?;
                    }
                }
            }
            self.backend.delete(&full_key).await?;
        }
        Ok(())
    }

    // == Delete All ==
    /// Clears the collection in O(1) by advancing the bin watermark: every
    /// record created at or before this instant becomes stale. Physical
    /// reclamation of backend slots is left to the backend's own eviction.
    pub async fn delete_all(&self) {
        let mut state = self.invalidation.write().await;
        let watermark = state.advance_watermark();
        info!(collection = %self.collection, watermark, "advanced bin watermark");
    }

    // == Invalidate Tags ==
    /// Bumps the generation of each tag, staling every record (in any
    /// collection sharing this invalidation state) stamped with an older
    /// checksum for those tags.
    pub async fn invalidate_tags<G: AsRef<str>>(&self, tags: &[G]) {
        let mut state = self.invalidation.write().await;
        state.invalidate_tags(tags);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::serialize::JsonSerializer;

    fn store() -> ExpirableStore<MemoryBackend, JsonSerializer> {
        ExpirableStore::new(
            "test",
            MemoryBackend::new(),
            JsonSerializer,
            StoreConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get_round_trip() {
        let store = store();

        store.set_with_expire("k", &"value".to_string(), 60).await.unwrap();
        let fetched: Option<String> = store.get("k").await.unwrap();

        assert_eq!(fetched.as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_has_missing_key() {
        let store = store();
        assert!(!store.has("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_has_after_set() {
        let store = store();
        store.set("k", &1u32).await.unwrap();

        assert!(store.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_multiple_skips_absent() {
        let store = store();
        store.set("present", &"v".to_string()).await.unwrap();

        let fetched: HashMap<String, String> =
            store.get_multiple(&["present", "absent"]).await.unwrap();

        assert_eq!(fetched.len(), 1);
        assert!(fetched.contains_key("present"));
        assert!(!fetched.contains_key("absent"));
    }

    #[tokio::test]
    async fn test_ttl_expiry_reads_as_miss() {
        let store = store();
        store.set_with_expire("k", &"v".to_string(), 1).await.unwrap();

        assert!(store.has("k").await.unwrap());

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        assert!(!store.has("k").await.unwrap());
        let fetched: Option<String> = store.get("k").await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_permanent() {
        let store = store();
        store.set_with_expire("k", &"v".to_string(), 0).await.unwrap();

        assert!(store.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_all_advances_watermark() {
        let store = store();
        store.set("k1", &"a".to_string()).await.unwrap();
        store.set("k2", &"b".to_string()).await.unwrap();

        store.delete_all().await;

        let fetched: HashMap<String, String> =
            store.get_multiple(&["k1", "k2"]).await.unwrap();
        assert!(fetched.is_empty());
    }

    #[tokio::test]
    async fn test_set_if_not_exists() {
        let store = store();

        assert!(store.set_if_not_exists("k", &"first".to_string()).await.unwrap());
        assert!(!store.set_if_not_exists("k", &"second".to_string()).await.unwrap());

        let fetched: Option<String> = store.get("k").await.unwrap();
        assert_eq!(fetched.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_collections_do_not_collide() {
        let backend = Arc::new(MemoryBackend::new());
        let first = ExpirableStore::new(
            "alpha",
            Arc::clone(&backend),
            JsonSerializer,
            StoreConfig::default(),
        )
        .unwrap();
        let second = ExpirableStore::new(
            "beta",
            Arc::clone(&backend),
            JsonSerializer,
            StoreConfig::default(),
        )
        .unwrap();

        first.set("k", &"from alpha".to_string()).await.unwrap();

        let fetched: Option<String> = second.get("k").await.unwrap();
        assert!(fetched.is_none());
    }
}
