//! Backend Module
//!
//! Capability interface over a memcache-style backend plus an in-process
//! reference implementation. The backend offers no atomicity or ordering
//! guarantees across calls; all such reasoning lives in the store layer.

mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::store::CacheRecord;

pub use memory::MemoryBackend;

// == Public Constants ==
/// Default per-item size limit, matching the classic memcached default.
pub const DEFAULT_MAX_ITEM_SIZE: usize = 1024 * 1024; // 1 MiB

// == Backend Client Capability ==
/// Short, independent request/response calls against a fixed-size-item
/// memory cache. Implementations may be any memory-cache protocol client.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Fetches a single record, or None if the backend holds nothing usable
    /// under the key.
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>>;

    /// Bulk fetch. Keys with no record are simply absent from the result.
    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, CacheRecord>>;

    /// Stores a record. Returns `false` when the backend rejects the item
    /// (too large for one slot); transport failures are errors.
    ///
    /// `ttl_seconds <= 0` stores the item without a backend-side lifetime.
    async fn set(&self, key: &str, record: CacheRecord, ttl_seconds: i64) -> Result<bool>;

    /// Removes a record. Deleting a missing key is a no-op.
    async fn delete(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<B: BackendClient + ?Sized> BackendClient for Arc<B> {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>> {
        (**self).get(key).await
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, CacheRecord>> {
        (**self).get_multi(keys).await
    }

    async fn set(&self, key: &str, record: CacheRecord, ttl_seconds: i64) -> Result<bool> {
        (**self).set(key, record, ttl_seconds).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key).await
    }
}
