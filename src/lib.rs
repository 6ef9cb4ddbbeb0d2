//! memkv - Expirable key/value storage over a memcache-style backend
//!
//! Stores values of arbitrary size and lifetime under string keys, splitting
//! oversized values into linked chunk records and validating every read
//! against a bin-wide invalidation watermark and per-tag checksums.

pub mod backend;
pub mod config;
pub mod error;
pub mod serialize;
pub mod store;

pub use backend::{BackendClient, MemoryBackend};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use serialize::{JsonSerializer, Serializer};
pub use store::{
    CacheRecord, ExpirableStore, InvalidationState, MultipartReference, RecordPayload,
    TTL_PERMANENT,
};
