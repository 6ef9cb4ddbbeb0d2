//! Error types for the storage engine
//!
//! Provides unified error handling using thiserror.
//!
//! Staleness, checksum mismatch, and missing keys are never errors: they are
//! folded into absence by the store. Only transport and structural failures
//! surface through this type.

use thiserror::Error;

// == Store Error Enum ==
/// Unified error type for the expirable store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport-level backend failure. Propagated to the caller, never
    /// retried inside this layer.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A record was rejected by the backend even after chunking.
    #[error("Value for key '{key}' exceeds backend limits ({size} > {limit} bytes)")]
    ValueTooLarge {
        key: String,
        size: usize,
        limit: usize,
    },

    /// One or more chunks of a multipart record could not be fetched.
    /// Reads treat this as a miss; it only escapes from `combine` itself.
    #[error("Incomplete chunk set for key '{key}': expected {expected} chunks, found {found}")]
    IncompleteChunkSet {
        key: String,
        expected: usize,
        found: usize,
    },

    /// A chunk write failed mid-way through a multipart write. The parent
    /// record is never committed in that case.
    #[error("Multipart write for key '{key}' aborted: {reason}")]
    PartialWriteFailure { key: String, reason: String },

    /// Key required to exist but holds no valid record (rename source).
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Serializer failed to encode or decode a value.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Store configuration rejected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the storage engine.
pub type Result<T> = std::result::Result<T, StoreError>;
