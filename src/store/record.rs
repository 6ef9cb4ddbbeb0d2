//! Cache Record Module
//!
//! Defines the structure of stored items: direct payloads, multipart parent
//! references, and the metadata consulted by validity checks.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// TTL value (and below) meaning "never expires".
///
/// Permanent records are removed only by explicit delete, backend eviction,
/// or the bin-wide watermark.
pub const TTL_PERMANENT: i64 = 0;

// == Multipart Reference ==
/// Payload alternative pointing at an ordered list of chunk keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartReference {
    /// Chunk keys in reconstruction order
    pub child_keys: Vec<String>,
}

// == Record Payload ==
/// The data slot of a record: either the caller's serialized bytes or a
/// reference to chunks. The enum makes "never both" structural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordPayload {
    /// Serialized caller value stored directly in this record
    Inline(Vec<u8>),
    /// Oversized value split across chunk records
    Multipart(MultipartReference),
}

impl RecordPayload {
    /// Approximate stored size in bytes, used for backend size limits.
    pub fn size(&self) -> usize {
        match self {
            RecordPayload::Inline(bytes) => bytes.len(),
            RecordPayload::Multipart(multi) => {
                multi.child_keys.iter().map(|k| k.len()).sum()
            }
        }
    }

    /// Returns true if this payload references chunk records.
    pub fn is_multipart(&self) -> bool {
        matches!(self, RecordPayload::Multipart(_))
    }
}

// == Cache Record ==
/// One stored item with expiry and invalidation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Full backend key, unique within the collection namespace
    pub key: String,
    /// Direct payload or multipart reference
    pub data: RecordPayload,
    /// Creation timestamp (Unix milliseconds), compared against the bin watermark
    pub created_at: i64,
    /// Absolute expiry timestamp (Unix milliseconds), None = never expires
    pub expire_at: Option<i64>,
    /// Canonical (sorted, deduplicated) invalidation tags
    pub tags: Vec<String>,
    /// Checksum of the tag set's invalidation state at write time
    pub checksum: u64,
}

impl CacheRecord {
    // == Constructor ==
    /// Creates a new record stamped with the current time.
    ///
    /// `tags` must already be canonical (see [`canonical_tags`]) so that two
    /// writes with the same tag set produce identical checksums.
    ///
    /// # Arguments
    /// * `key` - Full backend key
    /// * `data` - Payload, inline or multipart
    /// * `ttl_seconds` - Time to live; values <= [`TTL_PERMANENT`] never expire
    /// * `tags` - Canonical invalidation tags
    /// * `checksum` - Current checksum for `tags`
    pub fn new(
        key: String,
        data: RecordPayload,
        ttl_seconds: i64,
        tags: Vec<String>,
        checksum: u64,
    ) -> Self {
        let now = current_timestamp_ms();
        let expire_at = (ttl_seconds > TTL_PERMANENT).then(|| now + ttl_seconds * 1000);

        Self {
            key,
            data,
            created_at: now,
            expire_at,
            tags,
            checksum,
        }
    }

    // == Is Expired ==
    /// Checks if the record's own TTL has elapsed.
    ///
    /// A record is expired once the current time is greater than or equal to
    /// its expiry timestamp. Expiry is detected lazily on read; nothing
    /// sweeps expired records proactively.
    pub fn is_expired(&self) -> bool {
        match self.expire_at {
            Some(expire_at) => current_timestamp_ms() >= expire_at,
            None => false,
        }
    }

    /// Returns true if the record never expires on its own.
    pub fn is_permanent(&self) -> bool {
        self.expire_at.is_none()
    }

    /// Remaining TTL in whole seconds, rounded up; None for permanent records.
    ///
    /// Used by rename to carry the source record's lifetime to the new key.
    pub fn ttl_remaining_seconds(&self) -> Option<i64> {
        self.expire_at.map(|expire_at| {
            let remaining_ms = expire_at - current_timestamp_ms();
            if remaining_ms > 0 {
                (remaining_ms + 999) / 1000
            } else {
                0
            }
        })
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Canonicalizes a tag set: sorted and deduplicated.
///
/// Checksums are computed over the canonical form, so any two writes with
/// the same logical tag set agree on the checksum input.
pub fn canonical_tags<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut tags: Vec<String> = tags.into_iter().collect();
    tags.sort();
    tags.dedup();
    tags
}
