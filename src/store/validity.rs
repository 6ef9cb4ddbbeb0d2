//! Validity Checker Module
//!
//! Decides whether a fetched record is still authoritative. An invalid
//! record is treated exactly like a cache miss, never as an error.

use crate::store::invalidation::InvalidationState;
use crate::store::record::CacheRecord;

// == Validity Verdict ==
/// Why a record is (in)valid. Anything but `Valid` reads as a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    /// The record's own TTL elapsed
    Expired,
    /// Created at or before the bin watermark
    StaleWatermark,
    /// A tag was invalidated after the record was written
    ChecksumMismatch,
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validity::Valid)
    }
}

// == Freshness ==
/// A record is fresh only if it was created strictly after the watermark.
pub fn is_fresh(record: &CacheRecord, watermark: i64) -> bool {
    record.created_at > watermark
}

// == Checksum ==
/// A record's checksum must equal the checksum currently associated with
/// its tag set.
pub fn is_checksum_valid(record: &CacheRecord, current_checksum: u64) -> bool {
    record.checksum == current_checksum
}

// == Combined Check ==
/// Full per-record validity decision against the bin's invalidation state.
pub fn check(record: &CacheRecord, state: &InvalidationState) -> Validity {
    if record.is_expired() {
        return Validity::Expired;
    }
    if !is_fresh(record, state.watermark()) {
        return Validity::StaleWatermark;
    }
    if !is_checksum_valid(record, state.checksum_for(&record.tags)) {
        return Validity::ChecksumMismatch;
    }
    Validity::Valid
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::record::{RecordPayload, TTL_PERMANENT};

    fn record_with_tags(tags: Vec<String>, checksum: u64) -> CacheRecord {
        CacheRecord::new(
            "coll:k".into(),
            RecordPayload::Inline(b"v".to_vec()),
            TTL_PERMANENT,
            tags,
            checksum,
        )
    }

    #[test]
    fn test_fresh_record_is_valid() {
        let state = InvalidationState::new();
        let record = record_with_tags(vec![], 0);

        assert_eq!(check(&record, &state), Validity::Valid);
    }

    #[test]
    fn test_watermark_staleness_is_strict() {
        let state = InvalidationState::new();
        let record = record_with_tags(vec![], 0);

        // Equal to the watermark is stale, strictly greater is fresh.
        assert!(!is_fresh(&record, record.created_at));
        assert!(is_fresh(&record, record.created_at - 1));
    }

    #[test]
    fn test_record_behind_watermark_is_stale() {
        let mut state = InvalidationState::new();
        let record = record_with_tags(vec![], 0);
        state.advance_watermark();

        assert_eq!(check(&record, &state), Validity::StaleWatermark);
    }

    #[test]
    fn test_checksum_mismatch_after_tag_invalidation() {
        let mut state = InvalidationState::new();
        let tags = vec!["t1".to_string()];
        let record = record_with_tags(tags.clone(), state.checksum_for(&tags));

        // Created strictly after the zero watermark, so freshness passes and
        // the checksum is what fails.
        state.invalidate_tags(&["t1"]);
        assert_eq!(check(&record, &state), Validity::ChecksumMismatch);
    }

    #[test]
    fn test_expired_record() {
        let state = InvalidationState::new();
        let mut record = record_with_tags(vec![], 0);
        record.expire_at = Some(record.created_at);

        assert_eq!(check(&record, &state), Validity::Expired);
    }
}
