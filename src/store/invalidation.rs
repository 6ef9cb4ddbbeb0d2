//! Invalidation State Module
//!
//! The bin-wide watermark and per-tag generation counters. This is the only
//! shared mutable coordination state in the engine; stores of the same bin
//! share one instance behind `Arc<RwLock<_>>`.

use std::collections::HashMap;

use crate::store::record::current_timestamp_ms;

// == Invalidation State ==
/// Watermark and tag invalidation counters for one bin.
///
/// A fresh state has watermark 0 and no tag generations, so existing backend
/// contents written by a previous process remain trusted until the first
/// `delete_all` or tag invalidation.
#[derive(Debug, Default)]
pub struct InvalidationState {
    /// Everything created at or before this instant (Unix ms) is invalid
    watermark: i64,
    /// Invalidation count per tag; absent tag = 0
    tag_generations: HashMap<String, u64>,
}

impl InvalidationState {
    /// Creates a fresh invalidation state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current bin watermark (Unix milliseconds).
    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    // == Advance Watermark ==
    /// Moves the watermark to now, invalidating every record created at or
    /// before this instant. Never moves backwards.
    ///
    /// Returns the new watermark.
    pub fn advance_watermark(&mut self) -> i64 {
        self.watermark = self.watermark.max(current_timestamp_ms());
        self.watermark
    }

    // == Tag Checksum ==
    /// Checksum of the current invalidation state of a tag set.
    ///
    /// Sum of the tag generation counters. Invalidating any tag in the set
    /// changes the sum, so records stamped with an earlier checksum no longer
    /// match. `tags` is expected in canonical form; since addition is
    /// commutative the sum is order-independent either way.
    pub fn checksum_for(&self, tags: &[String]) -> u64 {
        tags.iter()
            .map(|tag| self.tag_generations.get(tag).copied().unwrap_or(0))
            .sum()
    }

    // == Invalidate Tags ==
    /// Bumps the generation of each given tag, staling every record whose
    /// stored checksum covered an older generation.
    pub fn invalidate_tags<S: AsRef<str>>(&mut self, tags: &[S]) {
        for tag in tags {
            *self
                .tag_generations
                .entry(tag.as_ref().to_string())
                .or_insert(0) += 1;
        }
    }
}
