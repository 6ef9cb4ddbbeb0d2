//! Chunker Module
//!
//! Pure functions for splitting oversized payloads into fixed-size chunks
//! and reassembling them. Chunk keys are derived deterministically from the
//! parent key, so rewriting the same key overwrites the previous chunks in
//! place instead of leaking orphans.

use std::collections::HashMap;

use crate::error::{Result, StoreError};

// == Chunk Key ==
/// Derives the backend key for chunk `index` of `parent_key`.
pub fn chunk_key(parent_key: &str, index: usize) -> String {
    format!("{parent_key}.chunk.{index}")
}

// == Split ==
/// Partitions a payload into `chunk_size`-byte pieces with derived keys.
///
/// Deterministic: the same payload under the same parent key always yields
/// the same (key, bytes) sequence. An empty payload yields no chunks.
///
/// `chunk_size` must be non-zero; `StoreConfig::validate` guarantees this
/// for every configured store.
pub fn split(parent_key: &str, payload: &[u8], chunk_size: usize) -> Vec<(String, Vec<u8>)> {
    debug_assert!(chunk_size > 0, "chunk_size must be non-zero");

    payload
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, part)| (chunk_key(parent_key, index), part.to_vec()))
        .collect()
}

// == Combine ==
/// Reassembles a payload from fetched chunk parts, in `child_keys` order.
///
/// Fails with [`StoreError::IncompleteChunkSet`] if any expected chunk is
/// absent from `parts`. Callers on the read path treat that as a miss.
pub fn combine(
    parent_key: &str,
    child_keys: &[String],
    mut parts: HashMap<String, Vec<u8>>,
) -> Result<Vec<u8>> {
    let found = child_keys.iter().filter(|k| parts.contains_key(*k)).count();
    if found != child_keys.len() {
        return Err(StoreError::IncompleteChunkSet {
            key: parent_key.to_string(),
            expected: child_keys.len(),
            found,
        });
    }

    let mut payload = Vec::with_capacity(parts.values().map(|part| part.len()).sum());
    for key in child_keys {
        // Presence verified above
        let part = parts.remove(key).unwrap_or_default();
        payload.extend_from_slice(&part);
    }
    Ok(payload)
}
