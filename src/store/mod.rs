//! Store Module
//!
//! The expirable storage engine: record model, chunking, validity checks,
//! invalidation state, and the public store type.

pub mod chunker;
mod expirable;
mod invalidation;
mod record;
pub mod validity;


// Re-export public types
pub use expirable::ExpirableStore;
pub use invalidation::InvalidationState;
pub use record::{
    canonical_tags, current_timestamp_ms, CacheRecord, MultipartReference, RecordPayload,
    TTL_PERMANENT,
};
