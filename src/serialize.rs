//! Serialization Module
//!
//! Pluggable serializer capability for caller values. Any format with
//! deterministic byte output and exact round-tripping qualifies.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

// == Serializer Capability ==
/// Encodes caller values to bytes and back.
///
/// Implementations must round-trip exactly: `decode(encode(v)) == v`.
pub trait Serializer: Send + Sync {
    /// Encodes a value into its byte representation.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decodes a value from its byte representation.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

// == JSON Serializer ==
/// Default serializer backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}
