//! Configuration Module
//!
//! Handles loading and managing store configuration from environment variables.

use std::env;

use crate::error::{Result, StoreError};

/// Store configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum size in bytes the backend accepts for a single item
    pub max_item_size: usize,
    /// Bytes reserved per chunk record for key and metadata overhead
    pub record_overhead: usize,
}

impl StoreConfig {
    /// Creates a new StoreConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMKV_MAX_ITEM_SIZE` - Backend per-item size limit in bytes (default: 1048576)
    /// - `MEMKV_RECORD_OVERHEAD` - Per-chunk metadata margin in bytes (default: 512)
    pub fn from_env() -> Self {
        Self {
            max_item_size: env::var("MEMKV_MAX_ITEM_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1024 * 1024),
            record_overhead: env::var("MEMKV_RECORD_OVERHEAD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(512),
        }
    }

    /// Usable payload bytes per chunk once the record overhead is reserved.
    pub fn chunk_size(&self) -> usize {
        self.max_item_size.saturating_sub(self.record_overhead)
    }

    /// Validates the configuration.
    ///
    /// The overhead margin must leave at least one usable payload byte per
    /// chunk, otherwise splitting an oversized value can never terminate.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size() == 0 {
            return Err(StoreError::InvalidConfig(format!(
                "record_overhead ({}) leaves no usable chunk space within max_item_size ({})",
                self.record_overhead, self.max_item_size
            )));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_item_size: 1024 * 1024,
            record_overhead: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.max_item_size, 1024 * 1024);
        assert_eq!(config.record_overhead, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("MEMKV_MAX_ITEM_SIZE");
        env::remove_var("MEMKV_RECORD_OVERHEAD");

        let config = StoreConfig::from_env();
        assert_eq!(config.max_item_size, 1024 * 1024);
        assert_eq!(config.record_overhead, 512);
    }

    #[test]
    fn test_chunk_size() {
        let config = StoreConfig {
            max_item_size: 1000,
            record_overhead: 100,
        };
        assert_eq!(config.chunk_size(), 900);
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let config = StoreConfig {
            max_item_size: 100,
            record_overhead: 100,
        };
        assert!(matches!(
            config.validate(),
            Err(StoreError::InvalidConfig(_))
        ));
    }
}
