//! Result cache configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Result cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached results; least recently used entries are evicted.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Freshness window in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Extra seconds past the TTL during which stale results are still served.
    #[serde(default = "default_stale_window_secs")]
    pub stale_window_secs: u64,
    /// Serialized payloads above this many bytes are gzip-compressed.
    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,
    /// Refresh stale entries in the background after serving them.
    #[serde(default = "default_revalidate")]
    pub revalidate_in_background: bool,
    /// Number of recent lookups in the rolling hit-rate window.
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
}

const fn default_capacity() -> usize {
    1_000
}

const fn default_ttl_secs() -> u64 {
    300 // 5 minutes
}

const fn default_stale_window_secs() -> u64 {
    60
}

const fn default_compression_threshold_bytes() -> usize {
    16 * 1024
}

const fn default_revalidate() -> bool {
    true
}

const fn default_rolling_window() -> usize {
    1_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
            stale_window_secs: default_stale_window_secs(),
            compression_threshold_bytes: default_compression_threshold_bytes(),
            revalidate_in_background: default_revalidate(),
            rolling_window: default_rolling_window(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    #[must_use]
    pub fn stale_window(&self) -> Duration {
        Duration::from_secs(self.stale_window_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.capacity",
                reason: "must be > 0".into(),
            });
        }
        if self.rolling_window == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.rolling_window",
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }
}
