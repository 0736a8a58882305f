//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use std::time::Duration;

use crate::infrastructure::config::breaker::BreakerConfig;
use crate::infrastructure::config::cache::CacheConfig;
use crate::infrastructure::config::pool::PoolConfig;

/// Pool bounded to `min..=max` with a short acquire timeout.
pub fn pool(min: usize, max: usize) -> PoolConfig {
    PoolConfig::bounded(min, max)
        .with_acquire_timeout(Duration::from_millis(500))
        .with_connect_timeout(Duration::from_millis(500))
}

/// Cache with the given TTL and stale window, compression threshold 1 KiB.
pub fn cache(ttl: Duration, stale_window: Duration) -> CacheConfig {
    CacheConfig {
        capacity: 100,
        ttl_secs: ttl.as_secs(),
        stale_window_secs: stale_window.as_secs(),
        compression_threshold_bytes: 1024,
        revalidate_in_background: true,
        rolling_window: 100,
    }
}

/// Breaker opening after `threshold` failures with a 10 s cooldown.
pub fn breaker(threshold: u32) -> BreakerConfig {
    BreakerConfig::new(threshold, Duration::from_secs(10), Duration::from_secs(60))
}
