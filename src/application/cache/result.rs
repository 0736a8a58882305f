//! Result cache with TTL, stale-while-revalidate and LRU eviction.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::codec::{self, Payload};
use super::coalesce::Coalescer;
use super::stats::{CacheReport, CacheStats};
use crate::domain::{CacheKey, QueryPattern};
use crate::error::Result;
use crate::infrastructure::config::cache::CacheConfig;

struct CacheEntry {
    payload: Payload,
    created_at: Instant,
    ttl: Duration,
    stale_window: Duration,
    hit_count: u64,
}

impl CacheEntry {
    fn freshness(&self, now: Instant) -> Freshness {
        let age = now.saturating_duration_since(self.created_at);
        if age <= self.ttl {
            Freshness::Fresh
        } else if age <= self.ttl + self.stale_window {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    Fresh,
    Stale,
    Expired,
}

enum Lookup<T> {
    Fresh(T),
    Stale(T),
    Miss,
}

/// A value returned by [`ResultCache::get_or_fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    /// Served from the cache rather than freshly fetched.
    pub cached: bool,
    /// Served past its TTL, inside the stale window.
    pub stale: bool,
}

struct CacheInner {
    config: CacheConfig,
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    coalescer: Coalescer,
    stats: Mutex<CacheStats>,
}

/// Shared result cache keyed by canonical query pattern. Cheap to clone.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<CacheInner>,
}

impl ResultCache {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        let stats = CacheStats::new(config.rolling_window);
        Self {
            inner: Arc::new(CacheInner {
                config,
                entries: Mutex::new(LruCache::new(capacity)),
                coalescer: Coalescer::default(),
                stats: Mutex::new(stats),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Return the cached result for `pattern`, or run `fetch` and cache it.
    ///
    /// - fresh entry: returned as is
    /// - stale entry: returned immediately; a single background refresh is
    ///   scheduled when revalidation is enabled
    /// - miss: concurrent callers for the same pattern share one `fetch`
    ///
    /// Fetch errors are returned and never cached.
    pub async fn get_or_fetch<T, F, Fut>(&self, pattern: &QueryPattern, fetch: F) -> Result<Cached<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let started = Instant::now();
        let key = pattern.cache_key();
        let label = pattern_label(pattern);

        let outcome = self.get_or_fetch_keyed(&key, fetch).await;
        self.inner.stats.lock().record_latency(&label, started.elapsed());
        outcome
    }

    async fn get_or_fetch_keyed<T, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<Cached<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        match self.lookup::<T>(key) {
            Lookup::Fresh(value) => {
                self.inner.stats.lock().record_hit(false);
                return Ok(hit(value, false));
            }
            Lookup::Stale(value) => {
                self.inner.stats.lock().record_hit(true);
                if self.inner.config.revalidate_in_background {
                    self.spawn_revalidation(key.clone(), fetch);
                }
                return Ok(hit(value, true));
            }
            Lookup::Miss => {}
        }

        let _flight = self.inner.coalescer.acquire(key).await;

        // Another caller may have filled the entry while we waited.
        match self.lookup::<T>(key) {
            Lookup::Fresh(value) => {
                let mut stats = self.inner.stats.lock();
                stats.record_hit(false);
                stats.coalesced += 1;
                return Ok(hit(value, false));
            }
            Lookup::Stale(value) => {
                let mut stats = self.inner.stats.lock();
                stats.record_hit(true);
                stats.coalesced += 1;
                return Ok(hit(value, true));
            }
            Lookup::Miss => {}
        }

        self.inner.stats.lock().record_miss();
        let value = fetch().await?;
        self.store(key.clone(), &value);
        Ok(Cached {
            value,
            cached: false,
            stale: false,
        })
    }

    fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Lookup<T> {
        let now = Instant::now();
        let (freshness, payload) = {
            let mut entries = self.inner.entries.lock();
            let found = entries.get_mut(key).map(|entry| {
                let freshness = entry.freshness(now);
                if freshness != Freshness::Expired {
                    entry.hit_count += 1;
                }
                (freshness, entry.payload.clone())
            });
            match found {
                None => return Lookup::Miss,
                Some((Freshness::Expired, _)) => {
                    entries.pop(key);
                    return Lookup::Miss;
                }
                Some(found) => found,
            }
        };

        match codec::decode::<T>(&payload) {
            Ok(value) if freshness == Freshness::Fresh => Lookup::Fresh(value),
            Ok(value) => Lookup::Stale(value),
            Err(e) => {
                warn!(key = %key.short(), error = %e, "Dropping undecodable cache entry");
                self.inner.entries.lock().pop(key);
                self.inner.stats.lock().decode_failures += 1;
                Lookup::Miss
            }
        }
    }

    fn store<T: Serialize>(&self, key: CacheKey, value: &T) {
        let payload = match codec::encode(value, self.inner.config.compression_threshold_bytes) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %key.short(), error = %e, "Failed to encode cache entry");
                return;
            }
        };
        let size = payload.len();
        let compressed = payload.is_compressed();
        let entry = CacheEntry {
            payload,
            created_at: Instant::now(),
            ttl: self.inner.config.ttl(),
            stale_window: self.inner.config.stale_window(),
            hit_count: 0,
        };

        let displaced = self.inner.entries.lock().push(key.clone(), entry);
        if let Some((old_key, _)) = displaced {
            if old_key != key {
                self.inner.stats.lock().evictions += 1;
                debug!(evicted = %old_key.short(), "Evicted least recently used entry");
            }
        }
        debug!(key = %key.short(), size, compressed, "Cached result");
    }

    fn spawn_revalidation<T, F, Fut>(&self, key: CacheKey, fetch: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let Some(flight) = self.inner.coalescer.try_acquire(&key) else {
            debug!(key = %key.short(), "Revalidation already in flight");
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let cache = self.clone();
        runtime.spawn(async move {
            let _flight = flight;
            match fetch().await {
                Ok(value) => {
                    cache.store(key.clone(), &value);
                    cache.inner.stats.lock().revalidations += 1;
                    debug!(key = %key.short(), "Revalidated stale entry");
                }
                Err(e) => {
                    warn!(key = %key.short(), error = %e, "Background revalidation failed");
                }
            }
        });
    }

    /// Drop the entry for `pattern`. Returns whether one existed.
    pub fn invalidate(&self, pattern: &QueryPattern) -> bool {
        self.inner.entries.lock().pop(&pattern.cache_key()).is_some()
    }

    /// Drop every entry and reset statistics.
    pub fn clear(&self) {
        self.inner.entries.lock().clear();
        self.inner.stats.lock().reset();
    }

    /// Remove entries past their stale window. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.entries.lock();
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.freshness(now) == Freshness::Expired)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Times the entry for `pattern` has been served from the cache.
    #[must_use]
    pub fn hit_count(&self, pattern: &QueryPattern) -> Option<u64> {
        self.inner
            .entries
            .lock()
            .peek(&pattern.cache_key())
            .map(|entry| entry.hit_count)
    }

    #[must_use]
    pub fn report(&self) -> CacheReport {
        let (entries, compressed_entries) = {
            let entries = self.inner.entries.lock();
            let compressed = entries
                .iter()
                .filter(|(_, entry)| entry.payload.is_compressed())
                .count();
            (entries.len(), compressed)
        };
        let stats = self.inner.stats.lock();
        CacheReport {
            hits: stats.hits,
            misses: stats.misses,
            stale_hits: stats.stale_hits,
            coalesced: stats.coalesced,
            revalidations: stats.revalidations,
            evictions: stats.evictions,
            decode_failures: stats.decode_failures,
            hit_rate: stats.hit_rate(),
            rolling_hit_rate: stats.rolling_hit_rate(),
            entries,
            compressed_entries,
            slowest_patterns: stats.slowest(),
        }
    }
}

fn hit<T>(value: T, stale: bool) -> Cached<T> {
    Cached {
        value,
        cached: true,
        stale,
    }
}

fn pattern_label(pattern: &QueryPattern) -> String {
    let intent = pattern.intent.trim();
    if intent.is_empty() {
        "unknown".to_string()
    } else {
        intent.to_lowercase()
    }
}

#[cfg(test)]
impl ResultCache {
    /// Overwrite the stored payload for `pattern`, keeping its timestamps.
    fn corrupt(&self, pattern: &QueryPattern) {
        if let Some(entry) = self.inner.entries.lock().get_mut(&pattern.cache_key()) {
            entry.payload = Payload::Gzip(b"garbage".to_vec());
        }
    }
}
