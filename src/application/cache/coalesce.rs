//! Per-key in-flight fetch coalescing.
//!
//! The first caller for a key takes the key's lock and fetches; later
//! callers queue on the same lock and, once admitted, re-read the cache
//! instead of fetching again. Locks are dropped from the map once nobody
//! holds or waits on them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::CacheKey;

#[derive(Clone, Default)]
pub(crate) struct Coalescer {
    inflight: Arc<Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>,
}

/// Exclusive right to fetch one key.
pub(crate) struct Flight {
    coalescer: Coalescer,
    key: CacheKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Coalescer {
    fn lock_for(&self, key: &CacheKey) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.inflight
                .lock()
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Wait for exclusive access to `key`.
    pub(crate) async fn acquire(&self, key: &CacheKey) -> Flight {
        let guard = self.lock_for(key).lock_owned().await;
        Flight {
            coalescer: self.clone(),
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Take access to `key` only if nobody else holds it.
    pub(crate) fn try_acquire(&self, key: &CacheKey) -> Option<Flight> {
        let guard = self.lock_for(key).try_lock_owned().ok();
        let flight = Flight {
            coalescer: self.clone(),
            key: key.clone(),
            guard,
        };
        // An unsuccessful attempt still drops through `Flight::drop` so the
        // map entry is cleaned up if it was created just now.
        flight.guard.is_some().then_some(flight)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }
}

impl Drop for Flight {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut inflight = self.coalescer.inflight.lock();
        if inflight
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            inflight.remove(&self.key);
        }
    }
}
