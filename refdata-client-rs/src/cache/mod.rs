//! Time-to-live caching
//!
//! [`TtlCache`] is an in-memory key/value store whose entries expire a fixed
//! time after they were written. Expiry is enforced lazily on every access and
//! bounded between accesses by a background sweep task.
//!
//! [`ResponseCache`] derives the lifetime of each entry from upstream
//! `Cache-Control` / `Expires` headers instead.

pub mod headers;

pub use headers::{ttl_from_headers, ResponseCache};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Upper bound for the interval between two sweeps
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Stand-in expiry for lifetimes too large to represent
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// A cached value and the instant it stops being served
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held, including expired ones not yet evicted
    pub size: usize,

    /// Default time-to-live
    pub ttl: Duration,
}

struct CacheInner<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<V> CacheInner<V> {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    fn stop_sweeper(&self) {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl<V> Drop for CacheInner<V> {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

/// In-memory cache with a fixed time-to-live per entry
///
/// Cloning yields another handle to the same store.
pub struct TtlCache<V> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.inner.ttl)
            .field("size", &self.inner.entries().len())
            .finish()
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + 'static,
{
    /// Create a cache and, when running inside a tokio runtime, start its sweep
    pub fn new(ttl: Duration) -> Self {
        let inner = Arc::new(CacheInner {
            entries: Mutex::new(HashMap::new()),
            ttl,
            sweeper: Mutex::new(None),
        });

        if let Some(handle) = spawn_sweeper(Arc::downgrade(&inner), ttl) {
            *inner.sweeper.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }

        Self { inner }
    }

    /// Get a value, evicting it if it has expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.inner.entries();

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                trace!(key, "cache entry expired on access");
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Store a value with the default time-to-live
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.inner.ttl);
    }

    /// Store a value with an explicit time-to-live
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            expires_at: now.checked_add(ttl).unwrap_or(now + FAR_FUTURE),
        };
        self.inner.entries().insert(key.into(), entry);
    }

    /// Whether a live entry exists for the key
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove an entry, returning whether it was present
    pub fn delete(&self, key: &str) -> bool {
        self.inner.entries().remove(key).is_some()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.inner.entries().clear();
    }

    /// Evict expired entries now, returning how many were removed
    pub fn cleanup(&self) -> usize {
        self.inner.evict_expired()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.inner.entries().len(),
            ttl: self.inner.ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Stop the background sweep and drop every entry; safe to call repeatedly
    pub fn destroy(&self) {
        self.inner.stop_sweeper();
        self.clear();
    }

    /// Whether the background sweep is still scheduled
    pub fn is_sweeping(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }
}

/// Interval between sweeps for a given time-to-live
pub fn sweep_interval(ttl: Duration) -> Duration {
    ttl.min(MAX_SWEEP_INTERVAL)
}

fn spawn_sweeper<V>(inner: Weak<CacheInner<V>>, ttl: Duration) -> Option<JoinHandle<()>>
where
    V: Send + 'static,
{
    if ttl.is_zero() {
        return None;
    }

    let runtime = match tokio::runtime::Handle::try_current() {
        Ok(runtime) => runtime,
        Err(_) => {
            debug!("no tokio runtime available, cache relies on lazy expiry only");
            return None;
        }
    };

    let period = sweep_interval(ttl);
    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let evicted = inner.evict_expired();
            if evicted > 0 {
                debug!(evicted, "cache sweep evicted expired entries");
            }
        }
    }))
}
