//! Request deduplication for concurrent identical calls
//!
//! When several callers ask for the same key while a call is in flight, only
//! the first one runs the work and every caller receives the same outcome.
//! Once the call settles the key is forgotten, so a later call runs again.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use crate::error::{Result, ServiceError};

/// Default deadline for a deduplicated call
pub const DEFAULT_DEDUP_TIMEOUT: Duration = Duration::from_secs(60);

type SharedValue = Arc<dyn Any + Send + Sync>;
type SharedCall = Shared<BoxFuture<'static, Result<SharedValue>>>;

struct PendingCall {
    id: u64,
    future: SharedCall,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingCall>>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<String, PendingCall>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a pending registration when the work settles, times out or panics.
///
/// Only the registration it was created for is removed, so a late drop cannot
/// evict a newer call under the same key.
struct PendingGuard {
    pending: PendingMap,
    key: String,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = lock(&self.pending);
        if pending.get(&self.key).map_or(false, |call| call.id == self.id) {
            pending.remove(&self.key);
        }
    }
}

/// Keyed registry of in-flight calls
#[derive(Clone)]
pub struct RequestDeduplicator {
    pending: PendingMap,
    next_id: Arc<AtomicU64>,
    default_timeout: Duration,
}

impl Default for RequestDeduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_TIMEOUT)
    }
}

impl RequestDeduplicator {
    /// Create a deduplicator whose calls time out after `default_timeout`
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            default_timeout,
        }
    }

    /// Run `factory` for `key` unless a call for `key` is already in flight
    pub async fn deduplicate<T, F, Fut>(&self, key: &str, factory: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.deduplicate_with_timeout(key, factory, self.default_timeout)
            .await
    }

    /// Same as [`deduplicate`](Self::deduplicate) with an explicit deadline
    ///
    /// Work still running at the deadline is cancelled; its result is never
    /// delivered or cached.
    pub async fn deduplicate_with_timeout<T, F, Fut>(
        &self,
        key: &str,
        factory: F,
        timeout: Duration,
    ) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let call = self.register(key, factory, timeout);
        let value = call.await?;

        value.downcast_ref::<T>().cloned().ok_or_else(|| {
            ServiceError::network(format!(
                "Deduplicated call for {} produced an unexpected result type",
                key
            ))
        })
    }

    /// Number of calls currently in flight
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Join the in-flight call for `key` or start a new one.
    ///
    /// Runs without suspending, so the registration is visible before any
    /// other caller can look the key up.
    fn register<T, F, Fut>(&self, key: &str, factory: F, timeout: Duration) -> SharedCall
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut pending = lock(&self.pending);

        if let Some(call) = pending.get(key) {
            debug!(key, "joining in-flight request");
            return call.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            key: key.to_string(),
            id,
        };
        let timeout_ms = timeout.as_millis();
        let task_key = key.to_string();

        let handle = tokio::spawn(async move {
            let outcome = tokio::time::timeout(timeout, factory()).await;
            drop(guard);

            match outcome {
                Ok(Ok(value)) => Ok(Arc::new(value) as SharedValue),
                Ok(Err(err)) => Err(err),
                Err(_) => {
                    warn!(key = %task_key, timeout_ms, "deduplicated request timed out");
                    Err(ServiceError::timeout(format!(
                        "Request timed out after {}ms",
                        timeout_ms
                    )))
                }
            }
        });

        let future = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(ServiceError::unexpected("Deduplicated request failed", e)))
        }
        .boxed()
        .shared();

        pending.insert(
            key.to_string(),
            PendingCall {
                id,
                future: future.clone(),
            },
        );

        future
    }
}
