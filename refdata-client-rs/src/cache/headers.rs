//! Header-aware caching
//!
//! Lifetimes come from the upstream response: `Cache-Control: max-age` wins,
//! then `Expires`, then the cache's default TTL.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CACHE_CONTROL, EXPIRES};
use tracing::debug;

use super::{CacheStats, TtlCache};

/// Freshness lifetime declared by response headers
///
/// Returns `None` when the response must not be cached.
pub fn ttl_from_headers(headers: &HeaderMap, default_ttl: Duration) -> Option<Duration> {
    ttl_from_headers_at(headers, default_ttl, Utc::now())
}

fn ttl_from_headers_at(headers: &HeaderMap, default_ttl: Duration, now: DateTime<Utc>) -> Option<Duration> {
    let cache_control = headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(",");

    let mut max_age = None;
    for directive in cache_control.split(',').map(str::trim) {
        let lower = directive.to_ascii_lowercase();
        if lower == "no-store" || lower == "no-cache" {
            return None;
        }
        if max_age.is_none() {
            if let Some(value) = lower.strip_prefix("max-age=") {
                if let Ok(seconds) = value.trim_matches('"').parse::<i64>() {
                    max_age = Some(seconds);
                }
            }
        }
    }

    if let Some(seconds) = max_age {
        return u64::try_from(seconds)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs);
    }

    if let Some(expires) = headers.get(EXPIRES).and_then(|v| v.to_str().ok()) {
        match DateTime::parse_from_rfc2822(expires.trim()) {
            Ok(at) => {
                let remaining = at.with_timezone(&Utc) - now;
                return remaining.to_std().ok().filter(|d| !d.is_zero());
            }
            Err(e) => {
                debug!(expires, error = %e, "unparsable Expires header, using default TTL");
            }
        }
    }

    Some(default_ttl)
}

/// Cache whose entry lifetimes follow upstream response headers
pub struct ResponseCache<V> {
    inner: TtlCache<V>,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + 'static,
{
    /// Create a cache falling back to `default_ttl` when headers are silent
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: TtlCache::new(default_ttl),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key)
    }

    /// Store a value for as long as the headers allow, returning whether it was cached
    pub fn set(&self, key: impl Into<String>, value: V, headers: &HeaderMap) -> bool {
        let key = key.into();
        match ttl_from_headers(headers, self.inner.ttl()) {
            Some(ttl) => {
                debug!(key = %key, ttl_secs = ttl.as_secs(), "caching response");
                self.inner.set_with_ttl(key, value, ttl);
                true
            }
            None => {
                debug!(key = %key, "response headers forbid caching");
                self.inner.delete(&key);
                false
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.delete(key)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn cleanup(&self) -> usize {
        self.inner.cleanup()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn destroy(&self) {
        self.inner.destroy();
    }
}
