//! Common utilities for service clients
//!
//! This module provides shared functionality for all service clients.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::{header, Client};

use crate::error::{Result, ServiceError};

/// UserAgent structure for identifying the client to upstream services
#[derive(Debug, Clone)]
pub struct UserAgent {
    /// Application name
    pub app_name: String,

    /// Version string
    pub version: String,

    /// Optional extra info
    pub extra: Option<String>,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            app_name: "Phoenix-ORCH".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            extra: Some("refdata-client".to_string()),
        }
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_name, self.version)?;

        if let Some(ref extra) = self.extra {
            write!(f, " ({})", extra)?;
        }

        Ok(())
    }
}

/// Build the HTTP client shared by the session manager and the executor
///
/// Every request carries the identification headers; timeouts are applied per
/// attempt by the caller.
pub fn build_http_client(user_agent: Option<UserAgent>) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    let ua = user_agent.unwrap_or_default().to_string();

    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_str(&ua)
            .map_err(|e| ServiceError::configuration(format!("Invalid user agent: {}", e)))?,
    );
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .gzip(true)
        .build()
        .map_err(|e| ServiceError::configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Per-client counters
#[derive(Debug, Default)]
pub struct ClientMetrics {
    /// Upstream calls issued, bootstrap excluded
    request_count: AtomicU64,

    /// Upstream calls that failed
    error_count: AtomicU64,

    /// Transport retries
    retry_count: AtomicU64,

    /// Forced refreshes after a 401
    session_refresh_count: AtomicU64,

    cache_hits: AtomicU64,

    cache_misses: AtomicU64,
}

impl ClientMetrics {
    pub fn record_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_refresh(&self) {
        self.session_refresh_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Relaxed)
    }

    /// Get all metrics as a map
    pub fn as_map(&self) -> HashMap<String, String> {
        let counters = [
            ("request_count", &self.request_count),
            ("error_count", &self.error_count),
            ("retry_count", &self.retry_count),
            ("session_refresh_count", &self.session_refresh_count),
            ("cache_hits", &self.cache_hits),
            ("cache_misses", &self.cache_misses),
        ];

        counters
            .iter()
            .map(|(name, value)| (name.to_string(), value.load(Ordering::Relaxed).to_string()))
            .collect()
    }
}
