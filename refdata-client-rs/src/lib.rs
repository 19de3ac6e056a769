//! # Reference-data client
//!
//! A resilient client-side data-access layer for a remote, session-authenticated
//! reference-data service.
//!
//! This crate provides:
//!
//! - Cookie session bootstrap and refresh, shared by concurrent callers
//! - Timeout-bounded request execution with exponential backoff retries
//! - Time-to-live caching, including a variant honouring upstream freshness headers
//! - Deduplication of concurrent identical requests
//! - Configuration management utilities
//!
//! ## Architecture
//!
//! The client is designed around the following key abstractions:
//!
//! - `RefDataClient`: consumer-facing facade (validate, cache, deduplicate, fetch)
//! - `ReferenceDataApi`: the trait outbound adapters depend on
//! - `DataClient`: typed calls for the upstream endpoints
//! - `RequestExecutor`: one upstream request with session and retry handling
//! - `SessionManager`: owner of the session cookies
//! - `ServiceError`: Comprehensive error handling system

pub mod cache;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod resilience;
pub mod services;
pub mod session;
pub mod telemetry;
pub mod validation;

// Utility module for common functionality
pub mod util;

pub use crate::cache::{CacheStats, ResponseCache, TtlCache};
pub use crate::client::RefDataClient;
pub use crate::config::{ClientConfig, ConfigProvider, EnvConfigProvider, MemoryConfigProvider};
pub use crate::core::{ClientBuilder, ReferenceDataApi, RequestExecutor, ServiceClient};
pub use crate::error::{ErrorKind, Result, ServiceError};
pub use crate::resilience::{RequestDeduplicator, RetryConfig};
pub use crate::services::refdata::{
    CatalogEntry, Entity, EntityStats, IndexMatch, IndexSearchResult, TextSection,
    TextSearchResult,
};
pub use crate::session::SessionManager;

/// Create a client from `REFDATA_*` environment variables
pub fn client_from_env() -> Result<RefDataClient> {
    RefDataClient::new(ClientConfig::from_env()?)
}

#[cfg(test)]
mod tests;
