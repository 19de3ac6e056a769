//! Resilience patterns for the reference-data client
//!
//! This module provides:
//! - Retry policy with a deterministic exponential backoff schedule
//! - Deduplication of concurrent identical requests

mod dedup;
mod retry;

pub use dedup::{RequestDeduplicator, DEFAULT_DEDUP_TIMEOUT};
pub use retry::{BackoffSchedule, RetryConfig};
