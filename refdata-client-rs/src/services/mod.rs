//! Service-specific client implementations
//!
//! This module contains the reference-data service client and the HTTP
//! plumbing it shares with the session manager.

pub mod common;
pub mod refdata;

pub use common::{build_http_client, ClientMetrics, UserAgent};
pub use refdata::DataClient;
