//! Core abstractions for the reference-data client
//!
//! This module provides the trait interfaces consumers program against, and
//! the pieces that assemble a client:
//!
//! - `ServiceClient`: identity, health and metrics of a service client
//! - `ReferenceDataApi`: the consumer-facing reference-data operations
//! - `RequestExecutor`: issues upstream requests with session and retry handling
//! - `ClientBuilder`: Builder pattern for creating clients

pub mod builder;
pub mod executor;

pub use builder::ClientBuilder;
pub use executor::{RequestExecutor, UpstreamResponse};

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::services::refdata::{CatalogEntry, Entity, IndexSearchResult, TextSearchResult};

/// Base trait for all service clients
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// The client name/identifier
    fn name(&self) -> &str;

    /// The base URL for the service
    fn base_url(&self) -> &str;

    /// Client version
    fn version(&self) -> &str;

    /// Health check for the service
    async fn health_check(&self) -> Result<bool>;

    /// Returns the client's metrics if available
    fn metrics(&self) -> Option<HashMap<String, String>>;
}

/// Reference-data operations offered to outbound adapters
///
/// `None` for an index, text collection or limit selects the client's
/// configured default.
#[async_trait]
pub trait ReferenceDataApi: Send + Sync {
    /// Keyword search against a structured index
    async fn search_index(
        &self,
        query: &str,
        index: Option<&str>,
        limit: Option<u32>,
    ) -> Result<IndexSearchResult>;

    /// Keyword search against narrative text
    async fn search_text(
        &self,
        query: &str,
        text: Option<&str>,
        limit: Option<u32>,
    ) -> Result<TextSearchResult>;

    /// Look an entity up by id
    async fn get_entity(&self, id: &str) -> Result<Entity>;

    /// Resolve an entity by name through the catalog
    async fn find_entity(&self, name: &str) -> Result<Entity>;

    /// Every catalog entry
    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>>;
}
