//! Reference-data service client
//!
//! Typed calls for the service's logical endpoints, on top of the
//! [`RequestExecutor`]. Responses come back as raw upstream payloads; shaping
//! happens in the orchestration layer.

mod models;
pub use models::*;

use std::time::Duration;

use tracing::debug;

use crate::cache::ResponseCache;
use crate::core::executor::RequestExecutor;
use crate::error::Result;

pub const CATALOG_ENDPOINT: &str = "/api/catalog";
pub const ENTITY_ENDPOINT: &str = "/api/entity";
pub const INDEX_SEARCH_ENDPOINT: &str = "/api/index/search";
pub const TEXT_SEARCH_ENDPOINT: &str = "/api/text/search";

const CATALOG_CACHE_KEY: &str = "catalog";

/// Client for the reference-data endpoints
pub struct DataClient {
    executor: RequestExecutor,

    /// Catalog payloads, kept as long as the upstream allows
    catalog_cache: Option<ResponseCache<Vec<CatalogEntry>>>,
}

impl DataClient {
    /// `catalog_ttl` is used when the upstream sends no freshness headers;
    /// zero disables catalog caching altogether
    pub fn new(executor: RequestExecutor, catalog_ttl: Duration) -> Self {
        let catalog_cache = (!catalog_ttl.is_zero()).then(|| ResponseCache::new(catalog_ttl));
        Self {
            executor,
            catalog_cache,
        }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Catalog held from an earlier call, if still fresh
    pub fn cached_catalog(&self) -> Option<Vec<CatalogEntry>> {
        self.catalog_cache
            .as_ref()
            .and_then(|cache| cache.get(CATALOG_CACHE_KEY))
    }

    /// Entries held by the catalog cache
    pub fn cached_entries(&self) -> usize {
        self.catalog_cache
            .as_ref()
            .map_or(0, |cache| cache.stats().size)
    }

    /// Fetch the full catalog
    pub async fn list_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let response = self
            .executor
            .request_with_headers::<CatalogResponse>(CATALOG_ENDPOINT, &[])
            .await?;
        let entries = response.body.map(|b| b.entries).unwrap_or_default();

        if let Some(cache) = &self.catalog_cache {
            let cached = cache.set(CATALOG_CACHE_KEY, entries.clone(), &response.headers);
            debug!(entries = entries.len(), cached, "catalog fetched");
        }

        Ok(entries)
    }

    /// Fetch one entity; `None` when the upstream has no content for `id`
    pub async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        self.executor
            .request::<Entity>(ENTITY_ENDPOINT, &[("id", Some(id.to_string()))])
            .await
    }

    /// Keyword search against a structured index
    pub async fn search_index(
        &self,
        index: &str,
        query: &str,
        limit: Option<u32>,
    ) -> Result<IndexSearchResponse> {
        let params = [
            ("index", Some(index.to_string())),
            ("q", Some(query.to_string())),
            ("limit", limit.map(|l| l.to_string())),
        ];

        Ok(self
            .executor
            .request::<IndexSearchResponse>(INDEX_SEARCH_ENDPOINT, &params)
            .await?
            .unwrap_or_default())
    }

    /// Keyword search against narrative text
    pub async fn search_text(
        &self,
        text: &str,
        query: &str,
        limit: Option<u32>,
    ) -> Result<TextSearchResponse> {
        let params = [
            ("text", Some(text.to_string())),
            ("q", Some(query.to_string())),
            ("limit", limit.map(|l| l.to_string())),
        ];

        Ok(self
            .executor
            .request::<TextSearchResponse>(TEXT_SEARCH_ENDPOINT, &params)
            .await?
            .unwrap_or_default())
    }

    /// Drop the cached catalog
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.catalog_cache {
            cache.clear();
        }
    }

    /// Stop the catalog cache sweep
    pub fn destroy(&self) {
        if let Some(cache) = &self.catalog_cache {
            cache.destroy();
        }
    }
}
