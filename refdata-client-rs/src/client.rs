//! Reference-data orchestration client
//!
//! Every operation runs the same pipeline: validate the input, derive a cache
//! key, answer from the cache when possible, otherwise run the upstream call
//! through the deduplicator and cache its shaped result.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, TtlCache};
use crate::config::ClientConfig;
use crate::core::{ClientBuilder, ReferenceDataApi, ServiceClient};
use crate::error::{Result, ServiceError};
use crate::format::ResultFormatter;
use crate::resilience::RequestDeduplicator;
use crate::services::common::ClientMetrics;
use crate::services::refdata::{CatalogEntry, DataClient, Entity, IndexSearchResult, TextSearchResult};
use crate::session::SessionManager;
use crate::util::{generate_request_id, measure_time_async};
use crate::validation::InputValidator;

/// Shortest name matched as a substring of catalog names
pub const MIN_PARTIAL_MATCH_LEN: usize = 3;

/// A shaped result held by the orchestration cache
#[derive(Debug, Clone)]
pub enum CachedValue {
    Index(IndexSearchResult),
    Text(TextSearchResult),
    Entity(Entity),
}

/// Results that can live in the orchestration cache
pub trait Cacheable: Clone + Send + Sync + Sized + 'static {
    fn into_cached(self) -> CachedValue;
    fn from_cached(value: CachedValue) -> Option<Self>;
}

impl Cacheable for IndexSearchResult {
    fn into_cached(self) -> CachedValue {
        CachedValue::Index(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Index(result) => Some(result),
            _ => None,
        }
    }
}

impl Cacheable for TextSearchResult {
    fn into_cached(self) -> CachedValue {
        CachedValue::Text(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Text(result) => Some(result),
            _ => None,
        }
    }
}

impl Cacheable for Entity {
    fn into_cached(self) -> CachedValue {
        CachedValue::Entity(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Entity(entity) => Some(entity),
            _ => None,
        }
    }
}

/// Deterministic cache key: operation name plus `name=value` pairs sorted by name
pub fn cache_key(operation: &str, params: &[(&str, &str)]) -> String {
    let mut pairs: Vec<String> = params
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    pairs.sort();
    format!("{}:{}", operation, pairs.join("&"))
}

/// First catalog entry whose names match `name`
///
/// Exact case-insensitive matches win over substring matches, which are only
/// tried for names of at least [`MIN_PARTIAL_MATCH_LEN`] characters.
pub fn match_catalog<'a>(catalog: &'a [CatalogEntry], name: &str) -> Option<&'a CatalogEntry> {
    let needle = name.to_lowercase();

    if let Some(entry) = catalog
        .iter()
        .find(|entry| entry.names().any(|n| n.to_lowercase() == needle))
    {
        return Some(entry);
    }

    if needle.chars().count() < MIN_PARTIAL_MATCH_LEN {
        return None;
    }

    catalog
        .iter()
        .find(|entry| entry.names().any(|n| n.to_lowercase().contains(&needle)))
}

/// Consumer-facing reference-data client
pub struct RefDataClient {
    config: ClientConfig,
    data: Arc<DataClient>,

    /// `None` when caching is disabled
    cache: Option<TtlCache<CachedValue>>,

    dedup: RequestDeduplicator,
    validator: Arc<dyn InputValidator>,
    formatter: Arc<dyn ResultFormatter>,
    metrics: Arc<ClientMetrics>,
}

impl RefDataClient {
    /// Create a client with default validator and formatter
    pub fn new(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new(config).build()
    }

    /// Create a new builder for the client
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        data: DataClient,
        validator: Arc<dyn InputValidator>,
        formatter: Arc<dyn ResultFormatter>,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        let ttl = config.cache_ttl();
        let cache = (!ttl.is_zero()).then(|| TtlCache::new(ttl));
        let dedup = RequestDeduplicator::new(config.dedup_timeout());

        Self {
            config,
            data: Arc::new(data),
            cache,
            dedup,
            validator,
            formatter,
            metrics,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        self.data.executor().session()
    }

    /// Keyword search against a structured index
    pub async fn search_index(
        &self,
        query: &str,
        index: Option<&str>,
        limit: Option<u32>,
    ) -> Result<IndexSearchResult> {
        let query = self.validator.validate_query(query)?;
        let index = self
            .validator
            .validate_resource_name("index", index.unwrap_or(&self.config.default_index_name))?;
        let limit = self.validator.validate_limit(limit, self.config.max_results)?;

        let key = cache_key(
            "search_index",
            &[
                ("index", index.as_str()),
                ("q", query.as_str()),
                ("limit", limit.to_string().as_str()),
            ],
        );
        let formatter = Arc::clone(&self.formatter);

        self.cached(key, move |data| async move {
            let response = data.search_index(&index, &query, Some(limit)).await?;
            Ok(formatter.format_index_results(&query, &index, response, limit as usize))
        })
        .await
    }

    /// Keyword search against narrative text
    pub async fn search_text(
        &self,
        query: &str,
        text: Option<&str>,
        limit: Option<u32>,
    ) -> Result<TextSearchResult> {
        let query = self.validator.validate_query(query)?;
        let text = self
            .validator
            .validate_resource_name("text", text.unwrap_or(&self.config.default_text_name))?;
        let limit = self.validator.validate_limit(limit, self.config.max_results)?;

        let key = cache_key(
            "search_text",
            &[
                ("text", text.as_str()),
                ("q", query.as_str()),
                ("limit", limit.to_string().as_str()),
            ],
        );
        let formatter = Arc::clone(&self.formatter);

        self.cached(key, move |data| async move {
            let response = data.search_text(&text, &query, Some(limit)).await?;
            Ok(formatter.format_text_results(&query, &text, response, limit as usize))
        })
        .await
    }

    /// Look an entity up by id
    pub async fn get_entity(&self, id: &str) -> Result<Entity> {
        let id = self.validator.validate_entity_id(id)?;
        self.entity_by_id(id).await
    }

    /// Resolve an entity by name through the catalog, then fetch it by id
    pub async fn find_entity(&self, name: &str) -> Result<Entity> {
        let name = self.validator.validate_entity_name(name)?;
        let catalog = self.list_catalog().await?;

        let entry = match_catalog(&catalog, &name)
            .ok_or_else(|| ServiceError::not_found("entity", name.clone()))?;
        debug!(name = %name, entity_id = %entry.id, "resolved entity name");

        self.entity_by_id(entry.id.clone()).await
    }

    /// Every catalog entry
    ///
    /// The catalog is cached for as long as the upstream's freshness headers
    /// allow, falling back to the configured TTL.
    pub async fn list_catalog(&self) -> Result<Vec<CatalogEntry>> {
        if let Some(entries) = self.data.cached_catalog() {
            self.metrics.record_cache_hit();
            debug!(key = "list_catalog:", "cache hit");
            return Ok(entries);
        }
        self.metrics.record_cache_miss();

        let data = Arc::clone(&self.data);
        self.dedup
            .deduplicate(&cache_key("list_catalog", &[]), move || async move {
                data.list_catalog().await
            })
            .await
    }

    /// Drop every cached result
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        self.data.clear_cache();
        info!("cache cleared");
    }

    /// Statistics of the result cache, the held catalog included
    pub fn cache_stats(&self) -> CacheStats {
        let results = self.cache.as_ref().map_or(0, |cache| cache.stats().size);
        CacheStats {
            size: results + self.data.cached_entries(),
            ttl: self.config.cache_ttl(),
        }
    }

    /// Upstream calls currently in flight
    pub fn pending_requests(&self) -> usize {
        self.dedup.pending_count()
    }

    /// Stop background work and forget the session
    ///
    /// The client keeps working afterwards, without caching sweeps.
    pub fn shutdown(&self) {
        if let Some(cache) = &self.cache {
            cache.destroy();
        }
        self.data.destroy();
        self.session().clear_session();
        info!("reference-data client shut down");
    }

    async fn entity_by_id(&self, id: String) -> Result<Entity> {
        let key = cache_key("get_entity", &[("id", id.as_str())]);

        self.cached(key, move |data| async move {
            data.get_entity(&id)
                .await?
                .ok_or_else(|| ServiceError::not_found("entity", id.clone()))
        })
        .await
    }

    /// Cache check, then deduplicated fetch that stores its result
    async fn cached<T, F, Fut>(&self, key: String, fetch: F) -> Result<T>
    where
        T: Cacheable,
        F: FnOnce(Arc<DataClient>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(hit) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get(&key))
            .and_then(T::from_cached)
        {
            self.metrics.record_cache_hit();
            debug!(key = %key, "cache hit");
            return Ok(hit);
        }
        self.metrics.record_cache_miss();

        let request_id = generate_request_id();
        debug!(key = %key, request_id = %request_id, "cache miss");

        let data = Arc::clone(&self.data);
        let cache = self.cache.clone();
        let cache_key = key.clone();

        let (result, elapsed) = measure_time_async(|| {
            self.dedup.deduplicate(&key, move || async move {
                let value = fetch(data).await?;
                if let Some(cache) = cache {
                    cache.set(cache_key, value.clone().into_cached());
                }
                Ok(value)
            })
        })
        .await;

        match &result {
            Ok(_) => debug!(
                key = %key,
                request_id = %request_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "upstream call completed"
            ),
            Err(err) => warn!(
                key = %key,
                request_id = %request_id,
                kind = %err.kind(),
                elapsed_ms = elapsed.as_millis() as u64,
                "upstream call failed"
            ),
        }

        result
    }
}

#[async_trait]
impl ServiceClient for RefDataClient {
    fn name(&self) -> &str {
        "refdata"
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn health_check(&self) -> Result<bool> {
        // The catalog endpoint also establishes the session
        match self.data.list_catalog().await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!(error = %e, "reference-data health check failed");
                Ok(false)
            }
        }
    }

    fn metrics(&self) -> Option<HashMap<String, String>> {
        let mut metrics = self.metrics.as_map();
        metrics.insert("cache_size".to_string(), self.cache_stats().size.to_string());
        metrics.insert("pending_requests".to_string(), self.pending_requests().to_string());
        metrics.insert("session_active".to_string(), self.session().has_session().to_string());
        metrics.insert(
            "session_bootstraps".to_string(),
            self.session().bootstrap_count().to_string(),
        );
        Some(metrics)
    }
}

#[async_trait]
impl ReferenceDataApi for RefDataClient {
    async fn search_index(
        &self,
        query: &str,
        index: Option<&str>,
        limit: Option<u32>,
    ) -> Result<IndexSearchResult> {
        RefDataClient::search_index(self, query, index, limit).await
    }

    async fn search_text(
        &self,
        query: &str,
        text: Option<&str>,
        limit: Option<u32>,
    ) -> Result<TextSearchResult> {
        RefDataClient::search_text(self, query, text, limit).await
    }

    async fn get_entity(&self, id: &str) -> Result<Entity> {
        RefDataClient::get_entity(self, id).await
    }

    async fn find_entity(&self, name: &str) -> Result<Entity> {
        RefDataClient::find_entity(self, name).await
    }

    async fn list_catalog(&self) -> Result<Vec<CatalogEntry>> {
        RefDataClient::list_catalog(self).await
    }
}
