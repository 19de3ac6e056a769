//! Client builder implementation
//!
//! Assembles the session manager, request executor, data client and
//! orchestration client from one [`ClientConfig`].

use std::sync::Arc;

use reqwest::Client as ReqwestClient;
use tracing::debug;
use url::Url;

use crate::client::RefDataClient;
use crate::config::ClientConfig;
use crate::core::executor::RequestExecutor;
use crate::error::{Result, ServiceError};
use crate::format::{DefaultFormatter, ResultFormatter};
use crate::resilience::RetryConfig;
use crate::services::common::{build_http_client, ClientMetrics, UserAgent};
use crate::services::refdata::{DataClient, CATALOG_ENDPOINT};
use crate::session::SessionManager;
use crate::validation::{DefaultValidator, InputValidator};

/// Builder for [`RefDataClient`]
pub struct ClientBuilder {
    config: ClientConfig,

    /// User agent sent with every request
    user_agent: Option<UserAgent>,

    /// Retry configuration; derived from the client config when unset
    retry_config: Option<RetryConfig>,

    validator: Option<Arc<dyn InputValidator>>,

    formatter: Option<Arc<dyn ResultFormatter>>,

    /// Pre-built HTTP client, replacing the default one
    http_client: Option<ReqwestClient>,
}

impl ClientBuilder {
    /// Create a new client builder for the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            user_agent: None,
            retry_config: None,
            validator: None,
            formatter: None,
            http_client: None,
        }
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    /// Configure retry behavior
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    /// Replace the input validation rules
    pub fn validator(mut self, validator: Arc<dyn InputValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Replace the result shaping
    pub fn formatter(mut self, formatter: Arc<dyn ResultFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Use a pre-built HTTP client
    pub fn http_client(mut self, client: ReqwestClient) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the client
    ///
    /// Fails with a configuration error when the configuration is out of
    /// bounds.
    pub fn build(self) -> Result<RefDataClient> {
        self.config.validate()?;

        let http = match self.http_client {
            Some(client) => client,
            None => build_http_client(self.user_agent)?,
        };

        let bootstrap_url = bootstrap_url(&self.config.base_url)?;
        let session = SessionManager::new(http.clone(), bootstrap_url, self.config.timeout());

        let retry = self.retry_config.unwrap_or_else(|| {
            RetryConfig::new(self.config.max_retries, self.config.retry_base_delay())
        });
        debug!(base_url = %self.config.base_url, retry = %retry, "building reference-data client");

        let metrics = Arc::new(ClientMetrics::default());
        let executor = RequestExecutor::new(
            http,
            self.config.base_url.clone(),
            session,
            self.config.timeout(),
            retry,
        )
        .with_metrics(Arc::clone(&metrics));

        let data = DataClient::new(executor, self.config.cache_ttl());

        Ok(RefDataClient::from_parts(
            self.config,
            data,
            self.validator.unwrap_or_else(|| Arc::new(DefaultValidator::new())),
            self.formatter.unwrap_or_else(|| Arc::new(DefaultFormatter::new())),
            metrics,
        ))
    }
}

/// Address of the catalog endpoint, which also hands out the session cookie
fn bootstrap_url(base_url: &str) -> Result<Url> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), CATALOG_ENDPOINT);
    Url::parse(&raw).map_err(|e| ServiceError::configuration(format!("Invalid bootstrap URL {}: {}", raw, e)))
}
