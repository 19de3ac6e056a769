//! Configuration management for the reference-data client
//!
//! This module provides utilities for loading and validating the client
//! configuration, with support for environment variables.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Environment prefix used by [`EnvConfigProvider::default`]
pub const ENV_PREFIX: &str = "REFDATA";

pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 300_000;
pub const MAX_CACHE_TTL_MS: u64 = 3_600_000;
pub const MAX_RESULTS_LIMIT: u32 = 500;
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an unsigned integer configuration value
    fn get_u64(&self, key: &str) -> Result<u64> {
        let value = self.get_string(key)?;
        value.trim().parse::<u64>().map_err(|e| {
            ServiceError::configuration(format!("Invalid integer for key {}: {}", key, e))
        })
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get an integer value with a default; a present but malformed value is an error
    fn get_u64_or(&self, key: &str, default: u64) -> Result<u64> {
        match self.get_string(key) {
            Ok(_) => self.get_u64(key),
            Err(_) => Ok(default),
        }
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,
}

impl Default for EnvConfigProvider {
    fn default() -> Self {
        Self {
            prefix: Some(ENV_PREFIX.to_string()),
        }
    }
}

impl EnvConfigProvider {
    /// Create a provider reading `REFDATA_*` variables
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider without any prefix
    pub fn unprefixed() -> Self {
        Self { prefix: None }
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));
        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                ServiceError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => ServiceError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// Configuration for the reference-data client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the upstream service
    pub base_url: String,

    /// Per-attempt request timeout
    pub timeout_ms: u64,

    /// Lifetime of cached results; zero disables caching
    pub cache_ttl_ms: u64,

    /// Upper bound for any requested result count
    pub max_results: u32,

    /// Index searched when the caller names none
    pub default_index_name: String,

    /// Text collection searched when the caller names none
    pub default_text_name: String,

    /// Transport retries after the first attempt
    pub max_retries: u32,

    /// First backoff delay; doubled on every retry
    pub retry_base_delay_ms: u64,

    /// Deadline for a deduplicated call
    pub dedup_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: 30_000,
            cache_ttl_ms: 300_000,
            max_results: 50,
            default_index_name: "main".to_string(),
            default_text_name: "articles".to_string(),
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            dedup_timeout_ms: 60_000,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given upstream with default settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();

        let max_results = provider.get_u64_or("max_results", defaults.max_results as u64)?;
        let max_retries = provider.get_u64_or("max_retries", defaults.max_retries as u64)?;

        let config = Self {
            base_url: provider.get_string("base_url")?,
            timeout_ms: provider.get_u64_or("timeout_ms", defaults.timeout_ms)?,
            cache_ttl_ms: provider.get_u64_or("cache_ttl_ms", defaults.cache_ttl_ms)?,
            max_results: u32::try_from(max_results).map_err(|_| {
                ServiceError::configuration(format!("max_results out of range: {}", max_results))
            })?,
            default_index_name: provider.get_string_or("default_index_name", &defaults.default_index_name),
            default_text_name: provider.get_string_or("default_text_name", &defaults.default_text_name),
            max_retries: u32::try_from(max_retries).map_err(|_| {
                ServiceError::configuration(format!("max_retries out of range: {}", max_retries))
            })?,
            retry_base_delay_ms: provider.get_u64_or("retry_base_delay_ms", defaults.retry_base_delay_ms)?,
            dedup_timeout_ms: provider.get_u64_or("dedup_timeout_ms", defaults.dedup_timeout_ms)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `REFDATA_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_provider(&EnvConfigProvider::new())
    }

    /// Check every field against its documented bounds
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            ServiceError::configuration(format!("Invalid base URL {:?}: {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ServiceError::configuration(format!(
                "Base URL must use http or https, got {}",
                url.scheme()
            )));
        }

        if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(ServiceError::configuration(format!(
                "timeout_ms must be between {} and {}, got {}",
                MIN_TIMEOUT_MS, MAX_TIMEOUT_MS, self.timeout_ms
            )));
        }

        if self.cache_ttl_ms > MAX_CACHE_TTL_MS {
            return Err(ServiceError::configuration(format!(
                "cache_ttl_ms must be at most {}, got {}",
                MAX_CACHE_TTL_MS, self.cache_ttl_ms
            )));
        }

        if !(1..=MAX_RESULTS_LIMIT).contains(&self.max_results) {
            return Err(ServiceError::configuration(format!(
                "max_results must be between 1 and {}, got {}",
                MAX_RESULTS_LIMIT, self.max_results
            )));
        }

        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ServiceError::configuration(format!(
                "max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, self.max_retries
            )));
        }

        if self.default_index_name.trim().is_empty() {
            return Err(ServiceError::configuration("default_index_name is required"));
        }

        if self.default_text_name.trim().is_empty() {
            return Err(ServiceError::configuration("default_text_name is required"));
        }

        if self.dedup_timeout_ms == 0 {
            return Err(ServiceError::configuration("dedup_timeout_ms must be positive"));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn dedup_timeout(&self) -> Duration {
        Duration::from_millis(self.dedup_timeout_ms)
    }
}
