//! Tests for configuration management functionality
//!
//! These tests verify that the configuration providers and the client
//! configuration bounds work correctly.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env;
    use std::time::Duration;

    use crate::config::{
        ClientConfig, ConfigProvider, ConfigProviderExt, EnvConfigProvider, MemoryConfigProvider,
    };
    use crate::error::ErrorKind;

    fn valid_config() -> ClientConfig {
        ClientConfig::new("https://refdata.example.org")
    }

    #[test]
    fn test_memory_config_provider_defaults() {
        let provider = MemoryConfigProvider::with_values(HashMap::from([
            ("timeout_ms".to_string(), "2500".to_string()),
            ("max_results".to_string(), "many".to_string()),
        ]));

        assert_eq!(provider.get_u64_or("timeout_ms", 30_000).unwrap(), 2_500);
        assert_eq!(provider.get_u64_or("cache_ttl_ms", 42).unwrap(), 42);
        assert_eq!(provider.get_string_or("default_index_name", "main"), "main");

        // Present but malformed is an error, not a silent default
        let err = provider.get_u64_or("max_results", 50).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_env_config_provider() {
        env::set_var("REFDATA_CFGTEST_BASE_URL", "http://localhost:8080");
        env::set_var("REFDATA_CFGTEST_CACHE_TTL_MS", "0");
        env::set_var("REFDATA_CFGTEST_MAX_RETRIES", "5");
        env::set_var("REFDATA_CFGTEST_DEFAULT_TEXT_NAME", "encyclopedia");

        let provider = EnvConfigProvider::new().with_prefix("REFDATA_CFGTEST");
        assert_eq!(provider.get_string("base_url").unwrap(), "http://localhost:8080");

        let config = ClientConfig::from_provider(&provider).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.cache_ttl(), Duration::ZERO);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.default_text_name, "encyclopedia");
        assert_eq!(config.default_index_name, "main");
        assert_eq!(config.dedup_timeout(), Duration::from_secs(60));

        env::remove_var("REFDATA_CFGTEST_BASE_URL");
        env::remove_var("REFDATA_CFGTEST_CACHE_TTL_MS");
        env::remove_var("REFDATA_CFGTEST_MAX_RETRIES");
        env::remove_var("REFDATA_CFGTEST_DEFAULT_TEXT_NAME");
    }

    #[test]
    fn test_missing_env_variable() {
        let provider = EnvConfigProvider::new().with_prefix("REFDATA_CFGTEST_MISSING");
        let err = provider.get_string("base_url").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("REFDATA_CFGTEST_MISSING_BASE_URL"));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.retry_base_delay(), Duration::from_secs(1));
        assert_eq!(config.max_results, 50);
    }

    #[test]
    fn test_bounds() {
        let cases: Vec<(&str, Box<dyn Fn(&mut ClientConfig)>)> = vec![
            ("relative url", Box::new(|c| c.base_url = "/api".to_string())),
            ("ftp url", Box::new(|c| c.base_url = "ftp://refdata.example.org".to_string())),
            ("short timeout", Box::new(|c| c.timeout_ms = 999)),
            ("long timeout", Box::new(|c| c.timeout_ms = 300_001)),
            ("long ttl", Box::new(|c| c.cache_ttl_ms = 3_600_001)),
            ("zero results", Box::new(|c| c.max_results = 0)),
            ("too many results", Box::new(|c| c.max_results = 501)),
            ("too many retries", Box::new(|c| c.max_retries = 11)),
            ("blank index", Box::new(|c| c.default_index_name = " ".to_string())),
            ("blank text", Box::new(|c| c.default_text_name = String::new())),
            ("zero dedup timeout", Box::new(|c| c.dedup_timeout_ms = 0)),
        ];

        for (name, mutate) in cases {
            let mut config = valid_config();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "{}", name);
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let mut config = valid_config();
        config.timeout_ms = 1_000;
        config.cache_ttl_ms = 3_600_000;
        config.max_results = 500;
        config.max_retries = 10;
        assert!(config.validate().is_ok());

        config.timeout_ms = 300_000;
        config.cache_ttl_ms = 0;
        config.max_results = 1;
        config.max_retries = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = valid_config();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["base_url"], "https://refdata.example.org");
        assert_eq!(json["cache_ttl_ms"], 300_000);
    }
}
