//! Input validation
//!
//! Every consumer-facing operation checks its input here before touching the
//! cache or the network. Failures are validation errors, shown verbatim to
//! callers.

use crate::error::{Result, ServiceError};

pub const MAX_QUERY_LENGTH: usize = 500;
pub const MAX_ENTITY_NAME_LENGTH: usize = 200;

const FORBIDDEN_CHARS: &[char] = &['<', '>', '{', '}', '[', ']', '\\', ';', '|', '$', '`'];

const MAX_RESOURCE_NAME_LENGTH: usize = 100;
const MAX_ENTITY_ID_LENGTH: usize = 128;

/// Non-empty, at most `max` characters, each alphanumeric ASCII or in `extra`
fn is_identifier(s: &str, max: usize, extra: &str) -> bool {
    !s.is_empty()
        && s.len() <= max
        && s.chars().all(|c| c.is_ascii_alphanumeric() || extra.contains(c))
}

/// Validation of consumer input
pub trait InputValidator: Send + Sync {
    /// Check a search query and return it trimmed
    fn validate_query(&self, query: &str) -> Result<String>;

    /// Check an index or text collection name
    fn validate_resource_name(&self, kind: &str, name: &str) -> Result<String>;

    /// Check an entity id
    fn validate_entity_id(&self, id: &str) -> Result<String>;

    /// Check an entity name used for catalog lookup
    fn validate_entity_name(&self, name: &str) -> Result<String>;

    /// Resolve the requested result count against `max_results`
    fn validate_limit(&self, limit: Option<u32>, max_results: u32) -> Result<u32>;
}

/// Default validation rules
#[derive(Debug, Clone, Default)]
pub struct DefaultValidator;

impl DefaultValidator {
    pub fn new() -> Self {
        Self
    }
}

/// `*` may only open or close a word, and never stand alone
fn check_wildcards(query: &str) -> Result<()> {
    for word in query.split_whitespace() {
        if !word.contains('*') {
            continue;
        }

        let core = word.trim_matches('*');
        if core.is_empty() {
            return Err(ServiceError::validation(
                "Query wildcard must be attached to a search term",
            ));
        }
        if core.contains('*') {
            return Err(ServiceError::validation(format!(
                "Wildcard is only allowed at the start or end of a word: {}",
                word
            )));
        }
    }
    Ok(())
}

impl InputValidator for DefaultValidator {
    fn validate_query(&self, query: &str) -> Result<String> {
        let query = query.trim();

        if query.is_empty() {
            return Err(ServiceError::validation("Query must not be empty"));
        }

        let length = query.chars().count();
        if length > MAX_QUERY_LENGTH {
            return Err(ServiceError::validation(format!(
                "Query length ({}) exceeds maximum length ({})",
                length, MAX_QUERY_LENGTH
            )));
        }

        if let Some(c) = query
            .chars()
            .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
        {
            return Err(ServiceError::validation(format!(
                "Query contains forbidden character: {:?}",
                c
            )));
        }

        check_wildcards(query)?;
        Ok(query.to_string())
    }

    fn validate_resource_name(&self, kind: &str, name: &str) -> Result<String> {
        let name = name.trim();
        if !is_identifier(name, MAX_RESOURCE_NAME_LENGTH, "_.-") {
            return Err(ServiceError::validation(format!(
                "Invalid {} name: must be 1-100 characters of letters, digits, '_', '.' or '-'",
                kind
            )));
        }
        Ok(name.to_string())
    }

    fn validate_entity_id(&self, id: &str) -> Result<String> {
        let id = id.trim();
        if !is_identifier(id, MAX_ENTITY_ID_LENGTH, "_.:-") {
            return Err(ServiceError::validation(
                "Invalid entity id: must be 1-128 characters of letters, digits, '_', '.', ':' or '-'",
            ));
        }
        Ok(id.to_string())
    }

    fn validate_entity_name(&self, name: &str) -> Result<String> {
        let name = name.trim();

        if name.is_empty() {
            return Err(ServiceError::validation("Entity name must not be empty"));
        }
        if name.chars().count() > MAX_ENTITY_NAME_LENGTH {
            return Err(ServiceError::validation(format!(
                "Entity name exceeds maximum length ({})",
                MAX_ENTITY_NAME_LENGTH
            )));
        }
        if name.chars().any(char::is_control) {
            return Err(ServiceError::validation(
                "Entity name contains control characters",
            ));
        }
        Ok(name.to_string())
    }

    fn validate_limit(&self, limit: Option<u32>, max_results: u32) -> Result<u32> {
        match limit {
            None => Ok(max_results),
            Some(limit) if (1..=max_results).contains(&limit) => Ok(limit),
            Some(limit) => Err(ServiceError::validation(format!(
                "Limit must be between 1 and {}, got {}",
                max_results, limit
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_is_trimmed() {
        let validator = DefaultValidator::new();
        assert_eq!(validator.validate_query("  iron ore ").unwrap(), "iron ore");
    }

    #[test]
    fn test_query_rejections() {
        let validator = DefaultValidator::new();

        assert!(validator.validate_query("   ").is_err());
        assert!(validator.validate_query(&"a".repeat(MAX_QUERY_LENGTH + 1)).is_err());
        assert!(validator.validate_query(&"a".repeat(MAX_QUERY_LENGTH)).is_ok());

        for bad in ["<script>", "a; b", "x | y", "$HOME", "`ls`", "a\u{0007}b", "{x}", "[1]", "a\\b"] {
            let err = validator.validate_query(bad).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_wildcards() {
        let validator = DefaultValidator::new();

        assert!(validator.validate_query("iron*").is_ok());
        assert!(validator.validate_query("*ore").is_ok());
        assert!(validator.validate_query("*ferr* oxide").is_ok());

        assert!(validator.validate_query("ir*on").is_err());
        assert!(validator.validate_query("*").is_err());
        assert!(validator.validate_query("iron **").is_err());
    }

    #[test]
    fn test_resource_names_and_ids() {
        let validator = DefaultValidator::new();

        assert_eq!(validator.validate_resource_name("index", " main-v2.1 ").unwrap(), "main-v2.1");
        assert!(validator.validate_resource_name("index", "main index").is_err());
        assert!(validator.validate_resource_name("index", &"x".repeat(101)).is_err());

        assert!(validator.validate_entity_id("urn:entity:42").is_ok());
        assert!(validator.validate_entity_id("").is_err());
        assert!(validator.validate_entity_id("a/b").is_err());
    }

    #[test]
    fn test_entity_names() {
        let validator = DefaultValidator::new();

        assert_eq!(validator.validate_entity_name(" Iron ").unwrap(), "Iron");
        assert!(validator.validate_entity_name("").is_err());
        assert!(validator.validate_entity_name(&"n".repeat(201)).is_err());
    }

    #[test]
    fn test_limits() {
        let validator = DefaultValidator::new();

        assert_eq!(validator.validate_limit(None, 50).unwrap(), 50);
        assert_eq!(validator.validate_limit(Some(10), 50).unwrap(), 10);
        assert!(validator.validate_limit(Some(0), 50).is_err());
        assert!(validator.validate_limit(Some(51), 50).is_err());
    }
}
