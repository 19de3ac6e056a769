//! Error handling for the reference-data client
//!
//! This module provides the error taxonomy shared by every layer:
//! - Categorizes errors by kind (validation, network, timeout, rate limit, ...)
//! - Keeps the original cause of unexpected failures as an internal source
//! - Decides which messages are safe to show to callers
//! - Provides a convenient Result type alias

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod mapping;

/// Result type for reference-data client operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Shared, cloneable handle to an underlying cause
pub type ErrorSource = Arc<dyn StdError + Send + Sync + 'static>;

/// Error kind used to pick a handling policy, independent of the variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Network,
    Timeout,
    RateLimit,
    NotFound,
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::NotFound => "not_found",
            Self::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// Main error type for the reference-data client
///
/// The type is `Clone` because the same outcome is handed to every waiter of a
/// deduplicated call or a shared session bootstrap.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// Bad caller input, never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport or HTTP failure
    #[error("Network error: {message}")]
    Network {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<ErrorSource>,
    },

    /// A successful response whose body could not be decoded
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Deadline exceeded
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Upstream asked us to slow down
    #[error("Rate limit exceeded: retry after {retry_after} seconds")]
    RateLimit { retry_after: u64 },

    /// A named entity or operation does not exist
    #[error("Not found - {resource}: {name}")]
    NotFound { resource: String, name: String },

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ServiceError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// Create a network error without an HTTP status
    pub fn network(message: impl Into<String>) -> Self {
        ServiceError::Network {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Create a network error for an HTTP status
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        ServiceError::Network {
            message: message.into(),
            status: Some(status),
            source: None,
        }
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        ServiceError::Parse(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        ServiceError::Timeout(message.into())
    }

    /// Create a rate limit error
    pub fn rate_limit(retry_after: u64) -> Self {
        ServiceError::RateLimit { retry_after }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>, name: impl Into<String>) -> Self {
        ServiceError::NotFound {
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    /// Wrap an unexpected failure; the original is only kept as the source
    pub fn unexpected<E>(context: impl Into<String>, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ServiceError::Network {
            message: context.into(),
            status: None,
            source: Some(Arc::new(err)),
        }
    }

    /// The handling policy this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::Network { .. } | ServiceError::Parse(_) => ErrorKind::Network,
            ServiceError::Timeout(_) => ErrorKind::Timeout,
            ServiceError::RateLimit { .. } => ErrorKind::RateLimit,
            ServiceError::NotFound { .. } => ErrorKind::NotFound,
            ServiceError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ServiceError::Network { status, .. } => *status,
            ServiceError::RateLimit { .. } => Some(429),
            _ => None,
        }
    }

    /// Seconds the upstream asked us to wait, for rate limit errors
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ServiceError::RateLimit { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Network- and timeout-kind errors are retried by the executor
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Timeout)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Message suitable for crossing the outward boundary
    ///
    /// Only validation and rate limit messages are shown verbatim.
    pub fn public_message(&self) -> String {
        mapping::public_message(self)
    }
}

/// Convert reqwest errors to ServiceError
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ServiceError::timeout(format!("Request timed out: {}", err));
        }

        let message = if err.is_connect() {
            "Connection error"
        } else if err.is_redirect() {
            "Too many redirects"
        } else if err.is_decode() {
            "Response decode error"
        } else if err.is_body() {
            "Failed to read response body"
        } else {
            "HTTP client error"
        };

        ServiceError::Network {
            message: format!("{}: {}", message, err),
            status: err.status().map(|s| s.as_u16()),
            source: Some(Arc::new(err)),
        }
    }
}

/// Convert serde_json errors to ServiceError
impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::parsing(format!("JSON error: {}", err))
    }
}
