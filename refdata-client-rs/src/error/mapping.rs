//! Error mapping for upstream HTTP responses
//!
//! This module converts non-success upstream responses into the normalized
//! ServiceError type and decides what callers are allowed to see.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;

use super::{ErrorKind, ServiceError};
use crate::util::truncate_string;

/// Seconds to wait when a 429 carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Longest slice of an upstream body copied into an error message
const MAX_BODY_IN_MESSAGE: usize = 200;

/// Parse the `Retry-After` header as whole seconds
pub fn parse_retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Map a non-success upstream response to a ServiceError
///
/// 401 is not handled here: the executor owns the session retry.
pub fn map_http_error(status: StatusCode, headers: &HeaderMap, body: &str) -> ServiceError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ServiceError::rate_limit(parse_retry_after(headers));
    }

    ServiceError::http_status(status.as_u16(), describe_body(status, body))
}

/// Build a short message out of a JSON or plain-text error body
fn describe_body(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {}", status);
    }

    // Upstream errors are either {"message": ...}, {"error": ...} or plain text
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .or_else(|| json.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());

    format!("HTTP {}: {}", status, truncate_string(&detail, MAX_BODY_IN_MESSAGE))
}

/// Helper function to classify HTTP errors by category, for logging
pub fn classify_http_error(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "validation",
        401 => "authentication",
        403 => "authorization",
        404 => "not_found",
        408 => "timeout",
        429 => "rate_limit",
        500..=599 => "server",
        _ => "unknown",
    }
}

/// Determines if an error is safe to expose verbatim to callers
pub fn is_safe_for_external(error: &ServiceError) -> bool {
    matches!(error.kind(), ErrorKind::Validation | ErrorKind::RateLimit)
}

/// Creates the caller-facing message for an error
pub fn public_message(error: &ServiceError) -> String {
    if is_safe_for_external(error) {
        return error.to_string();
    }

    match error.kind() {
        ErrorKind::Timeout => "The reference-data service did not respond in time. Please try again later.",
        ErrorKind::NotFound => "The requested resource was not found.",
        ErrorKind::Configuration => "The reference-data client is not configured correctly.",
        _ => "An error occurred while communicating with the reference-data service.",
    }
    .to_string()
}
