//! `Set-Cookie` parsing
//!
//! Only the leading `name=value` pair matters; attributes such as `Path`,
//! `HttpOnly`, `Secure` or `SameSite` are ignored.

use std::collections::BTreeMap;

use cookie::Cookie;
use reqwest::header::{HeaderMap, SET_COOKIE};

/// Session cookies, kept sorted by name
pub type CookieJar = BTreeMap<String, String>;

/// Parse one `Set-Cookie` value into its name and value
///
/// Cookies with an empty name or value are skipped.
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let cookie = Cookie::parse(header.trim()).ok()?;
    let (name, value) = (cookie.name().trim(), cookie.value().trim());

    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some((name.to_string(), value.to_string()))
}

/// Every cookie set by a response, in header order
pub fn cookies_from_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(parse_set_cookie)
        .collect()
}

/// Render the jar as a single `Cookie` header value
pub fn cookie_header(jar: &CookieJar) -> Option<String> {
    if jar.is_empty() {
        return None;
    }
    Some(
        jar.iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; "),
    )
}
