//! Upstream request execution
//!
//! One logical request is a bounded loop: make sure a session is held, issue
//! the GET under a per-attempt deadline, classify the outcome, then either
//! return, refresh the session once after a 401, or back off and retry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, COOKIE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::mapping::{classify_http_error, map_http_error};
use crate::error::{ErrorKind, Result, ServiceError};
use crate::resilience::RetryConfig;
use crate::services::common::ClientMetrics;
use crate::session::SessionManager;
use crate::util::{sanitize_for_logging, truncate_string};

/// Query parameters; `None` values are left out of the address
pub type QueryParams<'a> = [(&'a str, Option<String>)];

/// Decoded body plus the headers it came with
#[derive(Debug, Clone)]
pub struct UpstreamResponse<T> {
    /// `None` for `204 No Content` or an empty body
    pub body: Option<T>,
    pub headers: HeaderMap,
}

enum AttemptError {
    /// Upstream rejected the session cookie
    Unauthorized(ServiceError),
    Failed(ServiceError),
}

/// Bootstrap failures surface as network errors, except timeouts and rate limits
fn session_failure(err: ServiceError) -> ServiceError {
    match err.kind() {
        ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimit => err,
        _ => ServiceError::Network {
            message: format!("Session bootstrap failed: {}", err),
            status: err.status_code(),
            source: Some(Arc::new(err)),
        },
    }
}

/// Executes GET requests against one upstream service
#[derive(Clone)]
pub struct RequestExecutor {
    http: Client,
    base_url: String,
    session: SessionManager,
    timeout: Duration,
    retry: RetryConfig,
    metrics: Arc<ClientMetrics>,
}

impl RequestExecutor {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        session: SessionManager,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            session,
            timeout,
            retry,
            metrics: Arc::new(ClientMetrics::default()),
        }
    }

    /// Share a metrics sink with the owning client
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn metrics(&self) -> &Arc<ClientMetrics> {
        &self.metrics
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// GET `endpoint` and decode the JSON body
    pub async fn request<T>(&self, endpoint: &str, params: &QueryParams<'_>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        Ok(self.request_with_headers(endpoint, params).await?.body)
    }

    /// Same as [`request`](Self::request), keeping the response headers
    pub async fn request_with_headers<T>(
        &self,
        endpoint: &str,
        params: &QueryParams<'_>,
    ) -> Result<UpstreamResponse<T>>
    where
        T: DeserializeOwned,
    {
        let url = self.build_url(endpoint, params)?;
        let mut schedule = self.retry.schedule();
        let mut retries = 0u32;
        let mut session_retried = false;
        let mut refreshed = false;

        loop {
            // A refreshed session is final for this request, even without cookies
            let err = match self.attempt::<T>(&url, !refreshed).await {
                Ok(response) => return Ok(response),
                Err(AttemptError::Unauthorized(_)) if !session_retried => {
                    session_retried = true;
                    self.metrics.record_session_refresh();
                    info!(endpoint, "upstream rejected session, refreshing");

                    match self.session.ensure_session(true).await {
                        Ok(()) => {
                            refreshed = true;
                            continue;
                        }
                        Err(err) => session_failure(err),
                    }
                }
                Err(AttemptError::Unauthorized(err)) | Err(AttemptError::Failed(err)) => err,
            };

            self.metrics.record_error();

            if !self.retry.should_retry(&err, retries) {
                if err.is_retryable() {
                    warn!(endpoint, retries, error = %err, "giving up after retries");
                } else {
                    debug!(endpoint, kind = %err.kind(), "error is not retried");
                }
                return Err(err);
            }

            retries += 1;
            let delay = schedule.next_delay();
            self.metrics.record_retry();
            warn!(
                endpoint,
                attempt = retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying upstream request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt<T>(
        &self,
        url: &Url,
        bootstrap: bool,
    ) -> std::result::Result<UpstreamResponse<T>, AttemptError>
    where
        T: DeserializeOwned,
    {
        if bootstrap {
            self.session
                .ensure_session(false)
                .await
                .map_err(|e| AttemptError::Failed(session_failure(e)))?;
        }

        self.metrics.record_request();
        debug!(path = url.path(), "sending upstream request");

        let call = async {
            let mut request = self.http.get(url.clone());
            if let Some(cookie) = self.session.cookie_header() {
                request = request.header(COOKIE, cookie);
            }

            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, ServiceError>((status, headers, body))
        };

        let (status, headers, body) = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(AttemptError::Failed)?,
            Err(_) => {
                return Err(AttemptError::Failed(ServiceError::timeout(format!(
                    "Request to {} timed out after {}ms",
                    url.path(),
                    self.timeout.as_millis()
                ))))
            }
        };

        self.session.handle_response(&headers);
        debug!(path = url.path(), status = status.as_u16(), "upstream responded");

        if status == StatusCode::UNAUTHORIZED {
            let text = String::from_utf8_lossy(&body);
            return Err(AttemptError::Unauthorized(map_http_error(status, &headers, &text)));
        }

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            debug!(
                path = url.path(),
                status = status.as_u16(),
                category = classify_http_error(status),
                body = %sanitize_for_logging(&truncate_string(&text, 200)),
                "upstream request failed"
            );
            return Err(AttemptError::Failed(map_http_error(status, &headers, &text)));
        }

        if status == StatusCode::NO_CONTENT || body.iter().all(u8::is_ascii_whitespace) {
            return Ok(UpstreamResponse { body: None, headers });
        }

        let parsed = serde_json::from_slice::<T>(&body).map_err(|e| {
            AttemptError::Failed(ServiceError::parsing(format!(
                "Invalid response body from {}: {}",
                url.path(),
                e
            )))
        })?;

        Ok(UpstreamResponse {
            body: Some(parsed),
            headers,
        })
    }

    fn build_url(&self, endpoint: &str, params: &QueryParams<'_>) -> Result<Url> {
        let raw = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| ServiceError::configuration(format!("Invalid request URL {}: {}", raw, e)))?;

        {
            let mut query = url.query_pairs_mut();
            for (name, value) in params {
                if let Some(value) = value {
                    query.append_pair(name, value);
                }
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(base_url: &str) -> RequestExecutor {
        let http = Client::new();
        let session = SessionManager::new(
            http.clone(),
            Url::parse("http://127.0.0.1:9/api/catalog").unwrap(),
            Duration::from_secs(1),
        );
        RequestExecutor::new(http, base_url, session, Duration::from_secs(1), RetryConfig::default())
    }

    #[test]
    fn test_build_url_skips_missing_params() {
        let executor = executor("http://refdata.local/");
        let url = executor
            .build_url(
                "/api/index/search",
                &[
                    ("index", Some("main".to_string())),
                    ("q", Some("red dwarf".to_string())),
                    ("limit", None),
                ],
            )
            .unwrap();

        assert_eq!(url.as_str(), "http://refdata.local/api/index/search?index=main&q=red+dwarf");
    }

    #[test]
    fn test_build_url_without_params() {
        let executor = executor("http://refdata.local");
        let url = executor.build_url("api/catalog", &[]).unwrap();
        assert_eq!(url.as_str(), "http://refdata.local/api/catalog");
    }

    #[test]
    fn test_session_failure_keeps_timeouts_and_rate_limits() {
        let err = session_failure(ServiceError::timeout("slow"));
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let err = session_failure(ServiceError::rate_limit(5));
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.retry_after(), Some(5));
        assert!(!err.is_retryable());

        let err = session_failure(ServiceError::configuration("bad cookie"));
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
