//! Cookie session management
//!
//! The upstream service authenticates with a session cookie handed out by a
//! lightweight catalog endpoint. [`SessionManager`] bootstraps that session
//! on first use, refreshes it on demand, and merges every `Set-Cookie` the
//! upstream sends afterwards. At most one bootstrap is in flight at a time;
//! concurrent callers share its outcome.

pub mod cookies;

pub use cookies::{cookie_header, parse_set_cookie, CookieJar};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::HeaderMap;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{mapping::map_http_error, Result, ServiceError};

type SharedInit = Shared<BoxFuture<'static, Result<()>>>;

struct PendingInit {
    id: u64,
    future: SharedInit,
}

#[derive(Default)]
struct SessionState {
    cookies: CookieJar,
    pending: Option<PendingInit>,
    next_id: u64,
}

struct SessionInner {
    http: Client,
    bootstrap_url: Url,
    timeout: Duration,
    state: Mutex<SessionState>,
    bootstraps: AtomicU64,
}

impl SessionInner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn merge_cookies(&self, headers: &HeaderMap) {
        let received = cookies::cookies_from_headers(headers);
        if received.is_empty() {
            return;
        }

        let mut state = self.state();
        for (name, value) in received {
            debug!(cookie = %name, "session cookie updated");
            state.cookies.insert(name, value);
        }
    }

    async fn bootstrap(&self) -> Result<()> {
        self.bootstraps.fetch_add(1, Ordering::Relaxed);
        info!(url = %self.bootstrap_url, "establishing upstream session");

        let call = async {
            let response = self.http.get(self.bootstrap_url.clone()).send().await?;
            self.merge_cookies(response.headers());

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            Err(map_http_error(status, &headers, &body))
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::timeout(format!(
                "Session bootstrap timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Keep or drop the cookies depending on how the bootstrap ended
    fn settle(&self, result: &Result<()>) {
        let mut state = self.state();
        match result {
            Ok(()) if state.cookies.is_empty() => {
                warn!("session bootstrap succeeded but upstream set no cookie");
            }
            Ok(()) => {
                info!(cookies = state.cookies.len(), "upstream session established");
            }
            Err(err) => {
                warn!(error = %err, "session bootstrap failed");
                state.cookies.clear();
            }
        }
    }
}

/// Clears the pending bootstrap slot, including when the bootstrap task panics
struct InitGuard {
    inner: Arc<SessionInner>,
    id: u64,
}

impl Drop for InitGuard {
    fn drop(&mut self) {
        let mut state = self.inner.state();
        if state.pending.as_ref().map_or(false, |p| p.id == self.id) {
            state.pending = None;
        }
    }
}

/// Owner of the upstream session cookies
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Create a manager bootstrapping against `bootstrap_url`
    pub fn new(http: Client, bootstrap_url: Url, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                http,
                bootstrap_url,
                timeout,
                state: Mutex::new(SessionState::default()),
                bootstraps: AtomicU64::new(0),
            }),
        }
    }

    /// Make sure a session is held
    ///
    /// Without `force_refresh` this returns immediately once any cookie is
    /// held. With it, the current cookies are dropped and a new bootstrap
    /// runs, unless one is already in flight, in which case it is joined.
    pub async fn ensure_session(&self, force_refresh: bool) -> Result<()> {
        let init = {
            let mut state = self.inner.state();

            if let Some(pending) = state.pending.as_ref() {
                debug!(force_refresh, "joining in-flight session bootstrap");
                pending.future.clone()
            } else if !force_refresh && !state.cookies.is_empty() {
                return Ok(());
            } else {
                if force_refresh {
                    info!("refreshing upstream session");
                    state.cookies.clear();
                }
                state.next_id += 1;
                let id = state.next_id;

                let inner = Arc::clone(&self.inner);
                let handle = tokio::spawn(async move {
                    let _guard = InitGuard {
                        inner: Arc::clone(&inner),
                        id,
                    };
                    let result = inner.bootstrap().await;
                    inner.settle(&result);
                    result
                });

                let future = async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(ServiceError::unexpected("Session bootstrap task failed", e))
                    })
                }
                .boxed()
                .shared();

                state.pending = Some(PendingInit {
                    id,
                    future: future.clone(),
                });
                future
            }
        };

        init.await
    }

    /// Headers authenticating a request; empty when no session is held
    pub fn auth_headers(&self) -> HashMap<String, String> {
        let state = self.inner.state();
        cookie_header(&state.cookies)
            .map(|value| HashMap::from([("Cookie".to_string(), value)]))
            .unwrap_or_default()
    }

    /// Value of the `Cookie` header, if a session is held
    pub fn cookie_header(&self) -> Option<String> {
        cookie_header(&self.inner.state().cookies)
    }

    /// Merge cookies set by any upstream response
    pub fn handle_response(&self, headers: &HeaderMap) {
        self.inner.merge_cookies(headers);
    }

    /// Forget every cookie
    pub fn clear_session(&self) {
        self.inner.state().cookies.clear();
        debug!("session cleared");
    }

    pub fn has_session(&self) -> bool {
        !self.inner.state().cookies.is_empty()
    }

    pub fn cookie_count(&self) -> usize {
        self.inner.state().cookies.len()
    }

    /// Bootstrap requests issued so far
    pub fn bootstrap_count(&self) -> u64 {
        self.inner.bootstraps.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, SET_COOKIE};

    fn manager() -> SessionManager {
        SessionManager::new(
            Client::new(),
            Url::parse("http://127.0.0.1:9/api/catalog").unwrap(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_auth_headers_empty_without_session() {
        let session = manager();
        assert!(session.auth_headers().is_empty());
        assert!(!session.has_session());
    }

    #[test]
    fn test_handle_response_merges_cookies() {
        let session = manager();

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("sid=one; Path=/"));
        session.handle_response(&headers);

        let mut rotated = HeaderMap::new();
        rotated.append(SET_COOKIE, HeaderValue::from_static("sid=two; HttpOnly"));
        rotated.append(SET_COOKIE, HeaderValue::from_static("lang=en"));
        session.handle_response(&rotated);

        assert_eq!(session.cookie_count(), 2);
        assert_eq!(
            session.auth_headers().get("Cookie").map(String::as_str),
            Some("lang=en; sid=two")
        );

        session.clear_session();
        assert!(session.auth_headers().is_empty());
    }
}
