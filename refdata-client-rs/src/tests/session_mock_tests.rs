//! Mock tests for the session manager
//!
//! These tests use WireMock to simulate the upstream catalog endpoint and
//! verify cookie bootstrap, refresh and single-flight behaviour.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::join_all;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::error::ErrorKind;
    use crate::services::common::build_http_client;
    use crate::session::SessionManager;

    fn session_for(server: &MockServer, timeout: Duration) -> SessionManager {
        let http = build_http_client(None).unwrap();
        let url = Url::parse(&format!("{}/api/catalog", server.uri())).unwrap();
        SessionManager::new(http, url, timeout)
    }

    fn catalog_response(cookie: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("set-cookie", cookie)
            .set_body_json(json!({ "entries": [] }))
    }

    async fn bootstrap_calls(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == "/api/catalog")
            .count()
    }

    #[tokio::test]
    async fn test_bootstrap_sets_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalog"))
            .respond_with(catalog_response("JSESSIONID=abc123; Path=/; HttpOnly; Secure"))
            .expect(1)
            .mount(&server)
            .await;

        let session = session_for(&server, Duration::from_secs(2));
        session.ensure_session(false).await.unwrap();

        assert!(session.has_session());
        assert_eq!(
            session.auth_headers().get("Cookie").map(String::as_str),
            Some("JSESSIONID=abc123")
        );

        // Held cookies make further calls a no-op
        session.ensure_session(false).await.unwrap();
        assert_eq!(session.bootstrap_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_bootstrap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalog"))
            .respond_with(catalog_response("sid=one").set_delay(Duration::from_millis(100)))
            .mount(&server)
            .await;

        let session = session_for(&server, Duration::from_secs(2));
        let results = join_all((0..5).map(|_| session.ensure_session(false))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(bootstrap_calls(&server).await, 1);
        assert_eq!(session.bootstrap_count(), 1);

        // A forced refresh issues exactly one more bootstrap
        session.ensure_session(true).await.unwrap();
        assert_eq!(bootstrap_calls(&server).await, 2);
    }

    #[tokio::test]
    async fn test_forced_refresh_joins_in_flight_bootstrap() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalog"))
            .respond_with(catalog_response("sid=one").set_delay(Duration::from_millis(100)))
            .mount(&server)
            .await;

        let session = session_for(&server, Duration::from_secs(2));
        let (first, forced) = tokio::join!(session.ensure_session(false), session.ensure_session(true));

        assert!(first.is_ok() && forced.is_ok());
        assert_eq!(bootstrap_calls(&server).await, 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_cookies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalog"))
            .respond_with(catalog_response("sid=one"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/catalog"))
            .respond_with(catalog_response("token=two"))
            .mount(&server)
            .await;

        let session = session_for(&server, Duration::from_secs(2));
        session.ensure_session(false).await.unwrap();
        assert_eq!(session.cookie_header().as_deref(), Some("sid=one"));

        session.ensure_session(true).await.unwrap();
        assert_eq!(session.cookie_header().as_deref(), Some("token=two"));
        assert_eq!(session.cookie_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_bootstrap_keeps_no_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalog"))
            .respond_with(
                ResponseTemplate::new(503)
                    .insert_header("set-cookie", "sid=partial")
                    .set_body_string("maintenance"),
            )
            .mount(&server)
            .await;

        let session = session_for(&server, Duration::from_secs(2));
        let err = session.ensure_session(false).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.status_code(), Some(503));
        assert!(!session.has_session());
        assert!(session.auth_headers().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_without_cookie_retries_next_time() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "entries": [] })))
            .mount(&server)
            .await;

        let session = session_for(&server, Duration::from_secs(2));
        session.ensure_session(false).await.unwrap();
        assert!(!session.has_session());

        session.ensure_session(false).await.unwrap();
        assert_eq!(bootstrap_calls(&server).await, 2);
    }

    #[tokio::test]
    async fn test_bootstrap_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/catalog"))
            .respond_with(catalog_response("sid=late").set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let session = session_for(&server, Duration::from_millis(100));
        let err = session.ensure_session(false).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("100ms"));
        assert!(!session.has_session());
    }
}
