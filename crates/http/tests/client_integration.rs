//! Integration tests for the credentialed HTTP client
//!
//! Drives the full request path against a local mock server: retry on
//! server errors, terminal classification of client errors, the rate gate,
//! credential headers, and metric accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ledgerlens_http::{CredentialedHttpClient, Credentials, Method, RequestOptions};
use ledgerlens_resilience::error::ServiceError;
use ledgerlens_resilience::rate_limit::RatePolicy;
use ledgerlens_resilience::retry::{Jitter, RetryConfig};
use serde::Deserialize;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn test_client() -> CredentialedHttpClient {
    CredentialedHttpClient::builder()
        .timeout(Duration::from_secs(5))
        .user_agent("ledgerlens-test/0.1")
        .retry(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            backoff: false,
            max_delay: Duration::from_secs(1),
            jitter: Jitter::None,
        })
        .build()
        .unwrap_or_else(|err| panic!("failed to build client: {err}"))
}

/// A successful response comes back after exactly one request.
#[tokio::test]
async fn test_success_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client();
    let response =
        client.request(Method::GET, &server.uri(), &RequestOptions::new()).await;

    assert_eq!(response.map(|r| r.status().as_u16()).ok(), Some(200));
    let metrics = client.metrics();
    assert_eq!(metrics.requests, 1);
    assert_eq!(metrics.errors, 0);
}

/// Server errors are retried until success; three requests reach the
/// server for two 500s followed by a 200.
///
/// # Test Steps
/// 1. Mount a handler returning 500, 500, then 200
/// 2. Issue one logical request
/// 3. Verify the success result and exactly 3 server-side requests
#[tokio::test]
async fn test_retries_server_errors_until_success() {
    let server = MockServer::start().await;
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    Mock::given(method("GET"))
        .respond_with(move |_req: &Request| -> ResponseTemplate {
            if hits_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200).set_body_string("recovered")
            }
        })
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client();
    let response =
        client.request(Method::GET, &server.uri(), &RequestOptions::new()).await;

    assert_eq!(response.map(|r| r.status().as_u16()).ok(), Some(200));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

/// Exhausting the budget re-raises the last transport error with its
/// status; metrics record the failed request.
#[tokio::test]
async fn test_exhaustion_propagates_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client();
    let result = client.request(Method::GET, &server.uri(), &RequestOptions::new()).await;

    match result {
        Err(ServiceError::Transport(err)) => {
            assert_eq!(err.status, Some(503));
            assert_eq!(err.message, "overloaded");
        }
        other => panic!("expected transport error, got {other:?}"),
    }

    let metrics = client.metrics();
    assert_eq!(metrics.requests, 1);
    assert_eq!(metrics.errors, 1);
}

/// Auth/validation-class rejections are terminal: one request, no retry.
#[tokio::test]
async fn test_client_errors_are_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client();
    let result = client.request(Method::GET, &server.uri(), &RequestOptions::new()).await;

    match result {
        Err(ServiceError::Transport(err)) => {
            assert_eq!(err.status, Some(401));
            assert!(!ledgerlens_resilience::error::ErrorClassification::is_retryable(&err));
        }
        other => panic!("expected terminal transport error, got {other:?}"),
    }
}

/// A rate-limited call is denied before any transport attempt.
///
/// # Test Steps
/// 1. Register a 1-per-minute policy for the endpoint key
/// 2. Issue two gated requests
/// 3. Verify the second is `RateLimited` and the server saw exactly one
#[tokio::test]
async fn test_rate_gate_denies_before_transport() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client();
    client.set_rate_policy("quotes", RatePolicy::new(1, Duration::from_secs(60)));
    let options = RequestOptions::new().rate_limited("quotes");

    let first = client.request(Method::GET, &server.uri(), &options).await;
    assert!(first.is_ok());

    let second = client.request(Method::GET, &server.uri(), &options).await;
    assert!(matches!(second, Err(ServiceError::RateLimited { .. })));

    let metrics = client.metrics();
    assert_eq!(metrics.requests, 1);
    assert_eq!(metrics.rate_limit_rejections, 1);
}

/// Stored credentials are sent as headers on gated requests.
#[tokio::test]
async fn test_credentials_applied_as_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("x-api-key", "cg-secret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client();
    client
        .set_credentials("coingecko", Credentials::new().with_field("x-api-key", "cg-secret"))
        .unwrap_or_else(|err| panic!("failed to store credentials: {err}"));

    let options = RequestOptions::new().with_credentials("coingecko");
    let response = client.request(Method::GET, &server.uri(), &options).await;

    assert!(response.is_ok());
}

/// Requesting with an unknown credential provider fails validation
/// without touching the network.
#[tokio::test]
async fn test_unknown_credential_provider_is_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client();
    let options = RequestOptions::new().with_credentials("nobody");
    let result = client.request(Method::GET, &server.uri(), &options).await;

    assert!(matches!(result, Err(ServiceError::Validation { .. })));
}

/// Credential isolation survives the full client surface: mutating a
/// returned copy changes neither later reads nor another provider.
#[tokio::test]
async fn test_credential_isolation() {
    let client = test_client();
    client
        .set_credentials("p1", Credentials::new().with_field("x-api-key", "one"))
        .unwrap_or_else(|err| panic!("store p1: {err}"));
    client
        .set_credentials("p2", Credentials::new().with_field("x-api-key", "two"))
        .unwrap_or_else(|err| panic!("store p2: {err}"));

    if let Ok(mut stolen) = client.credentials("p1") {
        stolen.set("x-api-key", "tampered");
    }

    assert_eq!(
        client.credentials("p1").ok().and_then(|c| c.get("x-api-key").map(String::from)),
        Some("one".to_string())
    );
    assert_eq!(
        client.credentials("p2").ok().and_then(|c| c.get("x-api-key").map(String::from)),
        Some("two".to_string())
    );

    assert!(client.has_credentials("p1"));
    assert!(client.remove_credentials("p1"));
    assert!(!client.has_credentials("p1"));
    client.clear_credentials();
    assert!(!client.has_credentials("p2"));
}

/// GET decodes JSON bodies; POST round-trips a JSON body to the server.
#[tokio::test]
async fn test_json_get_and_post() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Price {
        symbol: String,
        usd: f64,
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/price"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "ETH", "usd": 3250.5
            })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "symbol": "SOL", "usd": 101.25
            })),
        )
        .mount(&server)
        .await;

    let client = test_client();

    let price: Result<Price, _> =
        client.get(&format!("{}/price", server.uri()), &RequestOptions::new()).await;
    assert_eq!(price.ok(), Some(Price { symbol: "ETH".into(), usd: 3250.5 }));

    let body = serde_json::json!({ "symbols": ["SOL"] });
    let price: Result<Price, _> =
        client.post(&format!("{}/query", server.uri()), &body, &RequestOptions::new()).await;
    assert_eq!(price.ok(), Some(Price { symbol: "SOL".into(), usd: 101.25 }));
}

/// A body that does not decode surfaces as a terminal transport error
/// carrying the response status.
#[tokio::test]
async fn test_decode_failure_is_terminal() {
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Price {
        usd: f64,
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = test_client();
    let result: Result<Price, _> = client.get(&server.uri(), &RequestOptions::new()).await;

    match result {
        Err(ServiceError::Transport(err)) => {
            assert_eq!(err.status, Some(200));
            assert!(err.message.contains("decode"));
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}

/// Connection failures are transient: the budget is spent before the
/// error propagates.
#[tokio::test]
async fn test_network_failure_is_retried() {
    // Bind and drop a listener so the port refuses connections.
    let listener = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap_or_else(|err| panic!("bind: {err}"));
    let addr = listener.local_addr().unwrap_or_else(|err| panic!("addr: {err}"));
    drop(listener);

    let client = test_client();
    let result = client
        .request(Method::GET, &format!("http://{addr}"), &RequestOptions::new())
        .await;

    match result {
        Err(ServiceError::Transport(err)) => {
            assert_eq!(err.status, None);
            assert!(ledgerlens_resilience::error::ErrorClassification::is_retryable(&err));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}
