//! Integration tests for the rate limiter, retry runner, and service base
//!
//! Exercises the composed resilience flow a provider service sees: rate
//! gate, cached reads, retried fetches, and aggregate metrics.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ledgerlens_resilience::error::{ServiceError, ServiceResult, TransportError};
use ledgerlens_resilience::rate_limit::{RatePolicy, SlidingWindowLimiter};
use ledgerlens_resilience::retry::{AlwaysRetry, Jitter, RetryConfig, RetryRunner};
use ledgerlens_resilience::service::{ResilientService, ServiceConfig};
use ledgerlens_resilience::time::MockClock;

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(1),
        backoff: false,
        max_delay: Duration::from_secs(1),
        jitter: Jitter::None,
    }
}

/// Validates the sliding-window scenario: window 1000ms, limit 2 — checks
/// with records at t=0 and t=10 succeed, t=20 is denied, t=1010 succeeds.
///
/// # Test Steps
/// 1. Register a 2-per-second policy
/// 2. Acquire twice inside the window
/// 3. Verify the third acquisition inside the window is denied
/// 4. Advance past the first timestamp's window and verify recovery
#[test]
fn test_sliding_window_scenario() {
    let clock = MockClock::new();
    let limiter = SlidingWindowLimiter::with_clock(clock.clone());
    limiter.set_policy("oracle", RatePolicy::new(2, Duration::from_millis(1000)));

    assert!(limiter.try_acquire("oracle")); // t=0
    clock.advance_millis(10);
    assert!(limiter.try_acquire("oracle")); // t=10
    clock.advance_millis(10);
    assert!(!limiter.try_acquire("oracle")); // t=20, denied
    clock.advance_millis(990);
    assert!(limiter.try_acquire("oracle")); // t=1010, first slot aged out
}

/// Verifies the retry budget shape against a counting operation.
///
/// # Test Steps
/// 1. Run an operation failing twice before succeeding under attempts=3
/// 2. Verify the success value and exactly 3 invocations
/// 3. Run an always-failing operation and verify the last error re-raises
#[tokio::test(flavor = "multi_thread")]
async fn test_retry_budget_end_to_end() {
    let runner = RetryRunner::new(fast_retry(3));

    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);
    let result = runner
        .run(&AlwaysRetry, || {
            let calls = Arc::clone(&calls_clone);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient")
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;
    assert_eq!(result, Ok("recovered"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);
    let failed: Result<(), String> = runner
        .run(&AlwaysRetry, || {
            let calls = Arc::clone(&calls_clone);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("attempt {n} failed"))
            }
        })
        .await;
    assert_eq!(failed, Err("attempt 3 failed".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// Simulates a provider service flow: rate gate, then cached fetch, with
/// metrics reflecting each stage.
///
/// # Test Steps
/// 1. Build a service with a 3-per-minute endpoint policy
/// 2. Fetch the same key twice; the second call is a cache hit
/// 3. Exhaust the rate budget and verify the `RateLimited` denial
/// 4. Verify the metrics snapshot matches the observed traffic
#[tokio::test(flavor = "multi_thread")]
async fn test_service_flow_with_metrics() {
    let config = ServiceConfig::named("lending")
        .with_retry(fast_retry(3))
        .with_rate_limit("markets", RatePolicy::new(3, Duration::from_secs(60)));
    let service: ResilientService<String> = ResilientService::new(config);

    let fetches = Arc::new(AtomicU32::new(0));

    for _ in 0..2 {
        assert!(service.check_rate_limit("markets").is_ok());
        let fetches = Arc::clone(&fetches);
        let result = service
            .fetch_with_cache("markets:all", Some(Duration::from_secs(60)), move || {
                let fetches = Arc::clone(&fetches);
                async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok("market-data".to_string())
                }
            })
            .await;
        assert_eq!(result, Ok("market-data".to_string()));
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);

    // Third acquisition exhausts the budget; the fourth is denied.
    assert!(service.check_rate_limit("markets").is_ok());
    let denied = service.check_rate_limit("markets");
    assert!(matches!(denied, Err(ServiceError::RateLimited { .. })));

    let metrics = service.metrics();
    assert_eq!(metrics.requests, 1); // one underlying fetch
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(metrics.cache_misses, 1);
    assert_eq!(metrics.rate_limit_rejections, 1);
    assert_eq!(metrics.errors, 0);
}

/// Verifies a terminal remote rejection surfaces after exactly one attempt
/// while a transient one consumes the whole budget.
#[tokio::test(flavor = "multi_thread")]
async fn test_service_error_classification() {
    let service: ResilientService<String> =
        ResilientService::new(ServiceConfig::named("rpc").with_retry(fast_retry(4)));

    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);
    let terminal: ServiceResult<String> = service
        .execute_with_retry(|| {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::from(TransportError::terminal(401, "bad api key")))
            }
        })
        .await;
    assert!(terminal.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);
    let transient: ServiceResult<String> = service
        .execute_with_retry(|| {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::from(TransportError::transient_status(503, "overloaded")))
            }
        })
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    // The last transient error re-raises verbatim.
    match transient {
        Err(ServiceError::Transport(err)) => {
            assert_eq!(err.status, Some(503));
            assert_eq!(err.message, "overloaded");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

/// Verifies metrics never influence returned values: the same sequence of
/// operations yields identical results with metrics reset mid-stream.
#[tokio::test(flavor = "multi_thread")]
async fn test_metrics_are_observation_only() {
    let service: ResilientService<String> =
        ResilientService::new(ServiceConfig::named("prices").with_retry(fast_retry(2)));

    service.set_cached("eth", "3250".to_string());

    let first = service.cached("eth");
    service.reset_metrics();
    let second = service.cached("eth");
    assert_eq!(first, second);

    let denied_before = service.check_rate_limit("unlimited-key").is_ok();
    service.reset_metrics();
    let denied_after = service.check_rate_limit("unlimited-key").is_ok();
    assert_eq!(denied_before, denied_after);
}

/// Verifies shutdown clears cache, windows, and stops the janitor, while
/// two services coexist independently.
#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_and_isolation() {
    let a: ResilientService<String> = ResilientService::new(ServiceConfig::named("a"));
    let b: ResilientService<String> = ResilientService::new(ServiceConfig::named("b"));
    a.start_cleanup();
    b.start_cleanup();

    a.set_cached("k", "va".to_string());
    b.set_cached("k", "vb".to_string());

    a.shutdown();

    assert_eq!(a.cache_stats().size, 0);
    assert_eq!(b.cached("k"), Some("vb".to_string()));
    b.shutdown();
}
