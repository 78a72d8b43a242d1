//! Aggregate metrics owned by each provider service instance
//!
//! Counters are monotonic and atomic, reset only on explicit request.
//! Metrics are pure observation: nothing in this module may influence a
//! value returned to a caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Lock-free counters for one service instance.
#[derive(Debug, Default)]
pub struct ServiceMetrics {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    errors: AtomicU64,
    rate_limit_rejections: AtomicU64,
    total_response_time_ms: AtomicU64,
    latency_samples: AtomicU64,
}

impl ServiceMetrics {
    /// Create a zeroed metrics set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request that completed successfully, with the latency of
    /// its outcome-determining attempt.
    pub fn record_success(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_ms.fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that failed after its budget was spent.
    pub fn record_failure(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an error observed outside the request path.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache hit.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss.
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rate-limit denial.
    pub fn record_rate_limited(&self) {
        self.rate_limit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_ms = self.total_response_time_ms.load(Ordering::Relaxed);
        let samples = self.latency_samples.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            errors: self.errors.load(Ordering::Relaxed),
            rate_limit_rejections: self.rate_limit_rejections.load(Ordering::Relaxed),
            total_response_time_ms: total_ms,
            average_response_time_ms: if samples == 0 { 0.0 } else { total_ms as f64 / samples as f64 },
            cache_hit_rate: if hits + misses == 0 { 0.0 } else { hits as f64 / (hits + misses) as f64 },
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.rate_limit_rejections.store(0, Ordering::Relaxed);
        self.total_response_time_ms.store(0, Ordering::Relaxed);
        self.latency_samples.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of a service's counters, exposed to observability.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Requests executed (successful or exhausted).
    pub requests: u64,
    /// Cache hits observed through the service.
    pub cache_hits: u64,
    /// Cache misses observed through the service.
    pub cache_misses: u64,
    /// Errors recorded (exhausted requests plus handled errors).
    pub errors: u64,
    /// Denials issued by the rate limiter.
    pub rate_limit_rejections: u64,
    /// Accumulated latency of successful requests.
    pub total_response_time_ms: u64,
    /// Mean latency of successful requests.
    pub average_response_time_ms: f64,
    /// Hits over total cache accesses.
    pub cache_hit_rate: f64,
}

#[cfg(test)]
mod tests {
    //! Unit tests for service metrics.
    use super::*;

    #[test]
    fn test_success_accumulates_latency() {
        let metrics = ServiceMetrics::new();
        metrics.record_success(Duration::from_millis(100));
        metrics.record_success(Duration::from_millis(300));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.total_response_time_ms, 400);
        assert!((snapshot.average_response_time_ms - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failure_counts_request_and_error() {
        let metrics = ServiceMetrics::new();
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.average_response_time_ms, 0.0);
    }

    /// Validates `ServiceMetrics::snapshot` behavior for the hit rate
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `cache_hit_rate` equals hits over total accesses.
    #[test]
    fn test_cache_hit_rate() {
        let metrics = ServiceMetrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        assert!((metrics.snapshot().cache_hit_rate - 0.75).abs() < 1e-10);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let metrics = ServiceMetrics::new();
        metrics.record_success(Duration::from_millis(50));
        metrics.record_failure();
        metrics.record_cache_hit();
        metrics.record_rate_limited();

        metrics.reset();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 0);
        assert_eq!(snapshot.errors, 0);
        assert_eq!(snapshot.cache_hits, 0);
        assert_eq!(snapshot.rate_limit_rejections, 0);
        assert_eq!(snapshot.average_response_time_ms, 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = ServiceMetrics::new();
        metrics.record_success(Duration::from_millis(10));

        let json = serde_json::to_value(metrics.snapshot()).unwrap_or_default();
        assert_eq!(json["requests"], 1);
    }
}
