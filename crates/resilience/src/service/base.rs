//! Composed resilience base for provider services
//!
//! A [`ResilientService`] gives every concrete provider service (price
//! oracle, lending API, RPC gateway) uniform access to the cache, rate
//! limiter, and retry runner, plus aggregate metrics — without each service
//! reimplementing the plumbing. Concrete services embed one and call
//! through it:
//!
//! ```
//! use ledgerlens_resilience::service::{ResilientService, ServiceConfig};
//!
//! struct PriceService {
//!     core: ResilientService<serde_json::Value>,
//! }
//!
//! let service = PriceService {
//!     core: ResilientService::new(ServiceConfig::named("prices")),
//! };
//! assert_eq!(service.core.name(), "prices");
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::metrics::{MetricsSnapshot, ServiceMetrics};
use crate::cache::{
    spawn_janitor, CacheConfig, CacheStats, EstimateSize, EvictionCache, JanitorHandle,
};
use crate::error::{ErrorClassification, ErrorSeverity, ServiceError, ServiceResult, TransportError};
use crate::rate_limit::{RatePolicy, SlidingWindowLimiter};
use crate::retry::{ClassifiedRetry, RetryConfig, RetryRunner};
use crate::time::{Clock, SystemClock};

/// Configuration for a provider service's resilience plumbing.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service name used in logs.
    pub name: String,
    /// Cache shape and ceilings.
    pub cache: CacheConfig,
    /// Retry budget for outbound operations.
    pub retry: RetryConfig,
    /// Rate-limit policies registered at construction, keyed by endpoint.
    pub rate_limits: Vec<(String, RatePolicy)>,
    /// Deduplicate concurrent misses on one cache key through a shared
    /// in-flight fetch. Off means duplicate fetching is tolerated.
    pub single_flight: bool,
}

impl ServiceConfig {
    /// Default configuration under the given service name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            rate_limits: Vec::new(),
            single_flight: true,
        }
    }

    /// Replace the cache configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Register a rate-limit policy for an endpoint key.
    pub fn with_rate_limit(mut self, key: impl Into<String>, policy: RatePolicy) -> Self {
        self.rate_limits.push((key.into(), policy));
        self
    }

    /// Enable or disable single-flight deduplication.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }
}

/// Shared resilience core embedded by concrete provider services.
///
/// Composes an owned [`EvictionCache`], a [`SlidingWindowLimiter`], a
/// [`RetryRunner`], and a [`ServiceMetrics`] set. Metrics are observation
/// only: removing them would change no returned value.
pub struct ResilientService<V, C = SystemClock>
where
    V: Clone + EstimateSize,
    C: Clock,
{
    name: String,
    cache: Arc<EvictionCache<String, V, C>>,
    limiter: SlidingWindowLimiter<C>,
    retry: RetryRunner,
    metrics: ServiceMetrics,
    janitor: Mutex<Option<JanitorHandle>>,
    in_flight: Mutex<HashMap<String, broadcast::Sender<ServiceResult<V>>>>,
    single_flight: bool,
    cleanup_interval: Duration,
}

impl<V> ResilientService<V, SystemClock>
where
    V: Clone + EstimateSize + Send + Sync + 'static,
{
    /// Create a service core with the system clock.
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<V, C> ResilientService<V, C>
where
    V: Clone + EstimateSize + Send + Sync + 'static,
    C: Clock + Clone,
{
    /// Create a service core with a custom clock (useful for testing).
    pub fn with_clock(config: ServiceConfig, clock: C) -> Self {
        let limiter = SlidingWindowLimiter::with_clock(clock.clone());
        for (key, policy) in &config.rate_limits {
            limiter.set_policy(key.clone(), *policy);
        }

        Self {
            name: config.name,
            cleanup_interval: config.cache.cleanup_interval,
            cache: Arc::new(EvictionCache::with_clock(config.cache, clock)),
            limiter,
            retry: RetryRunner::new(config.retry),
            metrics: ServiceMetrics::new(),
            janitor: Mutex::new(None),
            in_flight: Mutex::new(HashMap::new()),
            single_flight: config.single_flight,
        }
    }

    /// The service name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a cached value, recording a hit or miss.
    pub fn cached(&self, key: &str) -> Option<V> {
        let value = self.cache.get(&key.to_string());
        match value {
            Some(_) => self.metrics.record_cache_hit(),
            None => self.metrics.record_cache_miss(),
        }
        value
    }

    /// Cache a value under the configured default TTL.
    pub fn set_cached(&self, key: impl Into<String>, value: V) {
        self.cache.insert(key.into(), value);
    }

    /// Cache a value with an explicit TTL.
    pub fn set_cached_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.cache.insert_with_ttl(key.into(), value, Some(ttl));
    }

    /// Drop every cached value.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Statistics from the owned cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Register or replace a rate-limit policy for an endpoint key.
    pub fn set_rate_policy(&self, key: impl Into<String>, policy: RatePolicy) {
        self.limiter.set_policy(key, policy);
    }

    /// Consume one unit of rate budget for `key`.
    ///
    /// A denial records the rate-limit metric and returns
    /// [`ServiceError::RateLimited`]; unconfigured keys always pass. What to
    /// do with the denial (fail hard or fall back) stays with the caller.
    pub fn check_rate_limit(&self, key: &str) -> ServiceResult<()> {
        if self.limiter.try_acquire(key) {
            Ok(())
        } else {
            self.metrics.record_rate_limited();
            let retry_after = self.limiter.policy(key).map(|policy| policy.window);
            Err(ServiceError::rate_limited(key, retry_after))
        }
    }

    /// Execute `operation` under the retry budget, classifying failures by
    /// their [`ErrorClassification`].
    ///
    /// Metrics are attributed to the outcome-determining attempt: success
    /// records the request with that attempt's latency; exhaustion records
    /// a failed request. Either way the result passes through unchanged.
    pub async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let (result, report) = self.retry.run_with_report(&ClassifiedRetry, operation).await;
        match &result {
            Ok(_) => self.metrics.record_success(report.last_attempt_elapsed),
            Err(_) => self.metrics.record_failure(),
        }
        result
    }

    /// Serve `key` from cache, or fetch it with retries and cache the
    /// result under `ttl` (`None` = the cache's default TTL).
    ///
    /// With single-flight enabled, concurrent missers on the same key await
    /// one shared fetch; with it disabled each misser fetches
    /// independently, which this layer tolerates for staleness-friendly
    /// data.
    pub async fn fetch_with_cache<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        operation: F,
    ) -> ServiceResult<V>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<V>>,
    {
        if let Some(value) = self.cached(key) {
            return Ok(value);
        }

        if !self.single_flight {
            let value = self.execute_with_retry(operation).await?;
            self.store(key, value.clone(), ttl);
            return Ok(value);
        }

        enum Role<V> {
            Leader,
            Follower(broadcast::Receiver<ServiceResult<V>>),
        }

        let role = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(sender) => Role::Follower(sender.subscribe()),
                None => {
                    let (sender, _receiver) = broadcast::channel(1);
                    in_flight.insert(key.to_string(), sender);
                    Role::Leader
                }
            }
        };

        match role {
            Role::Follower(mut receiver) => {
                debug!(service = %self.name, key, "awaiting in-flight fetch");
                match receiver.recv().await {
                    Ok(shared) => shared,
                    // The leader was dropped before publishing a result.
                    Err(_) => Err(ServiceError::from(TransportError::transient(
                        "in-flight fetch abandoned",
                    ))),
                }
            }
            Role::Leader => {
                let result = self.execute_with_retry(operation).await;
                if let Ok(value) = &result {
                    self.store(key, value.clone(), ttl);
                }
                // Remove and publish under the lock: every follower that
                // found the entry has already subscribed.
                let sender = self.in_flight.lock().remove(key);
                if let Some(sender) = sender {
                    let _ = sender.send(result.clone());
                }
                result
            }
        }
    }

    /// Record and log an error, returning it unchanged for the caller to
    /// propagate.
    ///
    /// Severity picks the log level only; expected/domain failures are not
    /// swallowed or rewritten.
    pub fn handle_error(&self, error: ServiceError, operation: &str) -> ServiceError {
        self.metrics.record_error();
        match error.severity() {
            ErrorSeverity::Info => {
                debug!(service = %self.name, operation, %error, "operation failed");
            }
            ErrorSeverity::Warning => {
                warn!(service = %self.name, operation, %error, "operation failed");
            }
            ErrorSeverity::Error | ErrorSeverity::Critical => {
                error!(service = %self.name, operation, %error, "operation failed");
            }
        }
        error
    }

    /// Snapshot the aggregate counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Zero the aggregate counters.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Start the periodic cache cleanup sweep. Idempotent.
    ///
    /// Must be called within a tokio runtime.
    pub fn start_cleanup(&self) {
        let mut janitor = self.janitor.lock();
        if janitor.is_none() {
            *janitor = Some(spawn_janitor(Arc::clone(&self.cache), self.cleanup_interval));
        }
    }

    /// Stop the cleanup sweep and clear all state: cache entries, rate
    /// windows, and in-flight fetches.
    pub fn shutdown(&self) {
        if let Some(janitor) = self.janitor.lock().take() {
            janitor.shutdown();
        }
        self.cache.clear();
        self.limiter.clear();
        self.in_flight.lock().clear();
    }

    fn store(&self, key: &str, value: V, ttl: Option<Duration>) {
        match ttl {
            Some(ttl) => self.cache.insert_with_ttl(key.to_string(), value, Some(ttl)),
            None => self.cache.insert(key.to_string(), value),
        }
    }
}
