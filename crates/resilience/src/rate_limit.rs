//! Per-key sliding-window rate limiting
//!
//! Each key holds the timestamps of its recent requests; a request is
//! allowed while fewer than `max_requests` timestamps fall inside the
//! trailing window. Old timestamps are purged lazily on each check.
//!
//! A key with no configured policy is always allowed — heterogeneous
//! per-endpoint limits work without special-casing callers. The limiter
//! never returns an error; what to do on denial (hard failure vs fallback)
//! is the caller's decision.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::time::{Clock, SystemClock};

/// Request budget for one key: at most `max_requests` per trailing
/// `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    /// Maximum requests allowed inside the window.
    pub max_requests: u32,
    /// Length of the trailing window.
    pub window: Duration,
}

impl RatePolicy {
    /// Create a policy of `max_requests` per `window`.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window }
    }

    /// Convenience for per-minute budgets.
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

/// Sliding-window request counter keyed by arbitrary strings.
///
/// Keys are typically provider endpoints (`"coingecko:simple-price"`).
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    policies: RwLock<HashMap<String, RatePolicy>>,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    clock: C,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Create a limiter with the system clock and no policies.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for SlidingWindowLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    /// Create a limiter with a custom clock (useful for testing).
    pub fn with_clock(clock: C) -> Self {
        Self { policies: RwLock::new(HashMap::new()), windows: Mutex::new(HashMap::new()), clock }
    }

    /// Register or replace the policy for a key.
    pub fn set_policy(&self, key: impl Into<String>, policy: RatePolicy) {
        self.policies.write().insert(key.into(), policy);
    }

    /// Remove a key's policy, returning it if one was registered.
    ///
    /// The key becomes unlimited again; its window history is dropped.
    pub fn remove_policy(&self, key: &str) -> Option<RatePolicy> {
        self.windows.lock().remove(key);
        self.policies.write().remove(key)
    }

    /// The registered policy for a key, if any.
    pub fn policy(&self, key: &str) -> Option<RatePolicy> {
        self.policies.read().get(key).copied()
    }

    /// Probe whether a request for `key` would currently be allowed.
    ///
    /// Does not consume budget. An unconfigured key is always allowed.
    pub fn check(&self, key: &str) -> bool {
        match self.policy(key) {
            Some(policy) => self.check_with(key, &policy),
            None => true,
        }
    }

    /// Probe against an explicit policy instead of a registered one.
    pub fn check_with(&self, key: &str, policy: &RatePolicy) -> bool {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let timestamps = windows.entry(key.to_string()).or_default();
        Self::purge(timestamps, now, policy.window);

        let allowed = (timestamps.len() as u32) < policy.max_requests;
        if !allowed {
            debug!(key, in_window = timestamps.len(), limit = policy.max_requests, "rate limit hit");
        }
        allowed
    }

    /// Record a request for `key` at the current instant.
    ///
    /// A no-op for keys without a registered policy, so unlimited keys do
    /// not accumulate unbounded history.
    pub fn record(&self, key: &str) {
        if let Some(policy) = self.policy(key) {
            self.record_with(key, &policy);
        }
    }

    fn record_with(&self, key: &str, policy: &RatePolicy) {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let timestamps = windows.entry(key.to_string()).or_default();
        Self::purge(timestamps, now, policy.window);
        timestamps.push_back(now);
    }

    /// Combined check-and-record: consume one unit of budget if allowed.
    pub fn try_acquire(&self, key: &str) -> bool {
        match self.policy(key) {
            Some(policy) => self.try_acquire_with(key, &policy),
            None => true,
        }
    }

    /// Combined check-and-record against an explicit policy.
    pub fn try_acquire_with(&self, key: &str, policy: &RatePolicy) -> bool {
        let now = self.clock.now();
        let mut windows = self.windows.lock();
        let timestamps = windows.entry(key.to_string()).or_default();
        Self::purge(timestamps, now, policy.window);

        if (timestamps.len() as u32) >= policy.max_requests {
            debug!(key, in_window = timestamps.len(), limit = policy.max_requests, "rate limit hit");
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// Forget the request history for one key.
    pub fn reset(&self, key: &str) {
        self.windows.lock().remove(key);
    }

    /// Forget all request history (policies are kept).
    pub fn clear(&self) {
        self.windows.lock().clear();
    }

    /// Drop timestamps that fell out of the trailing window.
    fn purge(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        let window_start = now.checked_sub(window);
        while let Some(front) = timestamps.front() {
            let aged_out = match window_start {
                Some(start) => *front < start,
                // The window reaches past the clock's epoch; nothing can
                // have aged out yet.
                None => false,
            };
            if aged_out {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}
