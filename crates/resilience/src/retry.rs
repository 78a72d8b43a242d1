//! Bounded-attempt retry with exponential backoff
//!
//! The runner distinguishes retryable from terminal failures through a
//! [`RetryPolicy`]; a terminal classification short-circuits the remaining
//! budget. On exhaustion the **last error is returned verbatim** — never
//! wrapped or swallowed — so a caller sees the identical error shape
//! whether one or N attempts occurred.
//!
//! Each invocation is independent; no state is shared across calls beyond
//! what the operation itself touches. Suspension happens only in the
//! inter-attempt delay; an in-flight attempt always runs to completion (or
//! to its own transport timeout).

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::error::{ConfigError, ErrorClassification};

/// Decision for whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the configured backoff delay.
    Retry,
    /// Retry after a custom delay.
    RetryAfter(Duration),
    /// Don't retry; the failure is terminal.
    Stop,
}

/// Trait for classifying whether an error should be retried.
pub trait RetryPolicy<E> {
    /// Classify the error observed on `attempt` (1-based).
    fn classify(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Always retry, up to the attempt budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E> RetryPolicy<E> for AlwaysRetry {
    fn classify(&self, _error: &E, _attempt: u32) -> RetryDecision {
        RetryDecision::Retry
    }
}

/// Never retry; every failure is terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl<E> RetryPolicy<E> for NeverRetry {
    fn classify(&self, _error: &E, _attempt: u32) -> RetryDecision {
        RetryDecision::Stop
    }
}

/// Retry based on the error's own [`ErrorClassification`].
///
/// Structurally non-transient failures (auth/validation class) stop
/// immediately, bypassing the remaining budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifiedRetry;

impl<E: ErrorClassification> RetryPolicy<E> for ClassifiedRetry {
    fn classify(&self, error: &E, _attempt: u32) -> RetryDecision {
        if error.is_retryable() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Predicate-based retry policy.
#[derive(Debug)]
pub struct PredicateRetry<F> {
    predicate: F,
}

impl<F> PredicateRetry<F> {
    /// Retry while `predicate(error, attempt)` holds.
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F, E> RetryPolicy<E> for PredicateRetry<F>
where
    F: Fn(&E, u32) -> bool,
{
    fn classify(&self, error: &E, attempt: u32) -> RetryDecision {
        if (self.predicate)(error, attempt) {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Jitter applied to backoff delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// No jitter; delays are deterministic.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Uniform in `[delay/2, delay]`.
    Equal,
}

impl Jitter {
    fn apply(&self, delay: Duration) -> Duration {
        if delay.is_zero() {
            return delay;
        }
        match self {
            Jitter::None => delay,
            Jitter::Full => delay.mul_f64(rand::thread_rng().gen_range(0.0..=1.0)),
            Jitter::Equal => delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0)),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempt budget (initial try + retries).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Double the delay after each failed attempt; flat `base_delay`
    /// otherwise.
    pub backoff: bool,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
    /// Randomization applied to each delay.
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            backoff: true,
            max_delay: Duration::from_secs(30),
            jitter: Jitter::None,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Delay before the retry that follows `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = if self.backoff {
            let shift = attempt.saturating_sub(1).min(16);
            self.base_delay.saturating_mul(1u32 << shift)
        } else {
            self.base_delay
        };
        delay.min(self.max_delay)
    }
}

/// Builder for [`RetryConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    /// Set the total attempt budget.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    /// Enable or disable exponential backoff.
    pub fn backoff(mut self, enabled: bool) -> Self {
        self.config.backoff = enabled;
        self
    }

    /// Set the ceiling for any single delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    /// Set the jitter mode.
    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    /// Build the configuration, validating it.
    pub fn build(self) -> Result<RetryConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Summary of one retry execution, for metric attribution.
#[derive(Debug, Clone, Copy)]
pub struct RetryReport {
    /// Attempts actually made (1-based count).
    pub attempts: u32,
    /// Wall time of the outcome-determining attempt.
    pub last_attempt_elapsed: Duration,
    /// Accumulated inter-attempt delay.
    pub total_delay: Duration,
}

/// Executes operations under a bounded-attempt retry budget.
#[derive(Debug, Clone, Default)]
pub struct RetryRunner {
    config: RetryConfig,
}

impl RetryRunner {
    /// Create a runner with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The configuration this runner was built with.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` under the retry budget, returning its success value
    /// or the last error verbatim.
    #[instrument(skip(self, policy, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn run<F, Fut, T, E, P>(&self, policy: &P, operation: F) -> Result<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with_report(policy, operation).await.0
    }

    /// Run `operation`, also returning attempt statistics.
    pub async fn run_with_report<F, Fut, T, E, P>(
        &self,
        policy: &P,
        mut operation: F,
    ) -> (Result<T, E>, RetryReport)
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut total_delay = Duration::ZERO;
        let mut attempt = 1u32;

        loop {
            debug!(attempt, max_attempts, "executing operation");
            let attempt_start = Instant::now();

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retries");
                    }
                    let report = RetryReport {
                        attempts: attempt,
                        last_attempt_elapsed: attempt_start.elapsed(),
                        total_delay,
                    };
                    return (Ok(value), report);
                }
                Err(error) => {
                    let report = RetryReport {
                        attempts: attempt,
                        last_attempt_elapsed: attempt_start.elapsed(),
                        total_delay,
                    };

                    if attempt >= max_attempts {
                        warn!(attempt, error = ?error, "retry budget exhausted");
                        return (Err(error), report);
                    }

                    let delay = match policy.classify(&error, attempt) {
                        RetryDecision::Stop => {
                            debug!(attempt, error = ?error, "failure classified as terminal");
                            return (Err(error), report);
                        }
                        RetryDecision::Retry => {
                            self.config.jitter.apply(self.config.delay_for(attempt))
                        }
                        RetryDecision::RetryAfter(custom) => custom,
                    };

                    warn!(attempt, ?delay, error = ?error, "operation failed, retrying");
                    tokio::time::sleep(delay).await;
                    total_delay += delay;
                    attempt += 1;
                }
            }
        }
    }
}
