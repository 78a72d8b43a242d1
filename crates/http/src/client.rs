//! Credentialed HTTP client with endpoint-keyed rate limiting and retry
//!
//! Specializes the resilience leaves for outbound HTTP: every request can
//! be gated by a sliding-window policy keyed on the caller's endpoint key,
//! and the send itself runs under the retry budget with failures
//! classified on the structured status code — 408/429/5xx and network
//! errors are transient, other 4xx (auth/validation class) are terminal
//! and never retried. After the budget is spent the last transport error
//! propagates unmodified; metrics update before any error leaves.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Response};
use tracing::{debug, instrument};

use ledgerlens_resilience::error::{ServiceError, ServiceResult, TransportError};
use ledgerlens_resilience::rate_limit::{RatePolicy, SlidingWindowLimiter};
use ledgerlens_resilience::retry::{ClassifiedRetry, RetryConfig, RetryRunner};
use ledgerlens_resilience::service::{MetricsSnapshot, ServiceMetrics};
use ledgerlens_resilience::time::{Clock, SystemClock};

use crate::credentials::{CredentialStore, Credentials};

/// Per-call request options merged over the client defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers for this call (override defaults on conflict).
    pub headers: Option<HeaderMap>,
    /// Per-call timeout overriding the client default.
    pub timeout: Option<Duration>,
    /// Rate-limit key gating this call; `None` skips the gate.
    pub rate_limit_key: Option<String>,
    /// Explicit policy for the key, instead of a registered one.
    pub rate_policy: Option<RatePolicy>,
    /// Apply this provider's stored credentials as request headers.
    pub credential_provider: Option<String>,
}

impl RequestOptions {
    /// Empty options: defaults only, no rate gate, no credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header for this call.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.get_or_insert_with(HeaderMap::new).insert(name, value);
        self
    }

    /// Set a per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Gate this call on a registered rate-limit key.
    pub fn rate_limited(mut self, key: impl Into<String>) -> Self {
        self.rate_limit_key = Some(key.into());
        self
    }

    /// Gate this call on a key with an explicit policy.
    pub fn rate_limited_with(mut self, key: impl Into<String>, policy: RatePolicy) -> Self {
        self.rate_limit_key = Some(key.into());
        self.rate_policy = Some(policy);
        self
    }

    /// Send the named provider's stored credentials with this call.
    pub fn with_credentials(mut self, provider: impl Into<String>) -> Self {
        self.credential_provider = Some(provider.into());
        self
    }
}

/// HTTP client with per-provider credential storage, endpoint-keyed rate
/// limiting, and classified retry.
pub struct CredentialedHttpClient<C: Clock = SystemClock> {
    client: ReqwestClient,
    credentials: CredentialStore,
    limiter: SlidingWindowLimiter<C>,
    retry: RetryRunner,
    metrics: ServiceMetrics,
}

impl CredentialedHttpClient<SystemClock> {
    /// Start building a client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> ServiceResult<Self> {
        Self::builder().build()
    }
}

impl<C: Clock> CredentialedHttpClient<C> {
    /// Store credentials for a provider.
    pub fn set_credentials(&self, provider: &str, credentials: Credentials) -> ServiceResult<()> {
        self.credentials.set(provider, credentials)
    }

    /// Get a copy of a provider's credentials; unknown providers are an
    /// error.
    pub fn credentials(&self, provider: &str) -> ServiceResult<Credentials> {
        self.credentials.get(provider)
    }

    /// Whether credentials are stored for a provider.
    pub fn has_credentials(&self, provider: &str) -> bool {
        self.credentials.has(provider)
    }

    /// Remove a provider's credentials, reporting whether any existed.
    pub fn remove_credentials(&self, provider: &str) -> bool {
        self.credentials.remove(provider)
    }

    /// Drop all stored credentials.
    pub fn clear_credentials(&self) {
        self.credentials.clear();
    }

    /// Register or replace a rate-limit policy for an endpoint key.
    pub fn set_rate_policy(&self, key: impl Into<String>, policy: RatePolicy) {
        self.limiter.set_policy(key, policy);
    }

    /// Snapshot the client's aggregate counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Zero the client's aggregate counters.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Execute a request under the rate gate and retry budget.
    ///
    /// Returns the response for any 2xx status. Non-success statuses and
    /// network failures surface as [`ServiceError::Transport`]; a rate
    /// denial surfaces as [`ServiceError::RateLimited`] before any
    /// transport attempt.
    #[instrument(skip(self, options), fields(%method, url))]
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> ServiceResult<Response> {
        self.execute(method, url, None, options).await
    }

    /// GET a JSON resource and decode it.
    pub async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> ServiceResult<T> {
        let response = self.execute(Method::GET, url, None, options).await?;
        Self::decode(response).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        options: &RequestOptions,
    ) -> ServiceResult<T> {
        let body = serde_json::to_value(body).map_err(|err| {
            ServiceError::validation("body", format!("failed to serialize request body: {err}"))
        })?;
        let response = self.execute(Method::POST, url, Some(body), options).await?;
        Self::decode(response).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
        options: &RequestOptions,
    ) -> ServiceResult<Response> {
        if let Some(key) = &options.rate_limit_key {
            let allowed = match &options.rate_policy {
                Some(policy) => self.limiter.try_acquire_with(key, policy),
                None => self.limiter.try_acquire(key),
            };
            if !allowed {
                self.metrics.record_rate_limited();
                let retry_after = options
                    .rate_policy
                    .or_else(|| self.limiter.policy(key))
                    .map(|policy| policy.window);
                return Err(ServiceError::rate_limited(key, retry_after));
            }
        }

        // Resolved once: a missing provider is a validation failure and
        // must not consume retry budget.
        let credential_headers = match &options.credential_provider {
            Some(provider) => Some(credential_headers(&self.credentials.get(provider)?)?),
            None => None,
        };

        let (result, report) = self
            .retry
            .run_with_report(&ClassifiedRetry, || {
                self.send_once(method.clone(), url, body.as_ref(), options, credential_headers.as_ref())
            })
            .await;

        match &result {
            Ok(_) => self.metrics.record_success(report.last_attempt_elapsed),
            Err(_) => self.metrics.record_failure(),
        }
        result.map_err(ServiceError::from)
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        options: &RequestOptions,
        credential_headers: Option<&HeaderMap>,
    ) -> Result<Response, TransportError> {
        let mut request = self.client.request(method.clone(), url);
        if let Some(headers) = credential_headers {
            request = request.headers(headers.clone());
        }
        if let Some(headers) = &options.headers {
            request = request.headers(headers.clone());
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, url, "sending HTTP request");
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        debug!(%method, url, %status, "received HTTP response");
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            body.chars().take(256).collect()
        };

        if is_retryable_status(code) {
            Err(TransportError::transient_status(code, message))
        } else {
            Err(TransportError::terminal(code, message))
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> ServiceResult<T> {
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|err| {
            ServiceError::from(TransportError::terminal(
                status,
                format!("failed to decode response body: {err}"),
            ))
        })
    }
}

/// Statuses worth retrying: request timeout, throttling, and 5xx-class.
fn is_retryable_status(code: u16) -> bool {
    code == 408 || code == 429 || (500..=599).contains(&code)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        TransportError::transient(err.to_string())
    } else {
        TransportError::terminal_message(err.to_string())
    }
}

/// Credentials are applied as headers: each field name is the header to
/// send its value under.
fn credential_headers(credentials: &Credentials) -> ServiceResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in credentials.iter() {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            ServiceError::validation("credentials", format!("invalid header name '{name}': {err}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            ServiceError::validation("credentials", format!("invalid value for '{name}': {err}"))
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Builder for [`CredentialedHttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: HeaderMap,
    retry: RetryConfig,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            default_headers: HeaderMap::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl HttpClientBuilder {
    /// Set the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set headers sent with every request.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    /// Set the retry budget for sends.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Build the client with the system clock.
    pub fn build(self) -> ServiceResult<CredentialedHttpClient<SystemClock>> {
        self.build_with_clock(SystemClock)
    }

    /// Build the client with a custom clock for its rate limiter.
    pub fn build_with_clock<C: Clock>(self, clock: C) -> ServiceResult<CredentialedHttpClient<C>> {
        self.retry.validate().map_err(|err| {
            ServiceError::validation("retry", err.to_string())
        })?;

        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).default_headers(self.default_headers);
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| {
            ServiceError::validation("http_client", format!("failed to build HTTP client: {err}"))
        })?;

        Ok(CredentialedHttpClient {
            client,
            credentials: CredentialStore::new(),
            limiter: SlidingWindowLimiter::with_clock(clock),
            retry: RetryRunner::new(self.retry),
            metrics: ServiceMetrics::new(),
        })
    }
}
