//! Unified error taxonomy for the resilience layer
//!
//! Every failure a provider service can observe through this layer falls
//! into one of three kinds: a validation failure (caller error, never
//! retried), a rate-limit denial (raised before any transport attempt so
//! callers can choose a fallback), or a transport failure carrying a
//! structured transient/terminal classification from the HTTP layer.
//!
//! Retry exhaustion re-raises the last transport error verbatim — the error
//! shape is identical whether one or N attempts occurred, and this layer
//! never substitutes fallback data for a failure.
//!
//! Classification happens on the structured [`TransportKind`] and status
//! fields, never by matching message strings.

use std::time::Duration;

use thiserror::Error;

/// Severity levels used to pick a log level for an error.
///
/// Severity influences observability only; it never changes control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, expected conditions.
    Info,
    /// Degraded but operational (rate limiting, transient failures).
    Warning,
    /// Failure requiring attention.
    Error,
    /// System integrity at risk.
    Critical,
}

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Can the failed operation be retried?
    fn is_retryable(&self) -> bool;

    /// How serious is this error?
    fn severity(&self) -> ErrorSeverity;
}

/// Whether a transport failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Network-level or 5xx-class failure; retried within budget.
    Transient,
    /// Auth/validation-class remote rejection; never retried.
    Terminal,
}

/// Structured failure from the transport layer.
///
/// Carries the remote status code when one was received so retry policies
/// classify on data rather than on message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failure{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
pub struct TransportError {
    /// Transient/terminal classification.
    pub kind: TransportKind,
    /// HTTP status code, if a response was received.
    pub status: Option<u16>,
    /// Human-readable description.
    pub message: String,
}

impl TransportError {
    /// A retryable failure without a status code (connect error, timeout).
    pub fn transient(message: impl Into<String>) -> Self {
        Self { kind: TransportKind::Transient, status: None, message: message.into() }
    }

    /// A retryable failure carrying the remote status (5xx, 408, 429).
    pub fn transient_status(status: u16, message: impl Into<String>) -> Self {
        Self { kind: TransportKind::Transient, status: Some(status), message: message.into() }
    }

    /// A terminal remote rejection (auth/validation class).
    pub fn terminal(status: u16, message: impl Into<String>) -> Self {
        Self { kind: TransportKind::Terminal, status: Some(status), message: message.into() }
    }

    /// A terminal failure with no status code (malformed request, body that
    /// cannot be replayed).
    pub fn terminal_message(message: impl Into<String>) -> Self {
        Self { kind: TransportKind::Terminal, status: None, message: message.into() }
    }
}

impl ErrorClassification for TransportError {
    fn is_retryable(&self) -> bool {
        self.kind == TransportKind::Transient
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            TransportKind::Transient => ErrorSeverity::Warning,
            TransportKind::Terminal => ErrorSeverity::Error,
        }
    }
}

/// Errors surfaced by provider services built on this layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Malformed key, provider name, or credential material.
    #[error("validation failed for '{field}': {message}")]
    Validation {
        /// The offending input.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Denied by the rate limiter before any transport attempt.
    #[error("rate limit exceeded for '{key}'")]
    RateLimited {
        /// The rate-limit key that was over budget.
        key: String,
        /// Suggested wait before the window frees up, when known.
        retry_after: Option<Duration>,
    },

    /// Failure from the underlying transport call.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ServiceError {
    /// Build a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Build a rate-limit denial.
    pub fn rate_limited(key: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimited { key: key.into(), retry_after }
    }

    /// The remote status code, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(err) => err.status,
            _ => None,
        }
    }
}

impl ErrorClassification for ServiceError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Validation { .. } | Self::RateLimited { .. } => false,
            Self::Transport(err) => err.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Validation { .. } => ErrorSeverity::Error,
            Self::RateLimited { .. } => ErrorSeverity::Warning,
            Self::Transport(err) => err.severity(),
        }
    }
}

/// Result alias for operations in this layer.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Simple configuration error for builder validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration combination is not usable.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// What was wrong.
        message: String,
    },
}
