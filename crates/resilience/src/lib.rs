//! Resilience primitives for the LedgerLens provider aggregator.
//!
//! Every outbound call to a third-party blockchain or DeFi data provider
//! (RPC nodes, price oracles, lending-protocol APIs) passes through the
//! same three leaves, composed here into a reusable capability:
//!
//! - [`cache`]: bounded TTL cache with strict LRU eviction and a memory
//!   ceiling
//! - [`rate_limit`]: per-key sliding-window request counting
//! - [`retry`]: bounded-attempt exponential backoff distinguishing
//!   retryable from terminal failures
//! - [`service`]: the composed base embedded by concrete provider services
//! - [`error`]: the unified failure taxonomy those services surface
//!
//! The crate is an in-process library: it owns no wire format, performs no
//! I/O of its own, and leaves transport timeouts to the transport layer.
//! Logging through `tracing` is observational only.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod cache;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod service;
pub mod time;

// Re-export commonly used types for convenience
pub use cache::{CacheConfig, CacheStats, EstimateSize, EvictionCache};
pub use error::{
    ErrorClassification, ErrorSeverity, ServiceError, ServiceResult, TransportError, TransportKind,
};
pub use rate_limit::{RatePolicy, SlidingWindowLimiter};
pub use retry::{RetryConfig, RetryPolicy, RetryRunner};
pub use service::{MetricsSnapshot, ResilientService, ServiceConfig};
pub use time::{Clock, MockClock, SystemClock};
