//! Service-level composition of the resilience leaves
//!
//! [`ResilientService`] wires the cache, rate limiter, and retry runner
//! into one reusable core with aggregate [`ServiceMetrics`]; concrete
//! provider services embed it rather than reimplementing the plumbing.

mod base;
mod metrics;

pub use base::{ResilientService, ServiceConfig};
pub use metrics::{MetricsSnapshot, ServiceMetrics};
