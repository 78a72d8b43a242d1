//! Credentialed outbound HTTP for LedgerLens provider services.
//!
//! Wraps `reqwest` with the resilience leaves from
//! `ledgerlens-resilience`: per-provider credential storage with strict
//! copy-in/copy-out isolation, endpoint-keyed sliding-window rate
//! limiting, and retry with transient/terminal classification on the
//! response status.
//!
//! Transport timeouts live here (on the `reqwest` client and per request);
//! the cache and retry layers stay timeout-agnostic.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod client;
pub mod credentials;

pub use client::{CredentialedHttpClient, HttpClientBuilder, RequestOptions};
pub use credentials::{CredentialStore, Credentials};

// Callers build requests in terms of these without importing reqwest.
pub use reqwest::Method;
pub use reqwest::StatusCode;
