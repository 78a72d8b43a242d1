//! Eviction-aware caching for provider responses
//!
//! Provider payloads (prices, balances, pool stats) tolerate short
//! staleness, so every provider service fronts its upstream with a bounded
//! TTL cache. This module provides:
//!
//! - [`EvictionCache`]: bounded key/value store with per-entry TTL,
//!   entry-count and memory ceilings, and strict LRU eviction
//! - [`CacheConfig`]: presets for the two shapes services use (plain TTL
//!   map, bounded LRU)
//! - [`EstimateSize`]: deterministic approximate cost of a value, used only
//!   for the memory ceiling
//! - [`CacheStats`]: hit/miss/insert counters with evictions broken down by
//!   reason (TTL, entry count, memory)
//! - [`spawn_janitor`]: recurring cleanup sweep as an explicit, cancellable
//!   resource
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use ledgerlens_resilience::cache::{CacheConfig, EvictionCache};
//!
//! let config = CacheConfig::builder()
//!     .max_entries(1000)
//!     .max_memory_mb(8)
//!     .default_ttl(Duration::from_secs(30))
//!     .build();
//!
//! let cache: EvictionCache<String, serde_json::Value> = EvictionCache::new(config);
//! cache.insert("jupiter:SOL".to_string(), serde_json::json!({ "price": 101.25 }));
//! assert!(cache.contains_key(&"jupiter:SOL".to_string()));
//! ```

mod config;
mod core;
mod janitor;
mod size;
mod stats;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use janitor::{spawn_janitor, JanitorHandle};
pub use self::core::EvictionCache;
pub use size::{estimate_serialized, EstimateSize, SCALAR_COST};
pub use stats::{CacheStats, EvictionReason};
