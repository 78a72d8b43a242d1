//! Cache configuration types and builder patterns

use std::time::Duration;

/// Configuration for cache behavior.
///
/// The two cache shapes used by provider services are presets over this one
/// type: a plain TTL map ([`CacheConfig::ttl`], no ceilings) and a bounded
/// LRU cache ([`CacheConfig::ttl_lru`]).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries (None = unlimited).
    pub max_entries: Option<usize>,

    /// Ceiling on the estimated memory of all values (None = unlimited).
    pub max_memory_bytes: Option<usize>,

    /// Default time-to-live for entries inserted without an explicit TTL
    /// (None = no expiration).
    pub default_ttl: Option<Duration>,

    /// Sweep interval for the cleanup janitor, when one is spawned.
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            max_memory_bytes: None,
            default_ttl: None,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Quick preset for a TTL-only cache (no entry or memory ceilings).
    pub fn ttl(duration: Duration) -> Self {
        Self { default_ttl: Some(duration), ..Self::default() }
    }

    /// Quick preset for a bounded LRU cache without expiry.
    pub fn lru(max_entries: usize) -> Self {
        Self { max_entries: Some(max_entries), ..Self::default() }
    }

    /// Combined TTL + LRU cache.
    pub fn ttl_lru(ttl: Duration, max_entries: usize) -> Self {
        Self { max_entries: Some(max_entries), default_ttl: Some(ttl), ..Self::default() }
    }
}

/// Builder for [`CacheConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of entries.
    pub fn max_entries(mut self, count: usize) -> Self {
        self.config.max_entries = Some(count);
        self
    }

    /// Set the memory ceiling in bytes.
    pub fn max_memory_bytes(mut self, bytes: usize) -> Self {
        self.config.max_memory_bytes = Some(bytes);
        self
    }

    /// Set the memory ceiling in whole megabytes.
    pub fn max_memory_mb(mut self, megabytes: usize) -> Self {
        self.config.max_memory_bytes = Some(megabytes * 1024 * 1024);
        self
    }

    /// Set the default time-to-live for entries.
    pub fn default_ttl(mut self, duration: Duration) -> Self {
        self.config.default_ttl = Some(duration);
        self
    }

    /// Set the janitor sweep interval.
    pub fn cleanup_interval(mut self, duration: Duration) -> Self {
        self.config.cleanup_interval = duration;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
