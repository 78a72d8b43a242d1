//! Cache statistics and metrics tracking
//!
//! Counters are atomic so the cache never takes its storage lock just to
//! account for an access. Evictions are broken down by reason so operators
//! can tell TTL churn from capacity pressure.

use std::sync::atomic::{AtomicU64, Ordering};

/// Why an entry was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The entry's time-to-live elapsed.
    Ttl,
    /// The entry-count ceiling was exceeded.
    Size,
    /// The memory ceiling was exceeded.
    Memory,
}

/// Statistics snapshot for cache performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Current number of live entries.
    pub size: usize,
    /// Maximum allowed entries (None = unlimited).
    pub max_entries: Option<usize>,
    /// Current estimated memory usage in bytes.
    pub memory_bytes: usize,
    /// Memory ceiling in bytes (None = unlimited).
    pub max_memory_bytes: Option<usize>,
    /// Total successful get operations.
    pub hits: u64,
    /// Total failed get operations (absent or expired).
    pub misses: u64,
    /// Total insert operations.
    pub inserts: u64,
    /// Entries evicted because their TTL elapsed.
    pub ttl_evictions: u64,
    /// Entries evicted to satisfy the entry-count ceiling.
    pub size_evictions: u64,
    /// Entries evicted to satisfy the memory ceiling.
    pub memory_evictions: u64,
}

impl CacheStats {
    /// Hit rate over all accesses (hits / (hits + misses)).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total number of access operations (hits + misses).
    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// Evictions across all reasons.
    pub fn total_evictions(&self) -> u64 {
        self.ttl_evictions + self.size_evictions + self.memory_evictions
    }

    /// Fill percentage against the entry ceiling, when one is set.
    pub fn fill_percentage(&self) -> Option<f64> {
        self.max_entries.map(|max| if max == 0 { 0.0 } else { self.size as f64 / max as f64 })
    }
}

/// Lock-free metrics collector owned by a cache instance.
#[derive(Debug, Default)]
pub(crate) struct MetricsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    ttl_evictions: AtomicU64,
    size_evictions: AtomicU64,
    memory_evictions: AtomicU64,
}

impl MetricsCollector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self, reason: EvictionReason) {
        let counter = match reason {
            EvictionReason::Ttl => &self.ttl_evictions,
            EvictionReason::Size => &self.size_evictions,
            EvictionReason::Memory => &self.memory_evictions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Current statistics combined with live storage figures.
    pub(crate) fn snapshot(
        &self,
        size: usize,
        max_entries: Option<usize>,
        memory_bytes: usize,
        max_memory_bytes: Option<usize>,
    ) -> CacheStats {
        CacheStats {
            size,
            max_entries,
            memory_bytes,
            max_memory_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            ttl_evictions: self.ttl_evictions.load(Ordering::Relaxed),
            size_evictions: self.size_evictions.load(Ordering::Relaxed),
            memory_evictions: self.memory_evictions.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub(crate) fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.ttl_evictions.store(0, Ordering::Relaxed);
        self.size_evictions.store(0, Ordering::Relaxed);
        self.memory_evictions.store(0, Ordering::Relaxed);
    }
}
