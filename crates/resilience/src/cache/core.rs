//! Bounded key/value cache with per-entry TTL and strict LRU eviction
//!
//! Recency is tracked with a sentinel-headed doubly linked list laid out in
//! an index arena, giving O(1) promote-to-most-recent and O(1) tail
//! eviction without unsafe code. Exactly one node exists per live key, and
//! list order strictly reflects recency (head = most recent, tail = least).
//!
//! No operation returns an error under normal use: absence and expiry are
//! both represented as a miss.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::config::CacheConfig;
use super::size::EstimateSize;
use super::stats::{CacheStats, EvictionReason, MetricsCollector};
use crate::time::{Clock, SystemClock};

/// Index of the sentinel node in the arena.
const SENTINEL: usize = 0;

#[derive(Debug)]
struct Node<K> {
    /// None for the sentinel and for freed nodes.
    key: Option<K>,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Option<Duration>,
    access_count: u64,
    last_access: Instant,
    size_bytes: usize,
    node: usize,
}

fn is_expired<V>(entry: &CacheEntry<V>, now: Instant) -> bool {
    entry.ttl.is_some_and(|ttl| now.duration_since(entry.created_at) >= ttl)
}

#[derive(Debug)]
struct CacheInner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// Arena of recency nodes; `nodes[SENTINEL]` heads the list.
    nodes: Vec<Node<K>>,
    free: Vec<usize>,
    memory_bytes: usize,
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            nodes: vec![Node { key: None, prev: SENTINEL, next: SENTINEL }],
            free: Vec::new(),
            memory_bytes: 0,
        }
    }

    fn alloc_node(&mut self, key: K) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx].key = Some(key);
            idx
        } else {
            self.nodes.push(Node { key: Some(key), prev: SENTINEL, next: SENTINEL });
            self.nodes.len() - 1
        }
    }

    fn link_front(&mut self, idx: usize) {
        let head = self.nodes[SENTINEL].next;
        self.nodes[idx].prev = SENTINEL;
        self.nodes[idx].next = head;
        self.nodes[head].prev = idx;
        self.nodes[SENTINEL].next = idx;
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn promote(&mut self, idx: usize) {
        self.unlink(idx);
        self.link_front(idx);
    }

    /// The least-recently-used node, if any entry is live.
    fn tail(&self) -> Option<usize> {
        let idx = self.nodes[SENTINEL].prev;
        (idx != SENTINEL).then_some(idx)
    }

    fn remove_entry(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.memory_bytes = self.memory_bytes.saturating_sub(entry.size_bytes);
        self.unlink(entry.node);
        self.nodes[entry.node].key = None;
        self.free.push(entry.node);
        Some(entry)
    }
}

/// Bounded cache with per-entry TTL, entry-count and memory ceilings, and
/// strict LRU eviction.
///
/// # Type Parameters
/// - `K`: key type (`Eq + Hash + Clone`)
/// - `V`: value type (`Clone + EstimateSize`)
/// - `C`: clock for time-based operations (defaults to [`SystemClock`])
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use ledgerlens_resilience::cache::{CacheConfig, EvictionCache};
///
/// let cache: EvictionCache<String, String> =
///     EvictionCache::new(CacheConfig::ttl_lru(Duration::from_secs(60), 100));
/// cache.insert("eth:price".to_string(), "3250.12".to_string());
/// assert_eq!(cache.get(&"eth:price".to_string()), Some("3250.12".to_string()));
/// ```
pub struct EvictionCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone + EstimateSize,
    C: Clock,
{
    inner: Mutex<CacheInner<K, V>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> EvictionCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone + EstimateSize,
{
    /// Create a new cache with the given configuration and system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> EvictionCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone + EstimateSize,
    C: Clock,
{
    /// Create a new cache with a custom clock (useful for testing).
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self { inner: Mutex::new(CacheInner::new()), config, metrics: MetricsCollector::new(), clock }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get a value, promoting the entry to most-recently-used.
    ///
    /// Returns `None` when the key is absent or the entry has expired; an
    /// expired entry is removed and recorded as a TTL eviction.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => {
                self.metrics.record_miss();
                return None;
            }
            Some(entry) => is_expired(entry, now),
        };

        if expired {
            inner.remove_entry(key);
            self.metrics.record_eviction(EvictionReason::Ttl);
            self.metrics.record_miss();
            return None;
        }

        let entry = inner.entries.get_mut(key)?;
        entry.access_count += 1;
        entry.last_access = now;
        let value = entry.value.clone();
        let node = entry.node;
        inner.promote(node);

        self.metrics.record_hit();
        Some(value)
    }

    /// Insert a value with the configured default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.config.default_ttl);
    }

    /// Insert a value with an explicit per-entry TTL (`None` = never
    /// expires).
    ///
    /// An existing key is updated in place and promoted; a new key enters at
    /// the head. Ceilings are enforced afterwards, evicting from the tail.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let size_bytes = value.estimate_bytes();
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.entries.get_mut(&key) {
            let old_size = entry.size_bytes;
            let node = entry.node;
            entry.value = value;
            entry.created_at = now;
            entry.last_access = now;
            entry.ttl = ttl;
            entry.size_bytes = size_bytes;
            inner.memory_bytes = inner.memory_bytes.saturating_sub(old_size) + size_bytes;
            inner.promote(node);
        } else {
            let node = inner.alloc_node(key.clone());
            inner.link_front(node);
            inner.memory_bytes += size_bytes;
            inner.entries.insert(
                key,
                CacheEntry {
                    value,
                    created_at: now,
                    ttl,
                    access_count: 0,
                    last_access: now,
                    size_bytes,
                    node,
                },
            );
        }

        self.metrics.record_insert();
        self.enforce_constraints(&mut inner);
    }

    /// Remove a value from the cache.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        inner.remove_entry(key).map(|entry| entry.value)
    }

    /// Existence probe with expiry check but no recency promotion.
    ///
    /// An expired entry observed here is removed (and counted as a TTL
    /// eviction) so `len` stays truthful; no hit or miss is recorded.
    pub fn contains_key(&self, key: &K) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired = match inner.entries.get(key) {
            None => return false,
            Some(entry) => is_expired(entry, now),
        };

        if expired {
            inner.remove_entry(key);
            self.metrics.record_eviction(EvictionReason::Ttl);
            return false;
        }
        true
    }

    /// Remove all TTL-expired entries regardless of access, returning the
    /// number removed.
    ///
    /// The cleanup janitor calls this on a recurring interval so abandoned
    /// keys do not linger unbounded.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let expired: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove_entry(key);
            self.metrics.record_eviction(EvictionReason::Ttl);
        }
        expired.len()
    }

    /// Clear all entries and reset statistics.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        *inner = CacheInner::new();
        self.metrics.reset();
    }

    /// Current number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current estimated memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.inner.lock().memory_bytes
    }

    /// Current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let (size, memory_bytes) = {
            let inner = self.inner.lock();
            (inner.entries.len(), inner.memory_bytes)
        };
        self.metrics.snapshot(
            size,
            self.config.max_entries,
            memory_bytes,
            self.config.max_memory_bytes,
        )
    }

    /// Evict from the tail until both ceilings hold.
    fn enforce_constraints(&self, inner: &mut CacheInner<K, V>) {
        if let Some(max_entries) = self.config.max_entries {
            while inner.entries.len() > max_entries {
                if !self.evict_tail(inner, EvictionReason::Size) {
                    break;
                }
            }
        }

        if let Some(ceiling) = self.config.max_memory_bytes {
            while inner.memory_bytes > ceiling && !inner.entries.is_empty() {
                if !self.evict_tail(inner, EvictionReason::Memory) {
                    break;
                }
            }
        }
    }

    fn evict_tail(&self, inner: &mut CacheInner<K, V>, reason: EvictionReason) -> bool {
        let Some(tail) = inner.tail() else {
            return false;
        };
        let Some(key) = inner.nodes[tail].key.clone() else {
            return false;
        };
        inner.remove_entry(&key);
        self.metrics.record_eviction(reason);
        true
    }
}
