//! Periodic cleanup sweep for expired cache entries
//!
//! The janitor is an explicit resource: it is spawned against a specific
//! cache handle and stopped through [`JanitorHandle::shutdown`] or by
//! dropping the handle. There is no module-level singleton, so any number
//! of caches and janitors coexist in one process or test.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::core::EvictionCache;
use super::size::EstimateSize;
use crate::time::Clock;

/// Handle to a running cleanup task.
///
/// Dropping the handle aborts the task, so a janitor never outlives the
/// owner that spawned it.
#[derive(Debug)]
pub struct JanitorHandle {
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Stop the cleanup task.
    pub fn shutdown(&self) {
        self.task.abort();
    }

    /// Whether the task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for JanitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a recurring sweep of `cache.cleanup_expired()`.
///
/// Missed ticks are skipped rather than bursted; a zero interval is clamped
/// to one millisecond. Must be called within a tokio runtime.
pub fn spawn_janitor<K, V, C>(
    cache: Arc<EvictionCache<K, V, C>>,
    interval: Duration,
) -> JanitorHandle
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + EstimateSize + Send + Sync + 'static,
    C: Clock,
{
    let period = interval.max(Duration::from_millis(1));
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so the first
        // sweep happens a full period after spawn.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.cleanup_expired();
            if removed > 0 {
                debug!(removed, "cache janitor removed expired entries");
            }
        }
    });
    JanitorHandle { task }
}
