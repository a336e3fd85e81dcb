//! Counter registry
//!
//! Named, monotonically increasing accumulators that the polling task feeds
//! and the admin interface and reporter read. Counters are created on first
//! update and never removed.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ordered copy of every counter total, keyed by counter name
pub type Snapshot = BTreeMap<String, u64>;

/// A single accumulated total
///
/// Only ever increases. Additions saturate at `u64::MAX` instead of wrapping.
#[derive(Debug, Default)]
pub struct Counter {
    total: AtomicU64,
}

impl Counter {
    /// Add `delta` to the total
    pub fn inc_by(&self, delta: u64) {
        // fetch_update only fails when the closure returns None, which it never does
        let _ = self
            .total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(delta))
            });
    }

    /// Current total
    pub fn get(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }
}

/// Concurrent map from counter name to accumulated total
///
/// `update` creates missing counters through the map's entry API, which holds
/// the shard lock for that key: racing creators of the same name converge on
/// one counter and no increment is lost.
#[derive(Debug, Default)]
pub struct CounterRegistry {
    counters: DashMap<String, Counter>,
}

impl CounterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the counter called `name`, creating it at zero if absent
    pub fn update(&self, name: &str, delta: u64) {
        // Fast path: existing counters only need a read lock on their shard
        if let Some(counter) = self.counters.get(name) {
            counter.inc_by(delta);
            return;
        }

        self.counters
            .entry(name.to_string())
            .or_default()
            .inc_by(delta);
    }

    /// Current total for `name`, or `None` if it was never updated
    pub fn get_count(&self, name: &str) -> Option<u64> {
        self.counters.get(name).map(|counter| counter.get())
    }

    /// Ordered copy of all counters
    pub fn snapshot(&self) -> Snapshot {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect()
    }

    /// Number of distinct counters
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
