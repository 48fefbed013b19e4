//! Pipeline counter sinks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use docbridge_types::{Counter, StatsSnapshot};

/// The pipeline's shared, additive counter system.
pub trait CounterSink {
    /// Add `delta` to `counter`.
    fn increment(&self, counter: Counter, delta: u64);
}

impl<T: CounterSink + ?Sized> CounterSink for &T {
    fn increment(&self, counter: Counter, delta: u64) {
        (**self).increment(counter, delta);
    }
}

impl<T: CounterSink + ?Sized> CounterSink for Arc<T> {
    fn increment(&self, counter: Counter, delta: u64) {
        (**self).increment(counter, delta);
    }
}

/// Lock-free in-process counters, one slot per [`Counter`].
#[derive(Debug, Default)]
pub struct InMemoryCounters {
    values: [AtomicU64; Counter::ALL.len()],
}

impl InMemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.values[counter.index()].load(Ordering::Relaxed)
    }

    /// Current totals as a snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::from_counters(|c| self.get(c))
    }
}

impl CounterSink for InMemoryCounters {
    fn increment(&self, counter: Counter, delta: u64) {
        self.values[counter.index()].fetch_add(delta, Ordering::Relaxed);
    }
}
