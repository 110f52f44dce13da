//! Metrics emitted by the cache protocol.
//!
//! Metrics go through an injected [`MetricsSink`] rather than global state, so
//! callers decide where they end up and tests can inspect them.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Counter incremented once per successful commit.
pub const CACHE_COMMITTED: &str = "cache.committed";

/// Gauge holding the committed data bytes.
pub const CACHE_USED_BYTES: &str = "cache.used_bytes";

/// Gauge holding the share of the size budget in use.
pub const CACHE_USED_PERCENT: &str = "cache.used_percent";

/// Destination for protocol metrics.
pub trait MetricsSink: Send + Sync {
    /// Increments a monotonic counter by one.
    fn counter_inc(&self, name: &str);

    /// Sets a gauge to `value`.
    fn gauge_set(&self, name: &str, value: u64);
}

/// Discards every metric.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn counter_inc(&self, _name: &str) {}

    fn gauge_set(&self, _name: &str, _value: u64) {}
}

/// Records metrics in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    counters: Mutex<BTreeMap<String, u64>>,
    gauges: Mutex<BTreeMap<String, u64>>,
}

impl InMemoryMetrics {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, 0 if never incremented.
    pub fn counter(&self, name: &str) -> u64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.get(name).copied().unwrap_or(0)
    }

    /// Current value of a gauge, if ever set.
    pub fn gauge(&self, name: &str) -> Option<u64> {
        let gauges = self.gauges.lock().unwrap_or_else(|e| e.into_inner());
        gauges.get(name).copied()
    }

    /// All counters and gauges, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let gauges = self.gauges.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<(String, u64)> = counters
            .iter()
            .chain(gauges.iter())
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        all.sort();
        all
    }
}

impl MetricsSink for InMemoryMetrics {
    fn counter_inc(&self, name: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry(name.to_string()).or_insert(0) += 1;
    }

    fn gauge_set(&self, name: &str, value: u64) {
        let mut gauges = self.gauges.lock().unwrap_or_else(|e| e.into_inner());
        gauges.insert(name.to_string(), value);
    }
}
