//! # Metrics Registry
//!
//! The seam between the dispatcher and whatever collects its metrics.
//! Counters are registered once and incremented by name; gauges are
//! registered with a callback that is sampled whenever the value is read.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Sampling function behind a gauge
pub type GaugeFn = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Collector of named counters and gauges
pub trait MetricsRegistry: Send + Sync + fmt::Debug {
    fn register_counter(&self, name: &'static str, description: &'static str);

    /// Increment a counter by one; unregistered names are registered on the fly
    fn increment_counter(&self, name: &'static str);

    fn register_gauge(&self, name: &'static str, description: &'static str, sample: GaugeFn);
}

struct GaugeEntry {
    description: &'static str,
    sample: GaugeFn,
}

/// Registry that keeps everything in process memory
#[derive(Default)]
pub struct InMemoryMetricsRegistry {
    counters: DashMap<&'static str, AtomicU64>,
    descriptions: DashMap<&'static str, &'static str>,
    gauges: DashMap<&'static str, GaugeEntry>,
}

impl InMemoryMetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value, `None` if never registered
    pub fn counter_value(&self, name: &str) -> Option<u64> {
        self.counters.get(name).map(|c| c.load(Ordering::Relaxed))
    }

    /// Sample a gauge now
    pub fn gauge_value(&self, name: &str) -> Option<u64> {
        // Clone the callback out so the shard lock is not held while sampling
        let sample = self.gauges.get(name).map(|g| g.sample.clone())?;
        Some(sample())
    }

    pub fn description(&self, name: &str) -> Option<&'static str> {
        self.descriptions
            .get(name)
            .map(|d| *d)
            .or_else(|| self.gauges.get(name).map(|g| g.description))
    }

    /// Names of every registered counter and gauge, sorted
    pub fn metric_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .counters
            .iter()
            .map(|e| *e.key())
            .chain(self.gauges.iter().map(|e| *e.key()))
            .collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for InMemoryMetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryMetricsRegistry")
            .field("counters", &self.counters.len())
            .field("gauges", &self.gauges.len())
            .finish()
    }
}

impl MetricsRegistry for InMemoryMetricsRegistry {
    fn register_counter(&self, name: &'static str, description: &'static str) {
        self.counters.entry(name).or_insert_with(|| AtomicU64::new(0));
        self.descriptions.insert(name, description);
        debug!(metric = name, "📊 METRICS: Counter registered");
    }

    fn increment_counter(&self, name: &'static str) {
        self.counters
            .entry(name)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn register_gauge(&self, name: &'static str, description: &'static str, sample: GaugeFn) {
        self.gauges.insert(name, GaugeEntry { description, sample });
        debug!(metric = name, "📊 METRICS: Gauge registered");
    }
}

/// Registry that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsRegistry;

impl MetricsRegistry for NoopMetricsRegistry {
    fn register_counter(&self, _name: &'static str, _description: &'static str) {}

    fn increment_counter(&self, _name: &'static str) {}

    fn register_gauge(&self, _name: &'static str, _description: &'static str, _sample: GaugeFn) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_counters_accumulate() {
        let registry = InMemoryMetricsRegistry::new();
        registry.register_counter("jobs.done", "Finished jobs");
        registry.increment_counter("jobs.done");
        registry.increment_counter("jobs.done");

        assert_eq!(registry.counter_value("jobs.done"), Some(2));
        assert_eq!(registry.description("jobs.done"), Some("Finished jobs"));
        assert_eq!(registry.counter_value("jobs.lost"), None);
    }

    #[test]
    fn test_unregistered_counter_is_created_on_increment() {
        let registry = InMemoryMetricsRegistry::new();
        registry.increment_counter("late.counter");
        assert_eq!(registry.counter_value("late.counter"), Some(1));
    }

    #[test]
    fn test_gauge_is_sampled_on_read() {
        let registry = InMemoryMetricsRegistry::new();
        let depth = Arc::new(AtomicUsize::new(3));
        let source = depth.clone();
        registry.register_gauge(
            "queue.depth",
            "Queued items",
            Arc::new(move || source.load(Ordering::Relaxed) as u64),
        );

        assert_eq!(registry.gauge_value("queue.depth"), Some(3));
        depth.store(8, Ordering::Relaxed);
        assert_eq!(registry.gauge_value("queue.depth"), Some(8));
        assert_eq!(registry.metric_names(), vec!["queue.depth"]);
    }
}
