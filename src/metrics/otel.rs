//! # OpenTelemetry Registry
//!
//! [`MetricsRegistry`] backed by the global OpenTelemetry meter provider.
//! Counters map to `Counter<u64>`; gauges map to observable gauges whose
//! callback samples the registered [`GaugeFn`] at collection time.
//!
//! No exporter is installed here. Without one the global provider is a
//! no-op and recording is free.

use dashmap::DashMap;
use opentelemetry::metrics::{Counter, Meter, ObservableGauge};
use std::fmt;
use tracing::debug;

use super::registry::{GaugeFn, MetricsRegistry};

pub struct OpenTelemetryRegistry {
    meter: Meter,
    counters: DashMap<&'static str, Counter<u64>>,
    // Observable gauges stop reporting once dropped
    gauges: DashMap<&'static str, ObservableGauge<u64>>,
}

impl OpenTelemetryRegistry {
    /// Registry using a meter named after the service
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: String = service_name.into();
        let meter = opentelemetry::global::meter(leak_name(name));
        Self::with_meter(meter)
    }

    pub fn with_meter(meter: Meter) -> Self {
        Self {
            meter,
            counters: DashMap::new(),
            gauges: DashMap::new(),
        }
    }

    fn counter(&self, name: &'static str, description: &'static str) -> Counter<u64> {
        self.counters
            .entry(name)
            .or_insert_with(|| {
                self.meter
                    .u64_counter(name)
                    .with_description(description)
                    .build()
            })
            .clone()
    }
}

/// Meter names must be `'static`; the service name is fixed for the process
fn leak_name(name: String) -> &'static str {
    Box::leak(name.into_boxed_str())
}

impl fmt::Debug for OpenTelemetryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenTelemetryRegistry")
            .field("counters", &self.counters.len())
            .field("gauges", &self.gauges.len())
            .finish()
    }
}

impl MetricsRegistry for OpenTelemetryRegistry {
    fn register_counter(&self, name: &'static str, description: &'static str) {
        self.counter(name, description);
        debug!(metric = name, "📊 METRICS: OpenTelemetry counter registered");
    }

    fn increment_counter(&self, name: &'static str) {
        self.counter(name, "").add(1, &[]);
    }

    fn register_gauge(&self, name: &'static str, description: &'static str, sample: GaugeFn) {
        let gauge = self
            .meter
            .u64_observable_gauge(name)
            .with_description(description)
            .with_callback(move |observer| observer.observe(sample(), &[]))
            .build();
        self.gauges.insert(name, gauge);
        debug!(metric = name, "📊 METRICS: OpenTelemetry gauge registered");
    }
}
