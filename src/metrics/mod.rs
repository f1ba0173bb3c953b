//! # Metrics Module
//!
//! Counters and gauges for the dispatcher, behind the [`MetricsRegistry`]
//! trait so the collection backend can be swapped.
//!
//! - `registry`: the trait plus in-memory and no-op implementations
//! - `otel`: OpenTelemetry meter backend
//! - `dispatcher`: metric names and the [`DispatcherMetrics`] snapshot
//!
//! ## Usage
//!
//! ```rust
//! use dispatch_core::metrics::{InMemoryMetricsRegistry, MetricsRegistry};
//! use dispatch_core::metrics::dispatcher::COMMANDS_COMPLETED;
//!
//! let registry = InMemoryMetricsRegistry::new();
//! registry.register_counter(COMMANDS_COMPLETED, "Completed commands");
//! registry.increment_counter(COMMANDS_COMPLETED);
//! assert_eq!(registry.counter_value(COMMANDS_COMPLETED), Some(1));
//! ```

use std::sync::Arc;

use crate::config::TelemetryConfig;

pub mod dispatcher;
pub mod otel;
pub mod registry;

pub use dispatcher::DispatcherMetrics;
pub use otel::OpenTelemetryRegistry;
pub use registry::{GaugeFn, InMemoryMetricsRegistry, MetricsRegistry, NoopMetricsRegistry};

/// Pick the registry backend from telemetry settings
pub fn registry_from_config(config: &TelemetryConfig) -> Arc<dyn MetricsRegistry> {
    if config.enabled {
        Arc::new(OpenTelemetryRegistry::new(config.service_name.clone()))
    } else {
        Arc::new(InMemoryMetricsRegistry::new())
    }
}
