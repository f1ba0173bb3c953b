//! # Dispatcher Configuration System
//!
//! Layered configuration for the dispatcher: built-in defaults, then
//! `dispatch.yaml`, then `dispatch.<environment>.yaml`, then `DISPATCH__*`
//! environment variables. Every section has defaults so an empty
//! configuration directory still yields a runnable setup.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dispatch_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration (environment auto-detected)
//! let manager = ConfigManager::load()?;
//!
//! let capacity = manager.config().executor.queue_capacity;
//! let grace = manager.config().executor.shutdown_grace();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audit::SinkKind;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring dispatch.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Worker pool sizing and queue bounds
    pub executor: ExecutorPoolConfig,

    /// In-memory command history retention
    pub history: HistoryConfig,

    /// Audit sink selection
    pub audit: AuditConfig,

    /// Metrics export settings
    pub telemetry: TelemetryConfig,
}

/// Worker pool configuration for the common path
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutorPoolConfig {
    /// Workers kept alive for the life of the pool
    pub core_pool_size: usize,
    /// Upper bound on concurrently running workers
    pub max_pool_size: usize,
    /// Idle time after which workers above the core size exit
    pub keep_alive_seconds: u64,
    /// Bounded queue size; submissions beyond it are rejected
    pub queue_capacity: usize,
    /// How long shutdown waits for in-flight work before forcing termination
    pub shutdown_grace_seconds: u64,
}

impl Default for ExecutorPoolConfig {
    fn default() -> Self {
        Self {
            core_pool_size: 2,
            max_pool_size: 4,
            keep_alive_seconds: 60,
            queue_capacity: 100,
            shutdown_grace_seconds: 30,
        }
    }
}

impl ExecutorPoolConfig {
    /// Get keep-alive as Duration
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds)
    }

    /// Get the graceful shutdown window as Duration
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// Command history retention
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum retained commands; `None` keeps everything
    pub retention_limit: Option<usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_limit: Some(10_000),
        }
    }
}

/// Audit sink configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    pub mode: SinkKind,
    /// Channel name used in external-bus mode
    pub channel: String,
    /// Buffer size of the in-process broadcast bus
    pub bus_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            mode: SinkKind::LocalLog,
            channel: "command-audit".to_string(),
            bus_capacity: 1000,
        }
    }
}

/// Telemetry and monitoring configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Route metrics to the OpenTelemetry meter instead of the in-memory registry
    pub enabled: bool,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "dispatch-core".to_string(),
        }
    }
}

impl DispatchConfig {
    /// Reject settings the worker pool cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        let executor = &self.executor;

        if executor.core_pool_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.core_pool_size",
                "0",
                "at least one core worker is required",
            ));
        }

        if executor.max_pool_size < executor.core_pool_size {
            return Err(ConfigurationError::invalid_value(
                "executor.max_pool_size",
                executor.max_pool_size.to_string(),
                format!(
                    "must be greater than or equal to core_pool_size ({})",
                    executor.core_pool_size
                ),
            ));
        }

        if executor.queue_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "executor.queue_capacity",
                "0",
                "the command queue needs room for at least one command",
            ));
        }

        if self.history.retention_limit == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "history.retention_limit",
                "0",
                "use null for unbounded retention or a positive limit",
            ));
        }

        if self.audit.channel.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "audit.channel",
                self.audit.channel.clone(),
                "channel name must not be blank",
            ));
        }

        if self.audit.bus_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "audit.bus_capacity",
                "0",
                "broadcast bus capacity must be positive",
            ));
        }

        Ok(())
    }
}
