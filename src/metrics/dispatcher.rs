//! # Dispatcher Metrics
//!
//! Metric names published by the command dispatcher and the serializable
//! snapshot returned by `CommandDispatcher::metrics_snapshot`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Counters

/// Commands that reached `COMPLETED`
pub const COMMANDS_COMPLETED: &str = "dispatcher.commands.completed";
/// Commands that reached `FAILED`
pub const COMMANDS_FAILED: &str = "dispatcher.commands.failed";
/// Common commands turned away because the queue was full
pub const COMMANDS_REJECTED: &str = "dispatcher.commands.rejected";

// Gauges

/// Common commands accepted but not yet finished
pub const QUEUE_SIZE: &str = "dispatcher.queue.size";
/// Commands in history that are `PENDING` or `EXECUTING`
pub const COMMANDS_ACTIVE: &str = "dispatcher.commands.active";
/// Commands accepted since startup
pub const COMMANDS_TOTAL: &str = "dispatcher.commands.total";

/// (name, description) of every dispatcher counter
pub const COUNTERS: [(&str, &str); 3] = [
    (COMMANDS_COMPLETED, "Total number of commands completed successfully"),
    (COMMANDS_FAILED, "Total number of commands that failed"),
    (COMMANDS_REJECTED, "Total number of commands rejected by a full queue"),
];

/// Point-in-time view of the dispatcher counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherMetrics {
    pub queue_size: usize,
    pub total_commands: u64,
    pub active_commands: u64,
    pub completed_commands: u64,
    pub failed_commands: u64,
    pub rejected_commands: u64,
    pub commands_by_author: HashMap<String, u64>,
}

impl DispatcherMetrics {
    /// Commands that have finished, successfully or not
    pub fn finished_commands(&self) -> u64 {
        self.completed_commands + self.failed_commands
    }
}
