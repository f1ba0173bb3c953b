//! Shared dispatcher state and command execution.
//!
//! Everything here is reachable from both the submitting task (critical path)
//! and the pool workers (common path), so all counters are atomics and the
//! history is a concurrent map.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::executor::CommandExecutor;
use super::history::{CommandEntry, CommandHistory};
use super::pool::QueueHandler;
use crate::audit::{AuditInterceptor, AuditLevel, OperationMetadata};
use crate::clock::Clock;
use crate::error::{DispatchError, ExecutionError};
use crate::logging::log_command_operation;
use crate::metrics::dispatcher::{
    COMMANDS_ACTIVE, COMMANDS_COMPLETED, COMMANDS_FAILED, COMMANDS_REJECTED, COMMANDS_TOTAL,
    COUNTERS, QUEUE_SIZE,
};
use crate::metrics::{DispatcherMetrics, MetricsRegistry};
use crate::models::Command;
use crate::state_machine::{CommandStatus, Priority};

/// Audit descriptors for dispatcher operations
pub(crate) mod operations {
    use super::*;

    pub fn submit() -> OperationMetadata {
        OperationMetadata::new("CommandDispatcher.submit")
            .description("Dispatch command")
            .level(AuditLevel::High)
    }

    pub fn execute_critical() -> OperationMetadata {
        OperationMetadata::new("CommandDispatcher.execute_critical")
            .description("Execute critical command inline")
            .level(AuditLevel::Critical)
    }

    pub fn enqueue() -> OperationMetadata {
        OperationMetadata::new("CommandDispatcher.enqueue")
            .description("Queue common command for the worker pool")
    }

    pub fn execute_queued() -> OperationMetadata {
        OperationMetadata::new("CommandDispatcher.execute_queued")
            .description("Execute queued command")
    }

    pub fn get_command() -> OperationMetadata {
        OperationMetadata::new("CommandDispatcher.get_command").description("Look up command")
    }

    pub fn command_stats_by_author() -> OperationMetadata {
        OperationMetadata::new("CommandDispatcher.command_stats_by_author")
            .description("Read per-author submission counts")
    }

    pub fn active_commands_count() -> OperationMetadata {
        OperationMetadata::new("CommandDispatcher.active_commands_count")
            .description("Count pending and executing commands")
    }
}

#[derive(Debug)]
pub(crate) struct DispatcherState {
    pub(crate) history: CommandHistory,
    commands_by_author: DashMap<String, u64>,
    total_commands: AtomicU64,
    completed_commands: AtomicU64,
    failed_commands: AtomicU64,
    rejected_commands: AtomicU64,
    queue_depth: AtomicUsize,
    executor: Arc<dyn CommandExecutor>,
    pub(crate) interceptor: AuditInterceptor,
    metrics: Arc<dyn MetricsRegistry>,
    clock: Arc<dyn Clock>,
}

impl DispatcherState {
    pub(crate) fn new(
        retention_limit: Option<usize>,
        executor: Arc<dyn CommandExecutor>,
        interceptor: AuditInterceptor,
        metrics: Arc<dyn MetricsRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let state = Arc::new(Self {
            history: CommandHistory::new(retention_limit),
            commands_by_author: DashMap::new(),
            total_commands: AtomicU64::new(0),
            completed_commands: AtomicU64::new(0),
            failed_commands: AtomicU64::new(0),
            rejected_commands: AtomicU64::new(0),
            queue_depth: AtomicUsize::new(0),
            executor,
            interceptor,
            metrics,
            clock,
        });
        Self::register_metrics(&state);
        state
    }

    /// Counters plus gauges sampled from this state. Gauges hold a weak
    /// reference so the registry never keeps the dispatcher alive.
    fn register_metrics(state: &Arc<Self>) {
        let registry = &state.metrics;
        for (name, description) in COUNTERS {
            registry.register_counter(name, description);
        }

        let weak = Arc::downgrade(state);
        registry.register_gauge(
            QUEUE_SIZE,
            "Common commands accepted and not yet finished",
            sample(&weak, |s| s.current_queue_size() as u64),
        );
        registry.register_gauge(
            COMMANDS_ACTIVE,
            "Commands pending or executing",
            sample(&weak, |s| s.active_commands_count()),
        );
        registry.register_gauge(
            COMMANDS_TOTAL,
            "Commands accepted since startup",
            sample(&weak, |s| s.total_commands_count()),
        );
    }

    /// Count a submission against its author and store it. Commands that are
    /// not pending, or whose id is already held, are turned away without
    /// touching the stored entry.
    pub(crate) fn record_submission(
        &self,
        command: Command,
    ) -> Result<CommandEntry, DispatchError> {
        *self
            .commands_by_author
            .entry(command.author().to_string())
            .or_insert(0) += 1;

        let command_id = command.id();
        let status = command.status();
        if status != CommandStatus::Pending {
            warn!(
                command_id = %command_id,
                status = %status,
                "⚠️ DISPATCHER: Command is not pending, rejected"
            );
            return Err(DispatchError::NotPending { command_id, status });
        }
        self.history.insert(command).ok_or_else(|| {
            warn!(command_id = %command_id, "⚠️ DISPATCHER: Duplicate command id, rejected");
            DispatchError::DuplicateCommand { command_id }
        })
    }

    pub(crate) fn mark_accepted(&self) {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn mark_rejected(&self, command_id: Uuid) {
        self.history.remove(&command_id);
        self.rejected_commands.fetch_add(1, Ordering::Relaxed);
        self.metrics.increment_counter(COMMANDS_REJECTED);
    }

    /// Reserve a queue slot before the hand-off to the pool
    pub(crate) fn reserve_queue_slot(&self) {
        self.queue_depth.fetch_add(1, Ordering::AcqRel);
    }

    /// Give back a slot; saturates at zero
    pub(crate) fn release_queue_slot(&self) {
        let _ = self
            .queue_depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                Some(depth.saturating_sub(1))
            });
    }

    pub(crate) fn current_queue_size(&self) -> usize {
        self.queue_depth.load(Ordering::Acquire)
    }

    pub(crate) fn total_commands_count(&self) -> u64 {
        self.total_commands.load(Ordering::Relaxed)
    }

    pub(crate) fn active_commands_count(&self) -> u64 {
        self.history.count_where(|c| c.status().is_active()) as u64
    }

    pub(crate) fn command_stats_by_author(&self) -> HashMap<String, u64> {
        self.commands_by_author
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    pub(crate) fn metrics_snapshot(&self) -> DispatcherMetrics {
        DispatcherMetrics {
            queue_size: self.current_queue_size(),
            total_commands: self.total_commands_count(),
            active_commands: self.active_commands_count(),
            completed_commands: self.completed_commands.load(Ordering::Relaxed),
            failed_commands: self.failed_commands.load(Ordering::Relaxed),
            rejected_commands: self.rejected_commands.load(Ordering::Relaxed),
            commands_by_author: self.command_stats_by_author(),
        }
    }

    /// Critical path: run in the caller's task
    pub(crate) async fn execute_critical(&self, entry: CommandEntry) -> Result<String, ExecutionError> {
        let snapshot = entry.read().clone();
        self.interceptor
            .audited(&operations::execute_critical(), &snapshot, || {
                self.run_command(entry)
            })
            .await
    }

    /// Pending -> Executing -> Completed/Failed, with counters and result text
    async fn run_command(&self, entry: CommandEntry) -> Result<String, ExecutionError> {
        let snapshot = {
            let mut command = entry.write();
            if let Err(e) = command.begin_execution() {
                error!(command_id = %command.id(), error = %e, "Command cannot start");
                return Err(ExecutionError::failed(e.to_string()));
            }
            command.clone()
        };

        log_command_operation(
            "execute",
            snapshot.id(),
            Some(snapshot.author()),
            Some(&snapshot.priority().to_string()),
            "EXECUTING",
            None,
        );

        let outcome = AssertUnwindSafe(self.executor.execute(&snapshot))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ExecutionError::failed(panic_message(&*panic))));
        let finished_at = self.clock.now();

        let result = match outcome {
            Ok(output) => {
                let text = success_text(&snapshot, &output);
                if let Err(e) = entry.write().complete(text.clone(), finished_at) {
                    error!(command_id = %snapshot.id(), error = %e, "Could not record completion");
                }
                self.completed_commands.fetch_add(1, Ordering::Relaxed);
                self.metrics.increment_counter(COMMANDS_COMPLETED);
                log_command_operation(
                    "execute",
                    snapshot.id(),
                    Some(snapshot.author()),
                    None,
                    "COMPLETED",
                    Some(&text),
                );
                Ok(text)
            }
            Err(e) => {
                self.record_failure(&entry, &e);
                Err(e)
            }
        };

        self.history.enforce_retention();
        result
    }

    fn record_failure(&self, entry: &CommandEntry, error: &ExecutionError) {
        let text = format!("ERROR: {error}");
        let command_id = {
            let mut command = entry.write();
            if let Err(e) = command.fail(text.clone(), self.clock.now()) {
                error!(command_id = %command.id(), error = %e, "Could not record failure");
            }
            command.id()
        };
        self.failed_commands.fetch_add(1, Ordering::Relaxed);
        self.metrics.increment_counter(COMMANDS_FAILED);
        warn!(command_id = %command_id, error = %error, "❌ DISPATCHER: Command failed");
    }
}

fn sample(
    weak: &Weak<DispatcherState>,
    read: fn(&DispatcherState) -> u64,
) -> crate::metrics::GaugeFn {
    let weak = weak.clone();
    Arc::new(move || weak.upgrade().map(|s| read(&s)).unwrap_or(0))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("executor panicked: {detail}")
}

fn success_text(command: &Command, output: &str) -> String {
    let base = match command.priority() {
        Priority::Critical => format!("CRITICAL COMMAND EXECUTED: {}", command.description()),
        Priority::Common => format!(
            "COMMAND EXECUTED: {} (author: {})",
            command.description(),
            command.author()
        ),
    };
    if output.is_empty() {
        base
    } else {
        format!("{base} - {output}")
    }
}

#[async_trait]
impl QueueHandler for DispatcherState {
    async fn process(&self, item: Uuid) {
        let Some(entry) = self.history.entry(&item) else {
            error!(
                error = %ExecutionError::MissingCommand(item),
                "❌ DISPATCHER: Dequeued command is gone"
            );
            return;
        };
        let snapshot = entry.read().clone();
        let _ = self
            .interceptor
            .audited(&operations::execute_queued(), &snapshot, || {
                self.run_command(entry)
            })
            .await;
    }

    fn on_interrupted(&self, item: Uuid) {
        let Some(entry) = self.history.entry(&item) else {
            return;
        };
        let snapshot = entry.read().clone();
        let _ = self.interceptor.audited_blocking(
            &operations::execute_queued(),
            &snapshot,
            || -> Result<String, ExecutionError> {
                {
                    let mut command = entry.write();
                    if command.status().is_terminal() {
                        return Ok(command.execution_result().unwrap_or_default().to_string());
                    }
                    if let Err(e) = command.begin_execution() {
                        debug!(command_id = %item, error = %e, "Interrupted command was already executing");
                    }
                }
                self.record_failure(&entry, &ExecutionError::Interrupted);
                Err(ExecutionError::Interrupted)
            },
        );
    }

    fn on_discarded(&self, item: Uuid) {
        warn!(
            command_id = %item,
            "⚠️ DISPATCHER: Queued command discarded at shutdown, left PENDING"
        );
    }

    fn release(&self, _item: Uuid) {
        self.release_queue_slot();
    }
}
