//! # Command Dispatcher
//!
//! Priority-aware dispatcher in front of a bounded worker pool.
//!
//! ## Overview
//!
//! - **Critical** commands run inline in the submitting task and bypass the
//!   pool entirely; `submit` returns once they reach a terminal state.
//! - **Common** commands are handed to the pool through a bounded FIFO queue.
//!   `submit` never waits for them to run. A full queue rejects the command
//!   immediately with [`DispatchError::QueueOverflow`].
//!
//! Every command, whatever its fate, is counted against its author. History,
//! counters and queue depth are owned here and exposed through read-only
//! accessors; nothing outside the dispatcher mutates them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dispatch_core::audit::{AuditInterceptor, AuditSinkAdapter};
//! use dispatch_core::clock::system_clock;
//! use dispatch_core::config::DispatchConfig;
//! use dispatch_core::dispatcher::{CommandDispatcher, InstantExecutor};
//! use dispatch_core::metrics::InMemoryMetricsRegistry;
//! use dispatch_core::models::NewCommand;
//! use dispatch_core::state_machine::Priority;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = CommandDispatcher::new(
//!     &DispatchConfig::default(),
//!     Arc::new(InstantExecutor),
//!     AuditInterceptor::new(Arc::new(AuditSinkAdapter::local())),
//!     Arc::new(InMemoryMetricsRegistry::new()),
//!     system_clock(),
//! );
//! dispatcher.start();
//!
//! let command = NewCommand::new("diagnose core", Priority::Critical, "ripley").validate()?;
//! let outcome = dispatcher.submit(command).await?;
//! println!("{}", outcome.message());
//!
//! dispatcher.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod executor;
pub mod history;
pub mod pool;
mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::AuditInterceptor;
use crate::clock::Clock;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, Result};
use crate::logging::log_command_operation;
use crate::metrics::{DispatcherMetrics, MetricsRegistry};
use crate::models::{Command, SubmitOutcome};
use crate::state_machine::Priority;

pub use executor::{CommandExecutor, FnExecutor, InstantExecutor, SimulatedExecutor};
pub use history::CommandHistory;
pub use pool::{EnqueueError, PoolSettings, ShutdownReport, WorkerPool};

use state::{operations, DispatcherState};

/// Routes commands by priority and tracks their lifecycle
#[derive(Debug)]
pub struct CommandDispatcher {
    state: Arc<DispatcherState>,
    pool: WorkerPool,
    shutdown_grace: Duration,
}

impl CommandDispatcher {
    pub fn new(
        config: &DispatchConfig,
        executor: Arc<dyn CommandExecutor>,
        interceptor: AuditInterceptor,
        metrics: Arc<dyn MetricsRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = DispatcherState::new(
            config.history.retention_limit,
            executor,
            interceptor,
            metrics,
            clock,
        );

        let executor_config = &config.executor;
        let pool = WorkerPool::new(
            PoolSettings {
                core_pool_size: executor_config.core_pool_size,
                max_pool_size: executor_config.max_pool_size.max(executor_config.core_pool_size),
                keep_alive: executor_config.keep_alive(),
                queue_capacity: executor_config.queue_capacity,
            },
            state.clone(),
        );

        Self {
            state,
            pool,
            shutdown_grace: executor_config.shutdown_grace(),
        }
    }

    /// Spawn the worker pool. Common commands submitted before this stay queued.
    pub fn start(&self) {
        self.pool.start();
        info!(
            queue_capacity = self.pool.settings().queue_capacity,
            "✅ DISPATCHER: Ready"
        );
    }

    /// Submit a validated command
    pub async fn submit(&self, command: Command) -> Result<SubmitOutcome> {
        let snapshot = command.clone();
        self.state
            .interceptor
            .audited(&operations::submit(), &snapshot, || self.dispatch(command))
            .await
    }

    async fn dispatch(&self, command: Command) -> Result<SubmitOutcome> {
        let command_id = command.id();
        let priority = command.priority();

        log_command_operation(
            "submit",
            command_id,
            Some(command.author()),
            Some(&priority.to_string()),
            "PENDING",
            Some(command.description()),
        );

        let entry = self.state.record_submission(command)?;

        match priority {
            Priority::Critical => {
                self.state.mark_accepted();
                self.state
                    .execute_critical(entry)
                    .await
                    .map(|result| SubmitOutcome::Executed { command_id, result })
                    .map_err(|source| DispatchError::Execution { command_id, source })
            }
            Priority::Common => self.state.interceptor.audited_blocking(
                &operations::enqueue(),
                &command_id,
                || self.enqueue(command_id),
            ),
        }
    }

    fn enqueue(&self, command_id: Uuid) -> Result<SubmitOutcome> {
        if self.pool.is_shutting_down() {
            self.state.history.remove(&command_id);
            return Err(DispatchError::ShutDown { command_id });
        }

        // Counted before the hand-off so a fast worker can never release first
        self.state.reserve_queue_slot();

        match self.pool.try_enqueue(command_id) {
            Ok(()) => {
                self.state.mark_accepted();
                Ok(SubmitOutcome::Enqueued { command_id })
            }
            Err(EnqueueError::Full) => {
                self.state.release_queue_slot();
                self.state.mark_rejected(command_id);
                let capacity = self.pool.settings().queue_capacity;
                warn!(
                    command_id = %command_id,
                    capacity = capacity,
                    "⚠️ DISPATCHER: Queue full, command rejected"
                );
                Err(DispatchError::QueueOverflow { capacity })
            }
            Err(EnqueueError::Closed) => {
                self.state.release_queue_slot();
                self.state.history.remove(&command_id);
                Err(DispatchError::ShutDown { command_id })
            }
        }
    }

    /// Snapshot of a command, if still in history
    pub fn get_command(&self, id: Uuid) -> Option<Command> {
        self.state
            .interceptor
            .observed(&operations::get_command(), &id, || self.state.history.get(&id))
    }

    /// Submissions per author, including rejected ones
    pub fn command_stats_by_author(&self) -> HashMap<String, u64> {
        self.state
            .interceptor
            .observed(&operations::command_stats_by_author(), &(), || {
                self.state.command_stats_by_author()
            })
    }

    /// Commands currently pending or executing
    pub fn active_commands_count(&self) -> u64 {
        self.state
            .interceptor
            .observed(&operations::active_commands_count(), &(), || {
                self.state.active_commands_count()
            })
    }

    /// Common commands accepted but not yet finished
    pub fn current_queue_size(&self) -> usize {
        self.state.current_queue_size()
    }

    /// Commands accepted since startup
    pub fn total_commands_count(&self) -> u64 {
        self.state.total_commands_count()
    }

    pub fn metrics_snapshot(&self) -> DispatcherMetrics {
        self.state.metrics_snapshot()
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Graceful drain within the configured grace period, then forced stop
    pub async fn shutdown(&self) -> ShutdownReport {
        self.shutdown_with_grace(self.shutdown_grace).await
    }

    pub async fn shutdown_with_grace(&self, grace: Duration) -> ShutdownReport {
        info!("🛑 DISPATCHER: Shutting down");
        let report = self.pool.shutdown(grace).await;
        info!(
            graceful = report.graceful,
            interrupted = report.interrupted,
            discarded = report.discarded,
            completed = self.state.metrics_snapshot().completed_commands,
            "🛑 DISPATCHER: Stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditStatus, MemorySink};
    use crate::clock::system_clock;
    use crate::error::ExecutionError;
    use crate::metrics::InMemoryMetricsRegistry;
    use crate::state_machine::CommandStatus;
    use chrono::Utc;

    fn config(capacity: usize) -> DispatchConfig {
        let mut config = DispatchConfig::default();
        config.executor.core_pool_size = 1;
        config.executor.max_pool_size = 1;
        config.executor.queue_capacity = capacity;
        config
    }

    fn dispatcher(
        capacity: usize,
        executor: Arc<dyn CommandExecutor>,
    ) -> (CommandDispatcher, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = CommandDispatcher::new(
            &config(capacity),
            executor,
            AuditInterceptor::new(sink.clone()),
            Arc::new(InMemoryMetricsRegistry::new()),
            system_clock(),
        );
        (dispatcher, sink)
    }

    fn command(description: &str, priority: Priority, author: &str) -> Command {
        Command::new(description, priority, author, Utc::now())
    }

    #[tokio::test]
    async fn test_critical_command_runs_inline() {
        let (dispatcher, sink) = dispatcher(10, Arc::new(InstantExecutor));
        let cmd = command("diagnose core", Priority::Critical, "ripley");
        let id = cmd.id();

        let outcome = dispatcher.submit(cmd).await.unwrap();

        assert_eq!(outcome.message(), "CRITICAL COMMAND EXECUTED: diagnose core");
        let stored = dispatcher.get_command(id).unwrap();
        assert_eq!(stored.status(), CommandStatus::Completed);
        assert!(stored.executed_at().is_some());
        assert_eq!(dispatcher.active_commands_count(), 0);
        assert_eq!(dispatcher.total_commands_count(), 1);

        let submit = sink.records_for("CommandDispatcher.submit");
        assert_eq!(submit.len(), 1);
        assert_eq!(submit[0].status(), AuditStatus::Success);
        assert_eq!(sink.records_for("CommandDispatcher.execute_critical").len(), 1);
    }

    #[tokio::test]
    async fn test_critical_failure_is_reported_and_recorded() {
        let executor = FnExecutor::new(|_| async { Err(ExecutionError::failed("core breach")) });
        let (dispatcher, _) = dispatcher(10, Arc::new(executor));
        let cmd = command("vent plasma", Priority::Critical, "ripley");
        let id = cmd.id();

        let err = dispatcher.submit(cmd).await.unwrap_err();

        assert_eq!(err.code(), "EXECUTION_ERROR");
        let stored = dispatcher.get_command(id).unwrap();
        assert_eq!(stored.status(), CommandStatus::Failed);
        assert_eq!(stored.execution_result(), Some("ERROR: core breach"));
        assert_eq!(dispatcher.metrics_snapshot().failed_commands, 1);
    }

    #[tokio::test]
    async fn test_overflow_rejects_and_forgets_command() {
        let (dispatcher, _) = dispatcher(1, Arc::new(InstantExecutor));
        dispatcher
            .submit(command("first", Priority::Common, "hicks"))
            .await
            .unwrap();
        let second = command("second", Priority::Common, "hicks");
        let second_id = second.id();

        let err = dispatcher.submit(second).await.unwrap_err();

        assert_eq!(err, DispatchError::QueueOverflow { capacity: 1 });
        assert!(dispatcher.get_command(second_id).is_none());
        assert_eq!(dispatcher.current_queue_size(), 1);
        assert_eq!(dispatcher.total_commands_count(), 1);
        assert_eq!(dispatcher.command_stats_by_author()["hicks"], 2);
        assert_eq!(dispatcher.metrics_snapshot().rejected_commands, 1);
    }

    #[tokio::test]
    async fn test_common_submission_after_shutdown_is_refused() {
        let (dispatcher, _) = dispatcher(4, Arc::new(InstantExecutor));
        dispatcher.start();
        let report = dispatcher.shutdown().await;
        assert!(report.graceful);

        let cmd = command("late", Priority::Common, "hudson");
        let id = cmd.id();
        let err = dispatcher.submit(cmd).await.unwrap_err();
        assert_eq!(err, DispatchError::ShutDown { command_id: id });
        assert!(err.is_rejection());

        // Critical work still runs inline
        assert!(dispatcher
            .submit(command("abort", Priority::Critical, "hudson"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_resubmitting_same_command_is_refused() {
        let (dispatcher, _) = dispatcher(4, Arc::new(InstantExecutor));
        let cmd = command("seal hatch", Priority::Critical, "dallas");
        let id = cmd.id();

        dispatcher.submit(cmd.clone()).await.unwrap();
        let err = dispatcher.submit(cmd).await.unwrap_err();

        assert_eq!(err, DispatchError::DuplicateCommand { command_id: id });
        assert_eq!(err.code(), "DUPLICATE_COMMAND");
        assert!(err.is_rejection());
        assert_eq!(dispatcher.get_command(id).unwrap().status(), CommandStatus::Completed);
        assert_eq!(dispatcher.metrics_snapshot().completed_commands, 1);
        assert_eq!(dispatcher.total_commands_count(), 1);
        assert_eq!(dispatcher.command_stats_by_author()["dallas"], 2);
    }

    #[tokio::test]
    async fn test_queued_duplicate_keeps_original_entry() {
        let (dispatcher, _) = dispatcher(4, Arc::new(InstantExecutor));
        let cmd = command("refuel", Priority::Common, "lambert");
        let id = cmd.id();

        dispatcher.submit(cmd.clone()).await.unwrap();
        let err = dispatcher.submit(cmd).await.unwrap_err();

        assert_eq!(err, DispatchError::DuplicateCommand { command_id: id });
        assert_eq!(dispatcher.current_queue_size(), 1);
        assert_eq!(dispatcher.get_command(id).unwrap().status(), CommandStatus::Pending);
    }

    #[tokio::test]
    async fn test_finished_command_cannot_be_submitted() {
        let (dispatcher, _) = dispatcher(4, Arc::new(InstantExecutor));
        let mut json = serde_json::to_value(command("restart", Priority::Critical, "ash")).unwrap();
        json["status"] = serde_json::json!("COMPLETED");
        let finished: Command = serde_json::from_value(json).unwrap();
        let id = finished.id();

        let err = dispatcher.submit(finished).await.unwrap_err();

        assert_eq!(
            err,
            DispatchError::NotPending {
                command_id: id,
                status: CommandStatus::Completed,
            }
        );
        assert!(err.is_rejection());
        assert!(dispatcher.get_command(id).is_none());
        assert_eq!(dispatcher.total_commands_count(), 0);
    }

    #[tokio::test]
    async fn test_panicking_critical_executor_fails_command() {
        let executor = FnExecutor::new(|command: Command| async move {
            if command.priority() == Priority::Critical {
                panic!("coolant pump seized");
            }
            Ok::<_, ExecutionError>(String::new())
        });
        let (dispatcher, _) = dispatcher(4, Arc::new(executor));
        let cmd = command("purge coolant", Priority::Critical, "parker");
        let id = cmd.id();

        let err = dispatcher.submit(cmd).await.unwrap_err();

        assert_eq!(err.code(), "EXECUTION_ERROR");
        let stored = dispatcher.get_command(id).unwrap();
        assert_eq!(stored.status(), CommandStatus::Failed);
        assert_eq!(
            stored.execution_result(),
            Some("ERROR: executor panicked: coolant pump seized")
        );
        assert_eq!(dispatcher.metrics_snapshot().failed_commands, 1);
        assert_eq!(dispatcher.active_commands_count(), 0);
    }
}
