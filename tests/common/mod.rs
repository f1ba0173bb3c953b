//! Shared helpers for dispatcher integration tests
#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dispatch_core::audit::{AuditInterceptor, MemorySink};
use dispatch_core::clock::system_clock;
use dispatch_core::config::DispatchConfig;
use dispatch_core::dispatcher::{CommandDispatcher, CommandExecutor};
use dispatch_core::metrics::InMemoryMetricsRegistry;
use dispatch_core::models::Command;
use dispatch_core::state_machine::Priority;

pub mod strategies;

/// Dispatcher plus the collaborators tests inspect
pub struct TestDispatcher {
    pub dispatcher: CommandDispatcher,
    pub audit: Arc<MemorySink>,
    pub metrics: Arc<InMemoryMetricsRegistry>,
}

/// Builder for dispatchers with small, test-friendly pools
pub struct DispatcherBuilder {
    config: DispatchConfig,
    executor: Arc<dyn CommandExecutor>,
}

impl DispatcherBuilder {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        let mut config = DispatchConfig::default();
        config.executor.core_pool_size = 1;
        config.executor.max_pool_size = 1;
        config.executor.queue_capacity = 10;
        config.executor.shutdown_grace_seconds = 1;
        Self { config, executor }
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.executor.queue_capacity = capacity;
        self
    }

    pub fn workers(mut self, core: usize, max: usize) -> Self {
        self.config.executor.core_pool_size = core;
        self.config.executor.max_pool_size = max;
        self
    }

    pub fn retention_limit(mut self, limit: Option<usize>) -> Self {
        self.config.history.retention_limit = limit;
        self
    }

    pub fn build(self) -> TestDispatcher {
        let audit = Arc::new(MemorySink::new());
        let metrics = Arc::new(InMemoryMetricsRegistry::new());
        let dispatcher = CommandDispatcher::new(
            &self.config,
            self.executor,
            AuditInterceptor::new(audit.clone()),
            metrics.clone(),
            system_clock(),
        );
        TestDispatcher {
            dispatcher,
            audit,
            metrics,
        }
    }
}

pub fn common(description: &str, author: &str) -> Command {
    Command::new(description, Priority::Common, author, Utc::now())
}

pub fn critical(description: &str, author: &str) -> Command {
    Command::new(description, Priority::Critical, author, Utc::now())
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Run a future on a fresh multi-threaded runtime, for proptest bodies
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("test runtime")
        .block_on(future)
}
