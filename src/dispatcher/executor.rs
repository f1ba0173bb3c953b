//! # Command Executors
//!
//! The unit of work run for each command. The dispatcher owns the lifecycle
//! bookkeeping; an executor only performs the work and reports its outcome.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ExecutionError;
use crate::models::Command;

/// Performs the work behind a command
///
/// The returned string is appended to the dispatcher's result text when it
/// is not empty.
#[async_trait]
pub trait CommandExecutor: Send + Sync + fmt::Debug {
    async fn execute(&self, command: &Command) -> Result<String, ExecutionError>;
}

/// Succeeds immediately with no output
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantExecutor;

#[async_trait]
impl CommandExecutor for InstantExecutor {
    async fn execute(&self, _command: &Command) -> Result<String, ExecutionError> {
        Ok(String::new())
    }
}

/// Sleeps for a bounded, command-dependent delay before succeeding
#[derive(Debug, Clone, Copy)]
pub struct SimulatedExecutor {
    min_delay: Duration,
    max_delay: Duration,
}

impl SimulatedExecutor {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay: min_delay.min(max_delay),
            max_delay: max_delay.max(min_delay),
        }
    }

    /// Delay for one command, spread across the range by its id
    pub fn delay_for(&self, command: &Command) -> Duration {
        let span = (self.max_delay - self.min_delay).as_millis();
        if span == 0 {
            return self.min_delay;
        }
        let offset = command.id().as_u128() % (span + 1);
        self.min_delay + Duration::from_millis(offset as u64)
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_millis(1000))
    }
}

#[async_trait]
impl CommandExecutor for SimulatedExecutor {
    async fn execute(&self, command: &Command) -> Result<String, ExecutionError> {
        tokio::time::sleep(self.delay_for(command)).await;
        Ok(String::new())
    }
}

type BoxedExecution = Pin<Box<dyn Future<Output = Result<String, ExecutionError>> + Send>>;

/// Adapts a closure into an executor
///
/// The closure receives a snapshot of the command and returns the future to run.
#[derive(Clone)]
pub struct FnExecutor {
    f: Arc<dyn Fn(Command) -> BoxedExecution + Send + Sync>,
}

impl FnExecutor {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Command) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ExecutionError>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |command| Box::pin(f(command))),
        }
    }
}

impl fmt::Debug for FnExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnExecutor").finish_non_exhaustive()
    }
}

#[async_trait]
impl CommandExecutor for FnExecutor {
    async fn execute(&self, command: &Command) -> Result<String, ExecutionError> {
        (self.f)(command.clone()).await
    }
}
