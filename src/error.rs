//! # Dispatcher Error Types
//!
//! Errors surfaced to callers of the dispatcher. Rejections (the command never
//! entered the execution path) and execution failures (the command was
//! accepted and later failed) are separate variants so callers can tell the
//! two failure moments apart.

use thiserror::Error;
use uuid::Uuid;

/// Failure of a single unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The unit of work reported a failure
    #[error("{0}")]
    Failed(String),

    /// The worker was interrupted while executing (forced shutdown)
    #[error("execution interrupted")]
    Interrupted,

    /// The command disappeared from history before it could run
    #[error("command {0} not found in history")]
    MissingCommand(Uuid),
}

impl ExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors returned by `CommandDispatcher::submit`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The common-path queue is at capacity; nothing was enqueued
    #[error("Command queue is full (capacity {capacity})")]
    QueueOverflow { capacity: usize },

    /// The command was accepted but its execution failed
    #[error("Command {command_id} execution failed: {source}")]
    Execution {
        command_id: Uuid,
        #[source]
        source: ExecutionError,
    },

    /// The dispatcher no longer accepts queued work
    #[error("Dispatcher is shut down; command {command_id} was not accepted")]
    ShutDown { command_id: Uuid },

    /// A command with this id has already been submitted
    #[error("Command {command_id} was already submitted")]
    DuplicateCommand { command_id: Uuid },

    /// Only pending commands can be submitted
    #[error("Command {command_id} is {status}, only PENDING commands can be submitted")]
    NotPending {
        command_id: Uuid,
        status: crate::state_machine::CommandStatus,
    },
}

impl DispatchError {
    /// Stable error code, matching the codes exposed by the surrounding API layer
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueueOverflow { .. } => "QUEUE_OVERFLOW",
            Self::Execution { .. } => "EXECUTION_ERROR",
            Self::ShutDown { .. } => "DISPATCHER_SHUT_DOWN",
            Self::DuplicateCommand { .. } => "DUPLICATE_COMMAND",
            Self::NotPending { .. } => "INVALID_COMMAND_STATE",
        }
    }

    /// True when the command was turned away before reaching execution
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Execution { .. })
    }
}

/// Illegal command lifecycle move
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid command state transition from {from} to {to}")]
pub struct StateTransitionError {
    pub from: crate::state_machine::CommandStatus,
    pub to: crate::state_machine::CommandStatus,
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_distinguishable_from_execution_failures() {
        let overflow = DispatchError::QueueOverflow { capacity: 2 };
        let failed = DispatchError::Execution {
            command_id: Uuid::new_v4(),
            source: ExecutionError::failed("reactor offline"),
        };

        assert!(overflow.is_rejection());
        assert!(!failed.is_rejection());
        assert_eq!(overflow.code(), "QUEUE_OVERFLOW");
        assert_eq!(failed.code(), "EXECUTION_ERROR");
        assert!(failed.to_string().contains("reactor offline"));
    }
}
