use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StateTransitionError;

/// Command lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    /// Accepted and waiting to run
    Pending,
    /// A worker (or the submitting task, for critical commands) is running it
    Executing,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl CommandStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if this command still counts towards the active total
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Executing)
    }

    pub fn can_transition_to(&self, next: CommandStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Executing)
                | (Self::Executing, Self::Completed)
                | (Self::Executing, Self::Failed)
        )
    }

    /// Validate a move to `next`, returning the new state on success
    pub fn transition_to(self, next: CommandStatus) -> Result<CommandStatus, StateTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StateTransitionError { from: self, to: next })
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Awaiting execution",
            Self::Executing => "Executing",
            Self::Completed => "Completed",
            Self::Failed => "Execution failed",
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Executing => write!(f, "EXECUTING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for CommandStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "EXECUTING" => Ok(Self::Executing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Invalid command status: {s}")),
        }
    }
}

/// Default state for new commands
impl Default for CommandStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Execution priority. Critical commands bypass the worker pool entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Common,
    Critical,
}

impl Priority {
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Common => write!(f, "COMMON"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COMMON" => Ok(Self::Common),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(format!("Invalid priority: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_status_terminal_check() {
        assert!(CommandStatus::Completed.is_terminal());
        assert!(CommandStatus::Failed.is_terminal());
        assert!(!CommandStatus::Pending.is_terminal());
        assert!(!CommandStatus::Executing.is_terminal());
    }

    #[test]
    fn test_transitions_never_skip_executing() {
        assert!(CommandStatus::Pending.transition_to(CommandStatus::Executing).is_ok());
        assert!(CommandStatus::Executing.transition_to(CommandStatus::Failed).is_ok());

        let err = CommandStatus::Pending
            .transition_to(CommandStatus::Completed)
            .unwrap_err();
        assert_eq!(err.from, CommandStatus::Pending);
        assert_eq!(err.to, CommandStatus::Completed);
        assert!(CommandStatus::Pending.transition_to(CommandStatus::Failed).is_err());
    }

    #[test]
    fn test_no_transition_out_of_terminal_states() {
        for terminal in [CommandStatus::Completed, CommandStatus::Failed] {
            for next in [
                CommandStatus::Pending,
                CommandStatus::Executing,
                CommandStatus::Completed,
                CommandStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&CommandStatus::Executing).unwrap();
        assert_eq!(json, "\"EXECUTING\"");
        assert_eq!(
            "critical".parse::<Priority>().unwrap(),
            Priority::Critical
        );
        let parsed: Priority = serde_json::from_str("\"COMMON\"").unwrap();
        assert_eq!(parsed, Priority::Common);
    }
}
