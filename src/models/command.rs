//! # Command Model
//!
//! A command is one unit of work submitted to the dispatcher.
//!
//! ## Overview
//!
//! Identity (`id`) is generated once at creation and never changes. The request
//! fields (description, priority, author, scheduled time) are fixed by the
//! caller; the lifecycle fields (status, executed-at, result) are written only
//! by the dispatcher, which owns the authoritative copy. Everyone else sees
//! cloned snapshots.
//!
//! ## Lifecycle
//!
//! `Pending -> Executing -> {Completed | Failed}`, enforced through
//! [`CommandStatus::transition_to`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StateTransitionError;
use crate::state_machine::{CommandStatus, Priority};

/// A command together with its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    id: Uuid,
    description: String,
    priority: Priority,
    author: String,
    #[serde(with = "crate::utils::serde::timestamp")]
    time: DateTime<Utc>,
    status: CommandStatus,
    #[serde(default, with = "crate::utils::serde::optional_timestamp")]
    executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    execution_result: Option<String>,
}

impl Command {
    /// Create a pending command with a fresh identifier
    pub fn new(
        description: impl Into<String>,
        priority: Priority,
        author: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            priority,
            author: author.into(),
            time,
            status: CommandStatus::Pending,
            executed_at: None,
            execution_result: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Time the command was scheduled for
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn status(&self) -> CommandStatus {
        self.status
    }

    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    pub fn execution_result(&self) -> Option<&str> {
        self.execution_result.as_deref()
    }

    /// Pending -> Executing
    pub(crate) fn begin_execution(&mut self) -> Result<(), StateTransitionError> {
        self.status = self.status.transition_to(CommandStatus::Executing)?;
        Ok(())
    }

    /// Executing -> Completed
    pub(crate) fn complete(
        &mut self,
        result: String,
        at: DateTime<Utc>,
    ) -> Result<(), StateTransitionError> {
        self.status = self.status.transition_to(CommandStatus::Completed)?;
        self.executed_at = Some(at);
        self.execution_result = Some(result);
        Ok(())
    }

    /// Executing -> Failed
    pub(crate) fn fail(
        &mut self,
        result: String,
        at: DateTime<Utc>,
    ) -> Result<(), StateTransitionError> {
        self.status = self.status.transition_to(CommandStatus::Failed)?;
        self.executed_at = Some(at);
        self.execution_result = Some(result);
        Ok(())
    }
}

/// Unvalidated command request as received from the outside world.
///
/// Field validation lives in [`crate::validation`]; a `NewCommand` only becomes
/// a [`Command`] through [`NewCommand::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommand {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, with = "crate::utils::serde::optional_timestamp")]
    pub time: Option<DateTime<Utc>>,
}

impl NewCommand {
    pub fn new(description: impl Into<String>, priority: Priority, author: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            priority: Some(priority),
            author: Some(author.into()),
            time: None,
        }
    }

    pub fn scheduled_at(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }
}

/// What `submit` reports for an accepted command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "disposition", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitOutcome {
    /// Critical command, executed inline
    Executed { command_id: Uuid, result: String },
    /// Common command, handed to the worker pool
    Enqueued { command_id: Uuid },
}

impl SubmitOutcome {
    pub fn command_id(&self) -> Uuid {
        match self {
            Self::Executed { command_id, .. } | Self::Enqueued { command_id } => *command_id,
        }
    }

    /// Human-readable descriptor returned to API callers
    pub fn message(&self) -> String {
        match self {
            Self::Executed { result, .. } => result.clone(),
            Self::Enqueued { command_id } => {
                format!("Command queued for execution: {command_id}")
            }
        }
    }
}
