//! Input validation for incoming commands
//!
//! Field-level checks that run before a command reaches the dispatcher. The
//! dispatcher itself assumes well-formed input and never calls into this module.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::models::{Command, NewCommand};

/// Maximum description length in characters
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Maximum author name length in characters
pub const MAX_AUTHOR_LENGTH: usize = 100;

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

/// Command rejected before submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Command validation failed: {}", render(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        "VALIDATION_ERROR"
    }

    pub fn violation_for(&self, field: &str) -> Option<&FieldViolation> {
        self.violations.iter().find(|v| v.field == field)
    }
}

fn render(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validates a command request and builds the pending [`Command`]
pub fn validate_new_command(request: &NewCommand) -> Result<Command, ValidationError> {
    let mut violations = Vec::new();

    let description = check_text(
        &mut violations,
        "description",
        request.description.as_deref(),
        MAX_DESCRIPTION_LENGTH,
    );
    let author = check_text(
        &mut violations,
        "author",
        request.author.as_deref(),
        MAX_AUTHOR_LENGTH,
    );
    if request.priority.is_none() {
        violations.push(FieldViolation {
            field: "priority",
            message: "priority is required".to_string(),
        });
    }

    match (description, author, request.priority) {
        (Some(description), Some(author), Some(priority)) if violations.is_empty() => {
            let time = request.time.unwrap_or_else(Utc::now);
            Ok(Command::new(description, priority, author, time))
        }
        _ => Err(ValidationError { violations }),
    }
}

fn check_text<'a>(
    violations: &mut Vec<FieldViolation>,
    field: &'static str,
    value: Option<&'a str>,
    max_len: usize,
) -> Option<&'a str> {
    match value {
        None => {
            violations.push(FieldViolation {
                field,
                message: format!("{field} is required"),
            });
            None
        }
        Some(v) if v.trim().is_empty() => {
            violations.push(FieldViolation {
                field,
                message: format!("{field} must not be blank"),
            });
            None
        }
        Some(v) if v.chars().count() > max_len => {
            violations.push(FieldViolation {
                field,
                message: format!("{field} must not exceed {max_len} characters"),
            });
            None
        }
        Some(v) => Some(v),
    }
}

impl NewCommand {
    /// Validate and convert into a pending command
    pub fn validate(&self) -> Result<Command, ValidationError> {
        validate_new_command(self)
    }
}
