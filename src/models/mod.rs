pub mod command;

// Re-export core models for easy access
pub use command::{Command, NewCommand, SubmitOutcome};
