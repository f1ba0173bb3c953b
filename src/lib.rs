#![allow(clippy::doc_markdown)] // Allow technical terms like OpenTelemetry in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dispatch Core
//!
//! Priority-aware command dispatcher with a bounded worker pool and audit
//! interception.
//!
//! ## Overview
//!
//! Commands enter through [`dispatcher::CommandDispatcher::submit`]. Critical
//! commands execute immediately in the caller's task; common commands go
//! through a bounded FIFO queue served by a tokio worker pool and are
//! rejected outright when the queue is full. The dispatcher keeps the
//! command history, per-author submission counts and execution counters.
//!
//! Every dispatcher operation is wrapped by the [`audit::AuditInterceptor`],
//! which emits one structured audit record per call to an external channel
//! or, failing that, to the local log.
//!
//! ## Module Organization
//!
//! - [`dispatcher`] - Command routing, worker pool, history and executors
//! - [`audit`] - Interceptor, audit records and sinks
//! - [`models`] - Command model and submission outcomes
//! - [`validation`] - Field checks that turn a request into a command
//! - [`state_machine`] - Command status and priority
//! - [`metrics`] - Metrics registry trait, backends and dispatcher metrics
//! - [`events`] - In-process publish channel used by the audit sink
//! - [`config`] - Layered configuration loading
//! - [`logging`] - Structured logging setup
//! - [`clock`] - Injectable time source
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dispatch_core::audit::{AuditInterceptor, AuditSinkAdapter};
//! use dispatch_core::clock::system_clock;
//! use dispatch_core::config::ConfigManager;
//! use dispatch_core::dispatcher::{CommandDispatcher, SimulatedExecutor};
//! use dispatch_core::metrics::registry_from_config;
//! use dispatch_core::models::NewCommand;
//! use dispatch_core::state_machine::Priority;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! dispatch_core::logging::init_structured_logging();
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//!
//! let sink = Arc::new(AuditSinkAdapter::from_config(&config.audit, None));
//! let dispatcher = CommandDispatcher::new(
//!     config,
//!     Arc::new(SimulatedExecutor::default()),
//!     AuditInterceptor::new(sink),
//!     registry_from_config(&config.telemetry),
//!     system_clock(),
//! );
//! dispatcher.start();
//!
//! let command = NewCommand::new("scan deck 3", Priority::Common, "hicks").validate()?;
//! dispatcher.submit(command).await?;
//!
//! let report = dispatcher.shutdown().await;
//! println!("graceful shutdown: {}", report.graceful);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod state_machine;
pub mod utils;
pub mod validation;

pub use audit::{AuditInterceptor, AuditRecord, AuditSinkAdapter, OperationMetadata, SinkKind};
pub use config::{ConfigManager, DispatchConfig};
pub use dispatcher::{CommandDispatcher, CommandExecutor, ShutdownReport};
pub use error::{DispatchError, ExecutionError, Result};
pub use models::{Command, NewCommand, SubmitOutcome};
pub use state_machine::{CommandStatus, Priority};
pub use validation::{validate_new_command, ValidationError};
