//! # Audit Module
//!
//! Observes operations and emits one structured record per call.
//!
//! ## Architecture
//!
//! - **Interceptor**: explicit `audited(...)` wrapper around any operation
//! - **Records**: immutable snapshot of invocation, outcome and timing
//! - **Sinks**: external channel or local log, with local-log fallback
//!
//! ## Usage
//!
//! ```rust
//! use dispatch_core::audit::{AuditInterceptor, AuditLevel, MemorySink, OperationMetadata};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(MemorySink::new());
//! let interceptor = AuditInterceptor::new(sink.clone());
//! let meta = OperationMetadata::new("Airlock.cycle").level(AuditLevel::High);
//!
//! let outcome = interceptor.audited_blocking(&meta, &"bay 2", || Ok::<_, String>("cycled"));
//! assert_eq!(outcome, Ok("cycled"));
//! assert_eq!(sink.len(), 1);
//! ```

pub mod interceptor;
pub mod record;
pub mod sink;

pub use interceptor::{AuditInterceptor, OperationMetadata};
pub use record::{AuditLevel, AuditOutcome, AuditRecord, AuditStatus};
pub use sink::{AuditSink, AuditSinkAdapter, MemorySink, SinkKind, SinkStats};
