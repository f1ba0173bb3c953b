//! # Events Module
//!
//! Outbound publish channel used by the audit sink in external-bus mode,
//! plus an in-process broadcast implementation.

pub mod publisher;

// Re-export key types for convenience
pub use publisher::{BroadcastBus, BusMessage, ChannelPublisher, PublishError};
