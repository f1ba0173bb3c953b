//! # Audit Sinks
//!
//! Destinations for audit records. [`AuditSinkAdapter`] routes records either
//! to an external channel or to the local log and absorbs every publish
//! failure by falling back to the local log.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::record::AuditRecord;
use crate::config::AuditConfig;
use crate::events::{ChannelPublisher, PublishError};

/// Receiver of audit records. Emission is infallible by contract.
pub trait AuditSink: Send + Sync + fmt::Debug {
    fn emit(&self, record: AuditRecord);
}

/// Where the adapter sends records
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SinkKind {
    /// Publish JSON on the configured channel
    ExternalBus,
    /// Write the formatted block to the diagnostic log
    #[default]
    LocalLog,
    /// Unrecognized mode name; behaves like `LocalLog` with a warning per record
    Unsupported(String),
}

impl From<String> for SinkKind {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "external-bus" | "bus" | "kafka" => Self::ExternalBus,
            "local-log" | "log" | "console" => Self::LocalLog,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<&str> for SinkKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<SinkKind> for String {
    fn from(kind: SinkKind) -> Self {
        match kind {
            SinkKind::ExternalBus => "external-bus".to_string(),
            SinkKind::LocalLog => "local-log".to_string(),
            SinkKind::Unsupported(name) => name,
        }
    }
}

/// Counters describing where records ended up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    pub published: u64,
    pub logged_locally: u64,
    pub fallbacks: u64,
}

/// Mode-selecting sink with local-log fallback
#[derive(Debug)]
pub struct AuditSinkAdapter {
    kind: SinkKind,
    channel: String,
    publisher: Option<Arc<dyn ChannelPublisher>>,
    published: AtomicU64,
    logged_locally: AtomicU64,
    fallbacks: AtomicU64,
}

impl AuditSinkAdapter {
    pub fn new(kind: SinkKind, channel: impl Into<String>) -> Self {
        Self {
            kind,
            channel: channel.into(),
            publisher: None,
            published: AtomicU64::new(0),
            logged_locally: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Local-log adapter, the default destination
    pub fn local() -> Self {
        Self::new(SinkKind::LocalLog, "command-audit")
    }

    pub fn from_config(config: &AuditConfig, publisher: Option<Arc<dyn ChannelPublisher>>) -> Self {
        let adapter = Self::new(config.mode.clone(), config.channel.clone());
        match publisher {
            Some(publisher) => adapter.with_publisher(publisher),
            None => adapter,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ChannelPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn kind(&self) -> &SinkKind {
        &self.kind
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            published: self.published.load(Ordering::Relaxed),
            logged_locally: self.logged_locally.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }

    fn send_to_bus(&self, record: &AuditRecord) {
        let Some(publisher) = &self.publisher else {
            warn!(
                channel = %self.channel,
                "External audit channel unavailable, switching to local log"
            );
            self.fall_back(record);
            return;
        };

        match self.publish(publisher.as_ref(), record) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                debug!(channel = %self.channel, "Audit record published");
            }
            Err(e) => {
                warn!(
                    channel = %self.channel,
                    error = %e,
                    "Failed to publish audit record, switching to local log"
                );
                self.fall_back(record);
            }
        }
    }

    fn publish(
        &self,
        publisher: &dyn ChannelPublisher,
        record: &AuditRecord,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_string(record)?;
        publisher.publish(&self.channel, payload)
    }

    fn fall_back(&self, record: &AuditRecord) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        self.write_local(record);
    }

    fn write_local(&self, record: &AuditRecord) {
        self.logged_locally.fetch_add(1, Ordering::Relaxed);
        info!(
            target: "audit",
            operation = %record.method_name,
            status = %record.status(),
            duration_ms = record.execution_time_ms,
            level = %record.level,
            "{}",
            record.render_text()
        );
    }
}

impl AuditSink for AuditSinkAdapter {
    fn emit(&self, record: AuditRecord) {
        match &self.kind {
            SinkKind::ExternalBus => self.send_to_bus(&record),
            SinkKind::LocalLog => self.write_local(&record),
            SinkKind::Unsupported(name) => {
                warn!(mode = %name, "Unknown audit mode, using local log");
                self.write_local(&record);
            }
        }
    }
}

/// Sink that keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    /// Records emitted for one qualified operation name
    pub fn records_for(&self, method_name: &str) -> Vec<AuditRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.method_name == method_name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AuditSink for MemorySink {
    fn emit(&self, record: AuditRecord) {
        self.records.lock().push(record);
    }
}
