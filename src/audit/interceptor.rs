//! # Audit Interceptor
//!
//! Higher-order wrapper that observes an operation and emits exactly one
//! [`AuditRecord`] per call. The caller always gets back the operation's own
//! return value or error; nothing that happens while building or emitting the
//! record can change that.

use serde::Serialize;
use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::record::{AuditLevel, AuditOutcome, AuditRecord};
use super::sink::AuditSink;
use crate::clock::{system_clock, Clock};

/// Describes the operation being audited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationMetadata {
    /// Qualified name, `Component.operation`
    pub name: Cow<'static, str>,
    pub description: Cow<'static, str>,
    pub level: AuditLevel,
    pub include_parameters: bool,
    pub include_result: bool,
}

impl OperationMetadata {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            description: Cow::Borrowed(""),
            level: AuditLevel::Standard,
            include_parameters: true,
            include_result: true,
        }
    }

    pub fn description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.description = description.into();
        self
    }

    pub fn level(mut self, level: AuditLevel) -> Self {
        self.level = level;
        self
    }

    pub fn include_parameters(mut self, include: bool) -> Self {
        self.include_parameters = include;
        self
    }

    pub fn include_result(mut self, include: bool) -> Self {
        self.include_result = include;
        self
    }

    fn effective_description(&self) -> String {
        if self.description.trim().is_empty() {
            format!("Executing {}", self.name)
        } else {
            self.description.to_string()
        }
    }
}

/// Wraps operations and reports them to an [`AuditSink`]
#[derive(Debug, Clone)]
pub struct AuditInterceptor {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl AuditInterceptor {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self::with_clock(sink, system_clock())
    }

    pub fn with_clock(sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Audit an async operation
    pub async fn audited<P, T, E, F, Fut>(
        &self,
        metadata: &OperationMetadata,
        params: &P,
        operation: F,
    ) -> Result<T, E>
    where
        P: Serialize + ?Sized,
        T: Serialize,
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let parameters = self.capture_parameters(metadata, params);
        let started = self.clock.instant();
        let outcome = operation().await;
        self.record(metadata, parameters, started, &outcome);
        outcome
    }

    /// Audit a synchronous operation
    pub fn audited_blocking<P, T, E, F>(
        &self,
        metadata: &OperationMetadata,
        params: &P,
        operation: F,
    ) -> Result<T, E>
    where
        P: Serialize + ?Sized,
        T: Serialize,
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        let parameters = self.capture_parameters(metadata, params);
        let started = self.clock.instant();
        let outcome = operation();
        self.record(metadata, parameters, started, &outcome);
        outcome
    }

    /// Audit a synchronous operation that cannot fail
    pub fn observed<P, T, F>(&self, metadata: &OperationMetadata, params: &P, operation: F) -> T
    where
        P: Serialize + ?Sized,
        T: Serialize,
        F: FnOnce() -> T,
    {
        match self.audited_blocking(metadata, params, || Ok::<T, Infallible>(operation())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    fn capture_parameters<P>(&self, metadata: &OperationMetadata, params: &P) -> Option<String>
    where
        P: Serialize + ?Sized,
    {
        if !metadata.include_parameters {
            return None;
        }
        serialize_for_audit(&metadata.name, "parameters", params)
    }

    fn record<T, E>(
        &self,
        metadata: &OperationMetadata,
        parameters: Option<String>,
        started: Instant,
        outcome: &Result<T, E>,
    ) where
        T: Serialize,
        E: Display,
    {
        let execution_time_ms = self.clock.elapsed_ms(started);

        let outcome = match outcome {
            Ok(value) => AuditOutcome::Success {
                result: if metadata.include_result {
                    serialize_for_audit(&metadata.name, "result", value)
                } else {
                    None
                },
            },
            Err(e) => AuditOutcome::Failed {
                error_message: e.to_string(),
            },
        };

        let record = AuditRecord {
            timestamp: self.clock.now(),
            method_name: metadata.name.to_string(),
            description: metadata.effective_description(),
            parameters,
            outcome,
            execution_time_ms,
            level: metadata.level,
        };
        let status = record.status();

        let sink = &self.sink;
        if catch_unwind(AssertUnwindSafe(|| sink.emit(record))).is_err() {
            error!(
                operation = %metadata.name,
                "Audit sink panicked while emitting record; record dropped"
            );
            return;
        }

        info!(
            operation = %metadata.name,
            status = %status,
            duration_ms = execution_time_ms,
            "📝 AUDIT"
        );
    }
}

/// Serialize a value to JSON text; `null` and failures become `None`
fn serialize_for_audit<V>(operation: &str, what: &str, value: &V) -> Option<String>
where
    V: Serialize + ?Sized,
{
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Null) => None,
        Ok(json) => Some(json.to_string()),
        Err(e) => {
            warn!(
                operation = %operation,
                field = what,
                error = %e,
                "Could not serialize audit field"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::record::AuditStatus;
    use crate::audit::sink::MemorySink;
    use crate::clock::ManualClock;
    use std::time::Duration;

    #[derive(Debug)]
    struct PanickingSink;

    impl AuditSink for PanickingSink {
        fn emit(&self, _record: AuditRecord) {
            panic!("sink exploded");
        }
    }

    fn interceptor() -> (AuditInterceptor, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (AuditInterceptor::new(sink.clone()), sink)
    }

    #[test]
    fn test_success_records_result_and_parameters() {
        let (interceptor, sink) = interceptor();
        let meta = OperationMetadata::new("Calculator.add").level(AuditLevel::Low);

        let sum = tokio_test::block_on(
            interceptor.audited(&meta, &(2, 3), || async { Ok::<_, String>(5) }),
        )
        .unwrap();

        assert_eq!(sum, 5);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status(), AuditStatus::Success);
        assert_eq!(records[0].parameters.as_deref(), Some("[2,3]"));
        assert_eq!(records[0].result(), Some("5"));
        assert_eq!(records[0].description, "Executing Calculator.add");
        assert_eq!(records[0].level, AuditLevel::Low);
    }

    #[test]
    fn test_error_is_returned_unchanged() {
        let (interceptor, sink) = interceptor();
        let meta = OperationMetadata::new("Reactor.vent").description("Vent the reactor");

        let err = interceptor
            .audited_blocking(&meta, &(), || Err::<(), _>("coolant leak".to_string()))
            .unwrap_err();

        assert_eq!(err, "coolant leak");
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status(), AuditStatus::Failed);
        assert_eq!(records[0].error_message(), Some("coolant leak"));
        assert_eq!(records[0].result(), None);
        assert_eq!(records[0].parameters, None);
    }

    #[test]
    fn test_capture_flags_are_honored() {
        let (interceptor, sink) = interceptor();
        let meta = OperationMetadata::new("Vault.open")
            .include_parameters(false)
            .include_result(false);

        let value = interceptor.observed(&meta, &"secret-code", || "contents".to_string());

        assert_eq!(value, "contents");
        let record = &sink.records()[0];
        assert_eq!(record.parameters, None);
        assert_eq!(record.result(), None);
        assert_eq!(record.status(), AuditStatus::Success);
    }

    #[tokio::test]
    async fn test_duration_comes_from_clock() {
        let sink = Arc::new(MemorySink::new());
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let interceptor = AuditInterceptor::with_clock(sink.clone(), clock.clone());
        let meta = OperationMetadata::new("Drill.run");

        interceptor
            .audited(&meta, &(), || async {
                clock.advance(Duration::from_millis(250));
                Ok::<_, String>(())
            })
            .await
            .unwrap();

        assert_eq!(sink.records()[0].execution_time_ms, 250);
    }

    #[test]
    fn test_panicking_sink_does_not_change_outcome() {
        let interceptor = AuditInterceptor::new(Arc::new(PanickingSink));
        let meta = OperationMetadata::new("Probe.launch");

        let result = interceptor.audited_blocking(&meta, &(), || Ok::<_, String>(42));
        assert_eq!(result, Ok(42));

        let err = interceptor.audited_blocking(&meta, &(), || Err::<u8, _>("misfire".to_string()));
        assert_eq!(err, Err("misfire".to_string()));
    }
}
