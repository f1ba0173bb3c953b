//! Audit records produced by dispatcher operations, delivered through the
//! sink adapter in both bus and local-log modes.

mod common;

use std::sync::Arc;

use common::{common, critical};
use dispatch_core::audit::{
    AuditInterceptor, AuditLevel, AuditRecord, AuditSinkAdapter, AuditStatus, MemorySink,
    OperationMetadata, SinkKind,
};
use dispatch_core::clock::system_clock;
use dispatch_core::config::{AuditConfig, DispatchConfig};
use dispatch_core::dispatcher::{CommandDispatcher, InstantExecutor};
use dispatch_core::events::{BroadcastBus, ChannelPublisher};
use dispatch_core::metrics::NoopMetricsRegistry;

fn bus_dispatcher(bus: Option<Arc<BroadcastBus>>) -> (CommandDispatcher, Arc<AuditSinkAdapter>) {
    let audit_config = AuditConfig {
        mode: SinkKind::ExternalBus,
        ..Default::default()
    };
    let publisher = bus.map(|b| b as Arc<dyn ChannelPublisher>);
    let sink = Arc::new(AuditSinkAdapter::from_config(&audit_config, publisher));
    let dispatcher = CommandDispatcher::new(
        &DispatchConfig::default(),
        Arc::new(InstantExecutor),
        AuditInterceptor::new(sink.clone()),
        Arc::new(NoopMetricsRegistry),
        system_clock(),
    );
    (dispatcher, sink)
}

#[tokio::test]
async fn test_critical_submission_publishes_records_on_bus() {
    let bus = Arc::new(BroadcastBus::new(16));
    let mut feed = bus.subscribe();
    let (dispatcher, sink) = bus_dispatcher(Some(bus));

    dispatcher
        .submit(critical("diagnose core", "ripley"))
        .await
        .unwrap();

    let mut records = Vec::new();
    while let Ok(message) = feed.try_recv() {
        assert_eq!(message.channel, "command-audit");
        let record: AuditRecord = serde_json::from_str(&message.payload).unwrap();
        records.push(record);
    }

    // Inner execution finishes before the outer submit
    let names: Vec<&str> = records.iter().map(|r| r.method_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "CommandDispatcher.execute_critical",
            "CommandDispatcher.submit"
        ]
    );
    assert_eq!(records[0].level, AuditLevel::Critical);
    assert_eq!(records[1].level, AuditLevel::High);
    assert!(records[1]
        .result()
        .unwrap()
        .contains("CRITICAL COMMAND EXECUTED: diagnose core"));
    assert!(records[1].parameters.as_deref().unwrap().contains("ripley"));
    assert_eq!(sink.stats().published, 2);
    assert_eq!(sink.stats().fallbacks, 0);
}

#[tokio::test]
async fn test_bus_without_subscribers_falls_back_to_local_log() {
    let bus = Arc::new(BroadcastBus::new(16));
    let (dispatcher, sink) = bus_dispatcher(Some(bus));

    dispatcher.submit(common("check vents", "parker")).await.unwrap();

    let stats = sink.stats();
    assert_eq!(stats.published, 0);
    assert_eq!(stats.fallbacks, 2);
    assert_eq!(stats.logged_locally, 2);
}

#[tokio::test]
async fn test_missing_publisher_falls_back_for_every_record() {
    let (dispatcher, sink) = bus_dispatcher(None);

    dispatcher.submit(critical("seal airlock", "dallas")).await.unwrap();
    dispatcher.active_commands_count();

    assert_eq!(sink.stats().fallbacks, 3);
}

#[tokio::test]
async fn test_read_operations_are_audited() {
    let sink = Arc::new(MemorySink::new());
    let dispatcher = CommandDispatcher::new(
        &DispatchConfig::default(),
        Arc::new(InstantExecutor),
        AuditInterceptor::new(sink.clone()),
        Arc::new(NoopMetricsRegistry),
        system_clock(),
    );

    let command = critical("diagnose core", "ripley");
    let id = command.id();
    dispatcher.submit(command).await.unwrap();
    dispatcher.get_command(id);
    dispatcher.command_stats_by_author();
    dispatcher.active_commands_count();

    let lookup = sink.records_for("CommandDispatcher.get_command");
    assert_eq!(lookup.len(), 1);
    assert_eq!(lookup[0].status(), AuditStatus::Success);
    assert_eq!(lookup[0].parameters.as_deref(), Some(format!("\"{id}\"").as_str()));
    assert!(lookup[0].result().unwrap().contains("COMPLETED"));

    assert_eq!(
        sink.records_for("CommandDispatcher.command_stats_by_author")[0].result(),
        Some(r#"{"ripley":1}"#)
    );
    assert_eq!(
        sink.records_for("CommandDispatcher.active_commands_count")[0].result(),
        Some("0")
    );
}

#[test]
fn test_interceptor_reraises_original_error() {
    let sink = Arc::new(MemorySink::new());
    let interceptor = AuditInterceptor::new(sink.clone());
    let meta = OperationMetadata::new("Nostromo.selfDestruct")
        .description("Initiate self destruct")
        .level(AuditLevel::Critical);

    let result: Result<(), std::io::Error> = interceptor.audited_blocking(&meta, &"mother", || {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "override code rejected",
        ))
    });

    let err = result.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::PermissionDenied);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status(), AuditStatus::Failed);
    assert_eq!(records[0].error_message(), Some("override code rejected"));
    assert_eq!(records[0].description, "Initiate self destruct");
    assert_eq!(records[0].parameters.as_deref(), Some("\"mother\""));
}
