//! # Dispatch Demo
//!
//! Command-line driver for the dispatcher. Loads configuration, wires the
//! audit sink and metrics backend, submits a burst of commands and prints
//! the resulting counters.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use dispatch_core::audit::{AuditInterceptor, AuditSinkAdapter, SinkKind};
use dispatch_core::clock::system_clock;
use dispatch_core::config::ConfigManager;
use dispatch_core::dispatcher::{CommandDispatcher, SimulatedExecutor};
use dispatch_core::events::{BroadcastBus, ChannelPublisher};
use dispatch_core::logging::init_structured_logging;
use dispatch_core::metrics::registry_from_config;
use dispatch_core::models::NewCommand;
use dispatch_core::state_machine::Priority;

#[derive(Parser)]
#[command(name = "dispatch-demo")]
#[command(about = "Drive the command dispatcher from the command line")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration directory (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Environment name; overrides DISPATCH_ENV / APP_ENV
    #[arg(short, long)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a burst of commands and report the outcome
    Run {
        /// Number of common commands to submit
        #[arg(long, default_value_t = 20)]
        common: usize,

        /// Number of critical commands to submit
        #[arg(long, default_value_t = 2)]
        critical: usize,

        /// Author recorded on every command
        #[arg(long, default_value = "demo")]
        author: String,

        /// Upper bound of the simulated execution time in milliseconds
        #[arg(long, default_value_t = 1000)]
        max_delay_ms: u64,
    },

    /// Load and validate configuration, then print it as JSON
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_structured_logging();
    let cli = Cli::parse();

    let manager = match &cli.environment {
        Some(environment) => ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), environment),
        None => ConfigManager::load_from_directory(cli.config_dir.clone()),
    }
    .context("failed to load dispatcher configuration")?;

    match cli.command.unwrap_or(Commands::Run {
        common: 20,
        critical: 2,
        author: "demo".to_string(),
        max_delay_ms: 1000,
    }) {
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(manager.config())?);
            Ok(())
        }
        Commands::Run {
            common,
            critical,
            author,
            max_delay_ms,
        } => run(&manager, common, critical, &author, max_delay_ms).await,
    }
}

async fn run(
    manager: &ConfigManager,
    common: usize,
    critical: usize,
    author: &str,
    max_delay_ms: u64,
) -> Result<()> {
    let config = manager.config();

    let bus = Arc::new(BroadcastBus::new(config.audit.bus_capacity));
    // Keep a subscriber alive so bus mode has somewhere to deliver
    let mut audit_feed = bus.subscribe();
    let publisher = (config.audit.mode == SinkKind::ExternalBus)
        .then(|| bus.clone() as Arc<dyn ChannelPublisher>);
    let sink = Arc::new(AuditSinkAdapter::from_config(&config.audit, publisher));

    let dispatcher = CommandDispatcher::new(
        config,
        Arc::new(SimulatedExecutor::new(
            Duration::from_millis(max_delay_ms / 10),
            Duration::from_millis(max_delay_ms),
        )),
        AuditInterceptor::new(sink.clone()),
        registry_from_config(&config.telemetry),
        system_clock(),
    );
    dispatcher.start();

    for i in 0..critical {
        let command = NewCommand::new(format!("critical check #{i}"), Priority::Critical, author)
            .validate()?;
        let outcome = dispatcher.submit(command).await?;
        info!(result = %outcome.message(), "Critical command finished");
    }

    for i in 0..common {
        let command =
            NewCommand::new(format!("routine task #{i}"), Priority::Common, author).validate()?;
        match dispatcher.submit(command).await {
            Ok(outcome) => info!(result = %outcome.message(), "Common command accepted"),
            Err(e) if e.is_rejection() => warn!(code = e.code(), error = %e, "Command rejected"),
            Err(e) => return Err(e.into()),
        }
    }

    let report = dispatcher.shutdown().await;

    let mut bus_records = 0usize;
    while audit_feed.try_recv().is_ok() {
        bus_records += 1;
    }

    let snapshot = dispatcher.metrics_snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!(
        "audit: {:?}, delivered on bus: {}",
        sink.stats(),
        bus_records
    );
    Ok(())
}
