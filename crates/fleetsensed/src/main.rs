//! fleetsensed - fleet monitoring daemon
//!
//! Loads the telemetry dataset, wires the analysis orchestrator, and runs
//! the monitoring sweep on a fixed interval until interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};

use fleetsense_core::{
    init_tracing, AnalysisOrchestrator, FleetConfig, HistoryLog, HttpNarrativeEngine,
    MonitoringScheduler, RangeTable, VehicleDataStore,
};

#[derive(Parser)]
#[command(name = "fleetsensed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fleet health monitoring daemon", long_about = None)]
struct Cli {
    /// Path to the JSON telemetry dataset (overrides FLEETSENSE_DATASET)
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Seconds between sweeps (overrides FLEETSENSE_SWEEP_INTERVAL_SECS)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Max vehicles evaluated concurrently per sweep
    #[arg(long)]
    concurrency: Option<usize>,

    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    let mut config = FleetConfig::from_env();
    if let Some(dataset) = cli.dataset {
        config.dataset_path = dataset;
    }
    if let Some(interval) = cli.interval_secs {
        config.sweep_interval_secs = interval;
    }
    if let Some(concurrency) = cli.concurrency {
        config.sweep_concurrency = concurrency;
    }

    let store = Arc::new(
        VehicleDataStore::from_path(&config.dataset_path)
            .with_context(|| format!("loading dataset {}", config.dataset_path.display()))?,
    );
    info!(
        event = "daemon.started",
        version = fleetsense_core::VERSION,
        vehicles = store.len(),
        interval_secs = config.sweep_interval_secs,
    );

    let engine = Arc::new(HttpNarrativeEngine::new(config.narrative.clone()));
    if !engine.is_configured() {
        warn!(
            "No narrative API key detected. Set FLEETSENSE_API_KEY or GROQ_API_KEY; \
             sweeps will run with error-status narrative sections."
        );
    }

    let ranges = Arc::new(RangeTable::builtin());
    let history = Arc::new(HistoryLog::new());
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&ranges),
        engine,
        history,
        Duration::from_secs(config.narrative.timeout_secs),
    ));
    let scheduler = MonitoringScheduler::new(store, ranges, orchestrator, config.sweep_concurrency);

    if cli.once {
        let outcome = scheduler.sweep().await;
        info!(
            event = "daemon.single_sweep_done",
            status = ?outcome.status,
            reports = outcome.reports.len(),
            alerts = outcome.alerts.len(),
        );
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.sweep_interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = scheduler.sweep().await;
                if !outcome.failed_vehicles.is_empty() {
                    warn!(
                        event = "daemon.sweep_partial",
                        failed = outcome.failed_vehicles.len(),
                        vehicles = ?outcome.failed_vehicles,
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(event = "daemon.shutdown");
                break;
            }
        }
    }

    Ok(())
}
