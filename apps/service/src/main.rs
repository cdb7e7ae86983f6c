#![warn(clippy::all)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use uptime_service::Config;
use uptime_service::alert::{AlertSender, LogAlertSender, TwilioSender};
use uptime_service::logs::FileLogSink;
use uptime_service::monitoring::{
    CheckWorkflow, HttpExecutor, MonitoringScheduler, OutcomeProcessor,
};
use uptime_service::store::FileStore;

/// Periodically probes every stored check and alerts owners on state changes
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the worker config (defaults to $XDG_CONFIG_HOME/uppe/worker.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::from_config(args.config.as_ref()).context("loading configuration")?;
    config.apply_env_overrides();

    if args.print_config {
        print!("{config}");
        return Ok(());
    }

    // RUST_LOG_FORMAT wins over the file when set
    let format = std::env::var_os("RUST_LOG_FORMAT").is_none().then_some(config.logging.format);
    logger::init_with(config.log_level()?, format)
        .map_err(|e| anyhow::anyhow!("could not install tracing subscriber: {e}"))?;

    let store = Arc::new(FileStore::new(&config.storage.data_dir));
    store.ensure_collections().await.context("preparing data directory")?;
    let logs = Arc::new(FileLogSink::new(&config.storage.logs_dir));
    logs.ensure_dir().await.context("preparing logs directory")?;

    let alerts: Arc<dyn AlertSender> = match config.twilio.credentials() {
        Some(credentials) => Arc::new(TwilioSender::new(credentials)?),
        None => {
            warn!("Twilio credentials not configured, alerts will only be logged");
            Arc::new(LogAlertSender)
        }
    };

    let executor = Arc::new(HttpExecutor::new().context("building HTTP client")?);
    let processor = OutcomeProcessor::new(store.clone(), logs, alerts);
    let workflow = CheckWorkflow::new(store, executor, processor);

    let mut scheduler = MonitoringScheduler::new(workflow).with_interval(config.check_interval());
    scheduler.init();
    info!(data_dir = %config.storage.data_dir.display(), "Background workers are running");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    scheduler.shutdown();
    info!("Shutting down");

    Ok(())
}
