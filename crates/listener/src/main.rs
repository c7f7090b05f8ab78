//! SkyPortal spectra listener daemon
//!
//! Polls a SkyPortal instance for newly modified spectra, classifies each
//! with a pretrained 1-D CNN, and reports the results locally or as broker
//! comments. Runs until interrupted.

use anyhow::Result;
use clap::Parser;
use listener_lib::broker::SkyPortalClient;
use listener_lib::classifier::OnnxClassifier;
use listener_lib::ledger::ProcessedLedger;
use listener_lib::monitor::SpectraMonitor;
use listener_lib::report::{CommentReporter, LogReporter, Reporter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

/// Ledger namespace of the classify-and-report action.
const LEDGER_NAMESPACE: &str = "classify";

/// SkyPortal spectra listener
#[derive(Debug, Parser)]
#[command(name = "spectra-listener")]
#[command(author, version, about = "Classify new SkyPortal spectra with a pretrained CNN", long_about = None)]
pub struct Cli {
    /// SkyPortal instance URL
    #[arg(long, env = "SKYPORTAL_INSTANCE", default_value = "https://fritz.science")]
    pub instance: String,

    /// API token (required)
    #[arg(long, env = "SKYPORTAL_TOKEN")]
    pub token: Option<String>,

    /// Polling interval in seconds
    #[arg(long, default_value_t = 120)]
    pub interval: u64,

    /// Days to look back for modified spectra
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub lookback: i64,

    /// Instrument IDs to monitor (LRIS, KAST, SPRAT, SEDM, ALFOSC, DBSP, NGPS, GHTS)
    #[arg(long, value_delimiter = ',', default_values_t = [7, 9, 35, 2, 26, 3, 1117, 1108])]
    pub instruments: Vec<i64>,

    /// Path to the ONNX model artifact
    #[arg(long, default_value = "SpectraCNN1D_4650.onnx")]
    pub model: PathBuf,

    /// Directory holding the processed-spectra ledger
    #[arg(long, default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Clear the processed-spectra ledger before starting
    #[arg(long)]
    pub clear_cache: bool,

    /// Post results as broker comments instead of logging locally
    #[arg(long)]
    pub publish: bool,

    /// Directory for result artifacts (log file and charts)
    #[arg(long, default_value = "ml_results")]
    pub results_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let Some(token) = cli.token.clone().filter(|t| !t.is_empty()) else {
        eprintln!("API token is required; pass --token or set SKYPORTAL_TOKEN");
        std::process::exit(1);
    };
    let config = config::ListenerConfig::from_cli(&cli, token)?;

    info!(instance = %config.broker_url, "Starting spectra listener");

    let client = SkyPortalClient::new(&config.broker_url, &config.token)?;
    client.ping().await?;
    client.check_auth().await?;
    info!("Broker reachable, token accepted");

    let classifier = OnnxClassifier::from_path(&config.model_path)?;
    info!(model = %config.model_path.display(), "Classifier ready");

    let mut ledger = ProcessedLedger::open(&config.cache_dir, LEDGER_NAMESPACE)?;
    if config.clear_cache_on_start {
        ledger.clear()?;
    }

    let broker = Arc::new(client);
    let reporter: Arc<dyn Reporter> = if config.publish_to_broker {
        Arc::new(CommentReporter::new(
            broker.clone(),
            config.results_dir.clone(),
        ))
    } else {
        Arc::new(LogReporter::new(
            broker.clone(),
            config.results_dir.clone(),
        ))
    };

    let monitor = SpectraMonitor::new(
        broker,
        Arc::new(classifier),
        reporter,
        ledger,
        config.monitor_config(),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("SIGINT received, shutting down");
    let _ = shutdown_tx.send(());
    let _ = monitor_handle.await;

    Ok(())
}
