//! Agri Forecast service
//!
//! # Usage
//!
//! ```bash
//! # Serve on the configured address (loads or trains the model first)
//! cargo run --release
//!
//! # Train offline and write the model artifact
//! ./agri-forecast train --dataset large_agri_dataset.csv --output agri_forecasting_model.json
//! ```
//!
//! # Environment Variables
//!
//! - `AGRI_CONFIG`: Path to the TOML config (default: ./agri_config.toml)
//! - `AGRI_MODEL_PATH`, `AGRI_DATASET_PATH`, `AGRI_SERVER_ADDR`: config overrides
//! - `AGRI_CORS_ORIGINS`: Comma-separated allowed CORS origins
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use agri_forecast::api::{create_app, AppState};
use agri_forecast::config::{self, ServiceConfig};
use agri_forecast::model::{artifact, CropModel, Dataset, InitOutcome, ModelRegistry};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "agri-forecast")]
#[command(about = "Crop yield, crop-cycle and irrigation forecasting service")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default: "0.0.0.0:5000")
    #[arg(short, long, global = true)]
    addr: Option<String>,

    /// Path to the TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Train the model from a CSV dataset and write the artifact, then exit
    Train {
        /// Training CSV (default: the configured dataset)
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Artifact path (default: the configured artifact path)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}

// ============================================================================
// Offline training
// ============================================================================

fn run_train(config: &ServiceConfig, dataset: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let dataset_path = dataset.unwrap_or_else(|| config.model.dataset_path.clone());
    let output_path = output.unwrap_or_else(|| config.model.artifact_path.clone());

    info!(dataset = %dataset_path.display(), "Loading training data");
    let data = Dataset::load(&dataset_path)
        .with_context(|| format!("Failed to load dataset {}", dataset_path.display()))?;
    if data.skipped_rows() > 0 {
        warn!(skipped = data.skipped_rows(), "Rows skipped during load");
    }

    let model = CropModel::train(&data, &config.model, &config.phenology.crops).context("Training failed")?;
    artifact::save(&model, &output_path)
        .with_context(|| format!("Failed to write artifact {}", output_path.display()))?;

    for (target, m) in &model.metrics {
        info!(model_target = %target, r2 = format!("{:.4}", m.r2), rmse = format!("{:.4}", m.rmse), "Hold-out metrics");
    }
    info!(artifact = %output_path.display(), "Training complete");
    Ok(())
}

// ============================================================================
// Server
// ============================================================================

async fn run_server(config: ServiceConfig, addr: String) -> Result<()> {
    let registry = Arc::new(ModelRegistry::new(&config));

    info!(artifact = %config.model.artifact_path.display(), "Initializing model...");
    let init_registry = registry.clone();
    let outcome = tokio::task::spawn_blocking(move || init_registry.initialize())
        .await
        .context("Model initialization task panicked")?;
    match outcome {
        InitOutcome::Loaded => info!("✓ Model loaded from artifact"),
        InitOutcome::Trained => info!("✓ Model trained from dataset"),
        InitOutcome::Unavailable => warn!("Serving without a model; /predict answers 503 until POST /train succeeds"),
    }

    let app = create_app(AppState::new(&config, registry));

    info!("🌐 Starting HTTP server on {}...", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("✓ HTTP server listening on {}", addr);

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("🛑 Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        signal_token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
        })
        .await
        .context("HTTP server error")?;

    info!("Graceful shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let config = config::load(args.config.as_deref()).context("Invalid configuration")?;

    if let Some(SubCommand::Train { dataset, output }) = args.command {
        return tokio::task::spawn_blocking(move || run_train(&config, dataset, output))
            .await
            .context("Training task panicked")?;
    }

    let addr = args.addr.unwrap_or_else(|| config.server.addr.clone());

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Agri Forecast v{}", env!("CARGO_PKG_VERSION"));
    info!("  Crop-cycle projection & irrigation scheduling");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    run_server(config, addr).await
}
