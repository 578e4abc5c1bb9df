//! wastewatch-ai - report analysis microservice
//!
//! Accepts citizen waste reports, classifies their images with a hosted
//! vision model and clusters analyzed reports into hotspots.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wastewatch_common::config::{self, TomlConfig};

use wastewatch_ai::services::{
    BedrockVisionClient, ClusterSettings, HotspotEngine, HttpImageFetcher, ReportPipeline,
    TwoStageClassifier,
};
use wastewatch_ai::utils::RetryPolicy;
use wastewatch_ai::AppState;

const IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Command-line arguments for wastewatch-ai
#[derive(Parser, Debug)]
#[command(name = "wastewatch-ai")]
#[command(about = "Waste report analysis microservice")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config)
    #[arg(short, long, env = "WASTEWATCH_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(short, long, env = "WASTEWATCH_BIND")]
    bind: Option<String>,

    /// Folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (default: ~/.config/wastewatch/config.toml)
    #[arg(short, long, env = "WASTEWATCH_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut toml_config =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    toml_config.apply_env_overrides();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting wastewatch-ai (report analysis) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    config::ensure_root_folder(&root_folder).context("Failed to initialize root folder")?;

    let db_path = toml_config.database_path(&root_folder);
    info!("Database: {}", db_path.display());
    let db = wastewatch_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    // Nothing is processing yet, so anything marked in flight was interrupted
    let reset = wastewatch_ai::db::reports::reset_interrupted(&db).await?;
    let requeued = wastewatch_ai::db::queue::requeue_interrupted(&db).await?;
    if reset > 0 || requeued > 0 {
        info!(reset, requeued, "Recovered reports interrupted by the last shutdown");
    }

    let bearer_token = toml_config.resolve_vision_token()?;
    let vision = BedrockVisionClient::from_config(&toml_config.vision, bearer_token)
        .context("Failed to build vision client")?;
    info!(
        endpoint = %toml_config.vision.endpoint,
        model_id = %toml_config.vision.model_id,
        "Vision client ready"
    );

    let settings = toml_config.pipeline.clone();
    let classifier = TwoStageClassifier::new(
        Arc::new(vision),
        RetryPolicy::new(
            settings.max_attempts,
            Duration::from_millis(settings.backoff_ms),
        ),
    );
    let fetcher =
        HttpImageFetcher::new(IMAGE_FETCH_TIMEOUT).context("Failed to build image fetcher")?;
    let hotspots = HotspotEngine::first_match(ClusterSettings::from(&settings));

    let pipeline = Arc::new(ReportPipeline::new(
        db.clone(),
        classifier,
        Arc::new(fetcher),
        hotspots,
    ));

    let state = AppState::new(db, pipeline, settings);
    let app = wastewatch_ai::build_router(state);

    let bind_address = args
        .bind
        .unwrap_or_else(|| toml_config.server.bind_address.clone());
    let port = args.port.unwrap_or(toml_config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
