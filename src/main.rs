//! Mediaflow - Presigned media upload and variant serving API
//!
//! Hands out presigned S3 upload plans and serves resized image variants.

use clap::Parser;
use mediaflow::config::Config;
use mediaflow::media::MediaService;
use mediaflow::server::{ApiServer, AppState};
use mediaflow::storage::s3::S3ObjectStore;
use mediaflow::upload::UploadService;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Mediaflow - Presigned upload orchestration and image variant serving
#[derive(Parser, Debug)]
#[command(name = "mediaflow")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "mediaflow.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Mediaflow v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Arc::new(Config::load(&args.config)?);
    info!("Loaded configuration from {:?}", args.config);

    // Connect storage and wire up services
    let store = Arc::new(S3ObjectStore::connect(&config.s3).await);
    let state = AppState::new(
        Arc::clone(&config),
        UploadService::new(store.clone()),
        MediaService::new(store, config.media.clone()),
    );

    let mut server = ApiServer::new(config.server.address.clone(), Arc::new(state));
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Received ctrl-c, shutting down");
    server.shutdown().await;

    Ok(())
}
