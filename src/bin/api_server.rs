// API Server Binary Entry Point
//
// Purpose: Start the Axum bloom prediction server
// Usage: cargo run --features api --bin api_server

use bloom_predictor_rust::{create_router, AppState, PredictorConfig};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (structured logging)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    // Default log level: info for our crate, warn for others
                    "bloom_predictor_rust=info,tower_http=debug,warn".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting API server...");

    // CONFIG_FILE wins over individual environment variables
    let config = match std::env::var("CONFIG_FILE") {
        Ok(path) => PredictorConfig::load(std::path::Path::new(&path))?,
        Err(_) => PredictorConfig::from_env()?,
    };

    tracing::info!("Configuration:");
    tracing::info!("  ARTIFACT_DIR: {:?}", config.artifact_dir);
    tracing::info!("  SAMPLE_DIR: {:?}", config.sample_dir);
    tracing::info!("  HEMISPHERE: {:?}", config.hemisphere);
    tracing::info!("  PEAK_THRESHOLD: {}", config.peak_threshold);
    tracing::info!("  PORT: {}", config.port);

    let port = config.port;

    tracing::info!("Initializing application state...");
    let state = AppState::new(config).await?;
    tracing::info!("Application state initialized successfully");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
