mod api;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookhound_core::config::{load_config, validate_config};
use bookhound_core::download::{DailyRateLimiter, DownloadStore, SqliteDownloadStore};
use bookhound_core::orchestrator::{DownloadOrchestrator, ReconciliationSweeper};
use bookhound_core::request::{RequestStore, SqliteRequestStore};
use bookhound_core::source::{DirectArchiveAdapter, IndexerClientAdapter, SourceAdapter};

use api::create_router;
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("BOOKHOUND_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Source priority: {:?}", config.orchestrator.priority);

    // Create stores
    let requests: Arc<dyn RequestStore> = Arc::new(
        SqliteRequestStore::new(&config.database.path)
            .context("Failed to create request store")?,
    );
    info!("Request store initialized");

    let downloads: Arc<dyn DownloadStore> = Arc::new(
        SqliteDownloadStore::new(&config.database.path)
            .context("Failed to create download store")?,
    );
    info!("Download store initialized");

    // Create source adapters from whatever is configured
    let direct: Option<Arc<dyn SourceAdapter>> = match &config.sources.direct_archive {
        Some(archive_config) => {
            info!("Initializing direct archive adapter at {}", archive_config.url);
            Some(Arc::new(DirectArchiveAdapter::new(archive_config.clone())))
        }
        None => {
            info!("No direct archive configured");
            None
        }
    };

    let indexer: Option<Arc<dyn SourceAdapter>> =
        match (&config.sources.indexer, &config.sources.download_client) {
            (Some(indexer_config), Some(client_config)) => {
                info!(
                    "Initializing indexer adapter '{}' at {}",
                    indexer_config.name, indexer_config.url
                );
                Some(Arc::new(IndexerClientAdapter::new(
                    indexer_config.clone(),
                    client_config.clone(),
                )))
            }
            (Some(_), None) => {
                // validate_config rejects this, but stay defensive.
                error!("Indexer configured without a download client, skipping");
                None
            }
            _ => {
                info!("No indexer configured");
                None
            }
        };

    let daily_cap = config
        .sources
        .direct_archive
        .as_ref()
        .map(|c| c.daily_cap as i64)
        .unwrap_or(0);
    let limiter = DailyRateLimiter::new(Arc::clone(&downloads), daily_cap);

    // Create the orchestrator
    let orchestrator = Arc::new(DownloadOrchestrator::new(
        config.orchestrator.clone(),
        Arc::clone(&requests),
        Arc::clone(&downloads),
        direct.clone(),
        indexer.clone(),
        limiter.clone(),
    ));
    info!("Download orchestrator initialized");

    // Create and spawn the reconciliation sweeper
    let (shutdown_tx, _) = broadcast::channel(1);
    let sweeper = Arc::new(ReconciliationSweeper::new(
        Arc::clone(&requests),
        Arc::clone(&downloads),
        direct,
        indexer,
        limiter,
        Duration::from_secs(config.orchestrator.sweep_interval_secs),
    ));
    Arc::clone(&sweeper).spawn(shutdown_tx.subscribe());

    // Create app state and router
    let app_state = Arc::new(AppState::new(config.clone(), requests, orchestrator, sweeper));
    let app = create_router(app_state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    let _ = shutdown_tx.send(());

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
