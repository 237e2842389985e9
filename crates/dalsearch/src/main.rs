//! Schedule builder HTTP server
//!
//! # Usage
//!
//! ```bash
//! dalsearch [config.json]
//! ```
//!
//! The config path defaults to `config.json`; built-in defaults are used if
//! the file does not exist. `RUST_LOG` sets the log level (default: info).

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use dalsearch::catalog::{Catalog, ExamSchedule};
use dalsearch::config::AppConfig;
use dalsearch::db::ScheduleDbManager;
use dalsearch::import::PortalClient;
use dalsearch::schedule::{ScheduleStore, TimeGrid};
use dalsearch::server::create_router;
use dalsearch::types::AppState;

const CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .init();

    let config_path = env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let grid = TimeGrid::new(config.grid).context("Invalid grid configuration")?;

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load_from_file(path).context("Failed to load course catalog")?,
        None => {
            warn!("No catalog_path configured, catalog is empty");
            Catalog::default()
        }
    };
    let catalog = match &config.exam_schedule_path {
        Some(path) => catalog.with_exams(
            ExamSchedule::load_from_file(path).context("Failed to load exam schedule")?,
        ),
        None => catalog,
    };

    let storage = ScheduleDbManager::open(&config.database_path)
        .context("Failed to open schedule database")?;
    let store = ScheduleStore::open(Box::new(storage), config.default_term.clone());

    let portal = PortalClient::new(config.portal.clone()).context("Failed to build portal client")?;
    let addr = config.socket_addr()?;

    let state = Arc::new(AppState::new(config, grid, catalog, portal, store));

    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_state.portal.cache_state().cache.cleanup_expired();
        }
    });

    let app = create_router(state);

    info!("Server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
