//! Distribution dashboard server
//!
//! Serves the dashboard catalog; every visit gets its own live session
//! driven over REST and WebSocket.

mod api;
mod config;
mod error;
mod lifecycle;
mod models;
mod storage;

use std::sync::Arc;

use clap::Parser;
use distboard::prelude::AppCatalog;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::stream::BroadcastHub;
use crate::config::Config;
use crate::storage::memory::MemoryStore;

/// Application state shared across handlers
pub struct AppState {
    pub store: MemoryStore,
    pub broadcast_hub: BroadcastHub,
    pub catalog: AppCatalog,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, catalog: AppCatalog) -> Self {
        Self {
            store: MemoryStore::new(),
            broadcast_hub: BroadcastHub::new(),
            catalog,
            config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "distboard_server=debug,distboard=debug,tower_http=debug".into()),
        )
        .init();

    // Parse CLI args
    let config = Config::parse();
    info!("Starting distboard-server on {}:{}", config.host, config.port);

    let catalog = config.load_catalog()?;
    info!("Serving {} dashboards", catalog.len());

    let state = Arc::new(AppState::new(config.clone(), catalog));

    // Start lifecycle cleanup task
    let cleanup_state = Arc::clone(&state);
    tokio::spawn(async move {
        lifecycle::cleanup_task(cleanup_state).await;
    });

    let app = api::app(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
