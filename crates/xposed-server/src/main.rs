//! # xposed-server
//!
//! HTTP service for the xPosed community threat registry.
//!
//! This binary provides:
//! - **Report intake** with instrument validation, per-user duplicate
//!   protection and automatic risk classification
//! - **Appeals** against public listings, resolved by admins
//! - **Watchlist alerts** when a report in a followed category goes public
//! - **Admin overrides** for verification and visibility
//! - **REST API** (axum) with bearer-token authentication issued by an
//!   external identity provider

mod admin;
mod api;
mod appeals;
mod auth;
mod config;
mod error;
mod notify;
mod reports;
mod state;
mod watchlist;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use xposed_store::Database;

use crate::config::ServerConfig;
use crate::notify::LogNotifier;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,xposed_server=debug,xposed_store=info")
            }),
        )
        .init();

    info!("Starting xPosed server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.identity_pubkey == [0u8; 32] {
        tracing::warn!("IDENTITY_PUBKEY not set, every authenticated request will be rejected");
    }

    // -----------------------------------------------------------------------
    // 3. Open the database and wire the services
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;
    let http_addr = config.http_addr;
    let app_state = AppState::new(db, Arc::new(LogNotifier), config);

    {
        let stats = app_state.db.lock().await.threat_stats()?;
        info!(
            total = stats.total_threats,
            public = stats.public_threats,
            verified = stats.verified_threats,
            "Registry loaded"
        );
    }

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server until Ctrl+C
    // -----------------------------------------------------------------------
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    if let Err(e) = api::serve(app_state, http_addr, shutdown).await {
        tracing::error!(error = %e, "HTTP server failed");
        return Err(e);
    }

    Ok(())
}
