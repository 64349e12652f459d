//! Taubot Economy Server - Main Entry Point

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use taubot_server::permissions::{queries, PermissionSet, PgGrantStore};
use taubot_server::{api, config, db, economy};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taubot_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Taubot Economy Server"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::run_migrations(&db_pool).await?;

    // Bootstrap administrators
    if config.bootstrap_admins.is_empty() {
        warn!("BOOTSTRAP_ADMINS is empty; only existing grants can manage economies");
    } else {
        queries::bootstrap_admins(
            &db_pool,
            &config.bootstrap_admins,
            PermissionSet::MANAGE_ECONOMIES | PermissionSet::MANAGE_PERMISSIONS,
        )
        .await
        .context("Failed to grant bootstrap administrators")?;
        info!(admins = config.bootstrap_admins.len(), "Bootstrap administrators granted");
    }

    // Build the command tree once; it is read-only from here on
    let tree = economy::build_tree().context("Invalid command tree")?;
    info!(commands = tree.len(), "Command tree built");

    // Build application state
    let grants = Arc::new(PgGrantStore::new(db_pool.clone()));
    let state = api::AppState::new(db_pool, config.clone(), grants, tree);

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");

    Ok(())
}
