//! evauth Event API
//!
//! Serves the platform's event log to API callers, filtered and gated by the
//! permissions each caller holds on the resources events target.

use std::sync::Arc;

use anyhow::Result;
use evauth_event_api::{
    api,
    config::{self, StoreBackend},
    db::Database,
    state::AppState,
    store::memory::{MemoryCatalog, MemoryEventStore, Seed},
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to EVAUTH_LOG_LEVEL.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting evauth event API");
    info!(
        listen_addr = %config.listen_addr,
        store = ?config.store,
        node_listing = config.node_listing,
        authz_timeout = ?config.authz_timeout,
        "Configuration loaded"
    );

    let state = match config.store {
        StoreBackend::Memory => {
            let seed = match &config.seed_file {
                Some(path) => {
                    info!(seed_file = %path.display(), "Loading seed");
                    Seed::load(path)?
                }
                None => Seed::default(),
            };
            let catalog = Arc::new(MemoryCatalog::from_seed(&seed));
            let events = Arc::new(MemoryEventStore::with_events(seed.events));
            AppState::new(
                events,
                catalog.clone(),
                &catalog.catalog(config.node_listing),
                config.authz_timeout,
            )
        }
        StoreBackend::Postgres => {
            let db = match Database::connect(&config.database).await {
                Ok(db) => db,
                Err(e) => {
                    error!(error = %e, "Failed to connect to database");
                    return Err(e.into());
                }
            };

            if config.dev_mode {
                info!("Running database migrations (dev mode)");
                if let Err(e) = db.run_migrations().await {
                    error!(error = %e, "Failed to run migrations");
                    return Err(e.into());
                }
            }

            AppState::new(
                Arc::new(db.event_store()),
                Arc::new(db.grants()),
                &db.catalog(config.node_listing),
                config.authz_timeout,
            )
        }
    };

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Received shutdown signal");
        })
        .await?;

    info!("Event API shutdown complete");
    Ok(())
}
