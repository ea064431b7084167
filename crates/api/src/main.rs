use anyhow::{Context, Result};
use domain::store::FormStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use form_backend_api::app::{create_app, AppState};
use form_backend_api::config::{Config, StoreBackend};
use form_backend_api::middleware::{self, logging::init_logging};
use form_backend_api::services::build_transport;
use persistence::{InMemoryFormStore, PgFormStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging);
    middleware::init_metrics().context("Failed to install metrics recorder")?;

    info!("Starting Form Backend API v{}", env!("CARGO_PKG_VERSION"));

    let (store, pool) = match config.store.backend {
        StoreBackend::Postgres => {
            let db_config = persistence::db::DatabaseConfig::from(&config.database);
            let pool = persistence::db::create_pool(&db_config)
                .await
                .context("Failed to connect to database")?;

            info!("Running database migrations...");
            persistence::db::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            info!("Migrations completed");

            let store: Arc<dyn FormStore> = Arc::new(PgFormStore::new(pool.clone()));
            (store, Some(pool))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            let store: Arc<dyn FormStore> = Arc::new(InMemoryFormStore::new());
            (store, None)
        }
    };

    let mailer = build_transport(&config.email).context("Failed to build mail transport")?;
    info!(provider = mailer.name(), "Mail transport ready");

    let addr = config.socket_addr().context("Invalid server address")?;

    let mut state =
        AppState::new(config, store, mailer).context("Failed to configure identity verifier")?;
    if let Some(pool) = pool {
        state = state.with_pool(pool);
    }
    if let Some(limiter) = &state.rate_limiter {
        middleware::spawn_pruning(limiter.clone(), middleware::PRUNE_INTERVAL);
    }
    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
