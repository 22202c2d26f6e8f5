use std::sync::Arc;

use anyhow::{Context, Result};
use price_exchange::{
    InMemoryPriceStore, PgPriceStore, PriceStore, build_router_with_limit,
    config::{AppConfig, DatabaseBackend},
    state::AppState,
};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "price_exchange=debug,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("failed to load application configuration")?;

    let store: Arc<dyn PriceStore> = match &config.database {
        DatabaseBackend::Postgres(pg) => {
            info!(host = %pg.host, port = pg.port, database = %pg.database, "database backend: postgres");
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect_with(pg.connect_options())
                .await
                .context("failed to connect to PostgreSQL")?;
            info!("database connection established");
            Arc::new(PgPriceStore::new(pool))
        }
        DatabaseBackend::Memory => {
            info!("database backend: in-memory");
            Arc::new(InMemoryPriceStore::new())
        }
    };

    store
        .init()
        .await
        .context("failed to initialize prices table")?;

    let app = build_router_with_limit(AppState::new(store), config.max_upload_bytes);

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, "price exchange started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves once the process is asked to stop; in-flight requests then drain.
async fn shutdown_signal() {
    let received = tokio::select! {
        () = interrupt() => "SIGINT",
        () = terminate() => "SIGTERM",
    };
    info!(signal = received, "shutdown requested, draining connections");
}

async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(err) => {
            error!(error = %err, "failed to listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
