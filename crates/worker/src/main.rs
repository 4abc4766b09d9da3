use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod background;
mod config;

use config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rfpdesk_worker=debug,rfpdesk_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    tracing::info!(
        max_connections = config.db_max_connections,
        sweep_interval_secs = config.presence_sweep_interval.as_secs(),
        presence_stale_secs = config.presence_stale_secs,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = rfpdesk_db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    rfpdesk_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    rfpdesk_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Background tasks ---
    let cancel = CancellationToken::new();
    let store = Arc::new(rfpdesk_db::PgProjectStore::new(pool.clone()));

    let sweep_handle = tokio::spawn(background::presence_sweep::run(
        pool.clone(),
        config.presence_sweep_interval,
        config.presence_stale_secs,
        cancel.clone(),
    ));
    let listener_handle = tokio::spawn(background::change_feed::listen(
        Arc::clone(&store),
        cancel.clone(),
    ));
    let change_log_handle = tokio::spawn(background::change_feed::log_changes(
        Arc::clone(&store),
        cancel.clone(),
    ));
    tracing::info!("Background tasks started (presence sweep, change listener)");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl-C handler")?;
    tracing::info!("Shutdown requested");

    // --- Shutdown ---
    cancel.cancel();
    for handle in [sweep_handle, listener_handle, change_log_handle] {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    pool.close().await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}
