//! Periodic deactivation of stale presence rows.

use std::time::Duration;

use rfpdesk_db::repositories::PresenceRepo;
use rfpdesk_db::DbPool;
use tokio_util::sync::CancellationToken;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(pool: DbPool, interval: Duration, stale_secs: i64, cancel: CancellationToken) {
    tracing::info!(
        stale_secs,
        interval_secs = interval.as_secs(),
        "Presence sweep started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Presence sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                match PresenceRepo::cleanup_stale(&pool, stale_secs).await {
                    Ok(swept) if swept > 0 => {
                        tracing::info!(swept, "Presence sweep: deactivated stale users");
                    }
                    Ok(_) => {
                        tracing::debug!("Presence sweep: nothing stale");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Presence sweep failed");
                    }
                }
            }
        }
    }
}
