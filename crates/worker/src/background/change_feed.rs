//! Keeps the project change listener connected and logs what it delivers.

use std::sync::Arc;
use std::time::Duration;

use rfpdesk_core::ProjectStore;
use rfpdesk_db::PgProjectStore;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

/// Delay before reconnecting a dropped listener.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Run the LISTEN loop, reconnecting after failures, until `cancel` fires.
pub async fn listen(store: Arc<PgProjectStore>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Change listener stopping");
                return;
            }
            result = store.listen() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Change listener disconnected, reconnecting");
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

/// Log every project change pushed through the store's feed.
pub async fn log_changes(store: Arc<PgProjectStore>, cancel: CancellationToken) {
    let mut rx = store.subscribe();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(stored) => {
                    let stats = stored.project.stats;
                    tracing::debug!(
                        project_id = %stored.project.id,
                        revision = stored.revision,
                        answered = stats.answered,
                        approved = stats.approved,
                        progress = stats.progress,
                        "Project changed"
                    );
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Change log lagged behind, some changes were skipped");
                }
                Err(RecvError::Closed) => {
                    tracing::info!("Change feed closed");
                    break;
                }
            }
        }
    }
}
