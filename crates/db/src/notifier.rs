//! Notification sink that stores notifications for later retrieval.

use async_trait::async_trait;
use rfpdesk_core::{CoreError, Notification, Notifier};
use sqlx::PgPool;

use crate::error::persistence;
use crate::repositories::NotificationRepo;

pub struct PgNotifier {
    pool: PgPool,
}

impl PgNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify(&self, user: &str, notification: Notification) -> Result<(), CoreError> {
        let row = NotificationRepo::insert(&self.pool, user, &notification)
            .await
            .map_err(persistence)?;
        tracing::debug!(notification_id = row.id, recipient = %user, kind = %row.kind, "Notification stored");
        Ok(())
    }
}
