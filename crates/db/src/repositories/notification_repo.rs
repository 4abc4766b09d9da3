//! Repository for the `notifications` table.

use rfpdesk_core::Notification;
use sqlx::PgPool;

use crate::models::notification::NotificationRow;

/// Column list for `notifications` queries.
const COLUMNS: &str = "id, recipient, kind, title, message, link, is_read, created_at";

pub struct NotificationRepo;

impl NotificationRepo {
    pub async fn insert(
        pool: &PgPool,
        recipient: &str,
        notification: &Notification,
    ) -> Result<NotificationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications (recipient, kind, title, message, link) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(recipient)
            .bind(&notification.kind)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(&notification.link)
            .fetch_one(pool)
            .await
    }

    /// Unread notifications for a recipient, newest first.
    pub async fn list_unread(
        pool: &PgPool,
        recipient: &str,
        limit: i64,
    ) -> Result<Vec<NotificationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE recipient = $1 AND is_read = false \
             ORDER BY created_at DESC LIMIT $2"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(recipient)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Only the recipient can mark their notification read.
    pub async fn mark_read(pool: &PgPool, id: i64, recipient: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true \
             WHERE id = $1 AND recipient = $2 AND is_read = false",
        )
        .bind(id)
        .bind(recipient)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
