//! Persisted user notifications.

use rfpdesk_core::types::Timestamp;
use rfpdesk_core::Notification;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationRow {
    pub id: i64,
    pub recipient: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: String,
    pub is_read: bool,
    pub created_at: Timestamp,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            kind: row.kind,
            title: row.title,
            message: row.message,
            link: row.link,
        }
    }
}
