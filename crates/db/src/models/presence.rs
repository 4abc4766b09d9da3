//! Persisted presence rows.

use rfpdesk_core::presence::PresenceEntry;
use rfpdesk_core::types::{EntityId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_presence` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PresenceRow {
    pub id: i64,
    pub project_id: EntityId,
    pub user_id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub color: String,
    pub is_typing: bool,
    pub typing_at: Option<Timestamp>,
    pub last_seen_at: Timestamp,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<PresenceRow> for PresenceEntry {
    fn from(row: PresenceRow) -> Self {
        PresenceEntry {
            user_id: row.user_id,
            name: row.name,
            avatar_url: row.avatar_url,
            color: row.color,
            typing: row.is_typing,
            typing_at: row.typing_at,
            last_seen: row.last_seen_at,
        }
    }
}
