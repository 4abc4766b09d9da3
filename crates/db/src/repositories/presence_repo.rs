//! Repository for the `user_presence` table.

use rfpdesk_core::presence::{color_for, PresenceInfo};
use rfpdesk_core::types::EntityId;
use sqlx::PgPool;

use crate::models::presence::PresenceRow;

/// Column list for `user_presence` queries.
const COLUMNS: &str = "id, project_id, user_id, name, avatar_url, color, is_typing, \
                       typing_at, last_seen_at, is_active, created_at, updated_at";

pub struct PresenceRepo;

impl PresenceRepo {
    /// Record or refresh a user's presence on a project.
    ///
    /// Inserts a new active row or bumps `last_seen_at` on the existing one.
    pub async fn heartbeat(
        pool: &PgPool,
        project_id: EntityId,
        user_id: &str,
        info: &PresenceInfo,
    ) -> Result<PresenceRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_presence (project_id, user_id, name, avatar_url, color) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id, project_id) WHERE is_active = true \
             DO UPDATE SET name = EXCLUDED.name, avatar_url = EXCLUDED.avatar_url, \
                           last_seen_at = NOW(), updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PresenceRow>(&query)
            .bind(project_id)
            .bind(user_id)
            .bind(&info.name)
            .bind(&info.avatar_url)
            .bind(color_for(user_id))
            .fetch_one(pool)
            .await
    }

    /// Returns `true` if an active row was updated.
    pub async fn set_typing(
        pool: &PgPool,
        project_id: EntityId,
        user_id: &str,
        typing: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_presence SET is_typing = $3, typing_at = NOW(), updated_at = NOW() \
             WHERE project_id = $1 AND user_id = $2 AND is_active = true",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(typing)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a user as gone from a project.
    pub async fn leave(pool: &PgPool, project_id: EntityId, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_presence SET is_active = false, is_typing = false, updated_at = NOW() \
             WHERE project_id = $1 AND user_id = $2 AND is_active = true",
        )
        .bind(project_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Active users on a project seen within the last `stale_secs` seconds.
    ///
    /// A typing flag not refreshed within the same window is reported as
    /// `false`, however recent the user's heartbeat.
    pub async fn get_present(
        pool: &PgPool,
        project_id: EntityId,
        stale_secs: i64,
    ) -> Result<Vec<PresenceRow>, sqlx::Error> {
        sqlx::query_as::<_, PresenceRow>(
            "SELECT id, project_id, user_id, name, avatar_url, color, \
                    (is_typing AND typing_at >= NOW() - make_interval(secs => $2)) IS TRUE AS is_typing, \
                    typing_at, last_seen_at, is_active, created_at, updated_at \
             FROM user_presence \
             WHERE project_id = $1 AND is_active = true \
               AND last_seen_at >= NOW() - make_interval(secs => $2) \
             ORDER BY last_seen_at DESC",
        )
        .bind(project_id)
        .bind(stale_secs as f64)
        .fetch_all(pool)
        .await
    }

    /// Deactivate every row not seen for `stale_secs` seconds. Returns the
    /// number of rows swept.
    pub async fn cleanup_stale(pool: &PgPool, stale_secs: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_presence SET is_active = false, is_typing = false, updated_at = NOW() \
             WHERE is_active = true AND last_seen_at < NOW() - make_interval(secs => $1)",
        )
        .bind(stale_secs as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
