//! Repository for the `projects` table.

use rfpdesk_core::types::{EntityId, Revision};
use sqlx::PgPool;

use crate::models::project::ProjectRow;

/// Column list for `projects` queries.
const COLUMNS: &str = "owner_id, id, name, document, revision, created_at, updated_at";

pub struct ProjectRepo;

impl ProjectRepo {
    pub async fn get(
        pool: &PgPool,
        owner_id: &str,
        id: EntityId,
    ) -> Result<Option<ProjectRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE owner_id = $1 AND id = $2");
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(owner_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Projects owned by `owner_id`, most recently updated first.
    pub async fn list_for_owner(pool: &PgPool, owner_id: &str) -> Result<Vec<ProjectRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM projects WHERE owner_id = $1 ORDER BY updated_at DESC"
        );
        sqlx::query_as::<_, ProjectRow>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Insert a new project at revision 1.
    ///
    /// Returns `None` when a project with this id already exists.
    pub async fn insert(
        pool: &PgPool,
        owner_id: &str,
        id: EntityId,
        name: &str,
        document: &serde_json::Value,
    ) -> Result<Option<Revision>, sqlx::Error> {
        sqlx::query_scalar::<_, Revision>(
            "INSERT INTO projects (owner_id, id, name, document) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (owner_id, id) DO NOTHING \
             RETURNING revision",
        )
        .bind(owner_id)
        .bind(id)
        .bind(name)
        .bind(document)
        .fetch_optional(pool)
        .await
    }

    /// Replace the document if the stored revision still equals `expected`.
    ///
    /// Returns the new revision, or `None` when the row is missing or has
    /// moved on.
    pub async fn update_if_revision(
        pool: &PgPool,
        owner_id: &str,
        id: EntityId,
        name: &str,
        document: &serde_json::Value,
        expected: Revision,
    ) -> Result<Option<Revision>, sqlx::Error> {
        sqlx::query_scalar::<_, Revision>(
            "UPDATE projects \
             SET document = $4, name = $3, revision = revision + 1, updated_at = NOW() \
             WHERE owner_id = $1 AND id = $2 AND revision = $5 \
             RETURNING revision",
        )
        .bind(owner_id)
        .bind(id)
        .bind(name)
        .bind(document)
        .bind(expected)
        .fetch_optional(pool)
        .await
    }

    /// Unconditional last-write-wins write. Creates the row if needed.
    pub async fn upsert(
        pool: &PgPool,
        owner_id: &str,
        id: EntityId,
        name: &str,
        document: &serde_json::Value,
    ) -> Result<Revision, sqlx::Error> {
        sqlx::query_scalar::<_, Revision>(
            "INSERT INTO projects (owner_id, id, name, document) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (owner_id, id) DO UPDATE \
             SET document = EXCLUDED.document, name = EXCLUDED.name, \
                 revision = projects.revision + 1, updated_at = NOW() \
             RETURNING revision",
        )
        .bind(owner_id)
        .bind(id)
        .bind(name)
        .bind(document)
        .fetch_one(pool)
        .await
    }

    /// Current revision, or `None` if the project does not exist.
    pub async fn revision(
        pool: &PgPool,
        owner_id: &str,
        id: EntityId,
    ) -> Result<Option<Revision>, sqlx::Error> {
        sqlx::query_scalar::<_, Revision>(
            "SELECT revision FROM projects WHERE owner_id = $1 AND id = $2",
        )
        .bind(owner_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
