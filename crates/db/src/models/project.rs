//! Project document rows.

use rfpdesk_core::types::{EntityId, Revision, Timestamp};
use rfpdesk_core::{Project, StoredProject};
use serde::Deserialize;
use sqlx::FromRow;

use crate::error::DbError;

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub owner_id: String,
    pub id: EntityId,
    pub name: String,
    pub document: serde_json::Value,
    pub revision: Revision,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ProjectRow {
    /// Decode the JSONB document.
    pub fn into_stored(self) -> Result<StoredProject, DbError> {
        let project: Project = serde_json::from_value(self.document)?;
        Ok(StoredProject {
            project,
            revision: self.revision,
        })
    }
}

/// Encode a project for the `document` column.
pub fn encode_document(project: &Project) -> Result<serde_json::Value, DbError> {
    Ok(serde_json::to_value(project)?)
}

/// Payload of a `project_changes` notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProjectChange {
    pub owner_id: String,
    pub project_id: EntityId,
    pub revision: Revision,
}

impl ProjectChange {
    pub fn parse(payload: &str) -> Result<Self, DbError> {
        Ok(serde_json::from_str(payload)?)
    }
}
