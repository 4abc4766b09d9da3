//! Contracts for the external services the workflow engine calls into:
//! document persistence, notification delivery and answer generation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::model::Project;
use crate::types::{EntityId, Revision};

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// A project document together with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProject {
    pub project: Project,
    pub revision: Revision,
}

/// Whole-document project persistence.
///
/// Every collaborator writes through the owner's path, so one project is one
/// consistency domain. `save_project` with `expected` set is a
/// compare-and-swap on the revision; with `None` it is a plain
/// last-write-wins replace.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, owner_id: &str, project_id: EntityId)
        -> Result<StoredProject, CoreError>;

    /// Returns the new revision. A revision mismatch is `CoreError::Conflict`.
    async fn save_project(
        &self,
        owner_id: &str,
        project: &Project,
        expected: Option<Revision>,
    ) -> Result<Revision, CoreError>;

    /// Change feed for every project in the store. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<StoredProject>;
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Known notification kinds.
pub mod notification_kinds {
    pub const ASSIGNMENT: &str = "assignment";
    pub const REASSIGNMENT: &str = "reassignment";
    pub const STATUS_CHANGE: &str = "status_change";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: String,
}

/// Fire-and-forget delivery. Callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user: &str, notification: Notification) -> Result<(), CoreError>;
}

// ---------------------------------------------------------------------------
// Answer generation
// ---------------------------------------------------------------------------

/// Answer used when generation fails.
pub const FALLBACK_ANSWER: &str =
    "An answer could not be generated automatically. Please draft a response manually.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAnswer {
    pub response: String,
    pub trust_score: u8,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl GeneratedAnswer {
    pub fn fallback() -> Self {
        Self {
            response: FALLBACK_ANSWER.to_string(),
            trust_score: 0,
            sources: Vec::new(),
        }
    }
}

/// Opaque, possibly slow, possibly failing answer drafting.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question_text: &str) -> Result<GeneratedAnswer, CoreError>;
}
