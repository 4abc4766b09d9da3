//! Project document model: sections, questions, versions and stats.
//!
//! A [`Project`] is persisted as one whole document. Sections and questions
//! carry stable UUIDv7 ids; their position is derived on demand and only used
//! for ordering.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{new_id, EntityId, Timestamp, UserId};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Personal,
    Team,
}

/// Where the current answer text came from. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvenanceKind {
    Generated,
    Edited,
    Restored,
    #[default]
    Draft,
}

/// Governed review lifecycle of an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    #[default]
    Unassigned,
    Draft,
    Review,
    Approved,
}

impl ReviewState {
    pub const ALL: [ReviewState; 4] = [
        ReviewState::Unassigned,
        ReviewState::Draft,
        ReviewState::Review,
        ReviewState::Approved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReviewState::Unassigned => "unassigned",
            ReviewState::Draft => "draft",
            ReviewState::Review => "review",
            ReviewState::Approved => "approved",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge shown next to an answer. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayBadge {
    Draft,
    InReview,
    Approved,
    Final,
}

/// What kind of change superseded the content captured in a [`Version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Generated,
    Edited,
    Approved,
    Restored,
    Draft,
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionAuthor {
    pub uid: UserId,
    pub name: String,
}

/// Immutable snapshot of a previous answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: EntityId,
    pub content: String,
    pub edited_at: Timestamp,
    pub edited_by: VersionAuthor,
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<u8>,
}

/// Content displaced by a restore, waiting to be written to history on the
/// next snapshotting edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSnapshot {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<u8>,
    pub displaced_at: Timestamp,
    pub displaced_by: VersionAuthor,
}

// ---------------------------------------------------------------------------
// Question / Section
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Question {
    pub id: EntityId,
    pub text: String,
    pub response: String,
    pub status: ProvenanceKind,
    #[serde(rename = "workflowStatus")]
    pub review_state: ReviewState,
    pub trust_score: Option<u8>,
    pub sources: Vec<String>,
    pub assigned_to: Option<String>,
    pub assigned_by: Option<String>,
    pub assigned_at: Option<Timestamp>,
    pub locked_by: Option<UserId>,
    pub locked_by_name: Option<String>,
    pub locked_at: Option<Timestamp>,
    pub approved_by: Option<String>,
    pub approved_at: Option<Timestamp>,
    pub versions: Vec<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_snapshot: Option<PendingSnapshot>,
    pub last_edited_at: Option<Timestamp>,
    pub last_edited_by: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// A question counts as answered once its response has non-blank text.
    pub fn is_answered(&self) -> bool {
        !self.response.trim().is_empty()
    }

    pub fn is_approved(&self) -> bool {
        self.review_state == ReviewState::Approved
    }

    pub fn version(&self, version_id: EntityId) -> Option<&Version> {
        self.versions.iter().find(|v| v.id == version_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Section {
    pub id: EntityId,
    pub title: String,
    pub questions: Vec<Question>,
}

impl Section {
    pub fn new<I, S>(title: impl Into<String>, questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: new_id(),
            title: title.into(),
            questions: questions.into_iter().map(Question::new).collect(),
        }
    }
}

/// Sort key of a question: section index, then index within the section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuestionPosition {
    pub section: usize,
    pub question: usize,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_questions: usize,
    pub answered: usize,
    pub approved: usize,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: EntityId,
    pub name: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub stats: Stats,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub finalized_at: Option<Timestamp>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        owner_id: impl Into<UserId>,
        sections: Vec<Section>,
        now: Timestamp,
    ) -> Self {
        let mut project = Self {
            id: new_id(),
            name: name.into(),
            owner_id: owner_id.into(),
            team_id: None,
            visibility: Visibility::Personal,
            sections,
            stats: Stats::default(),
            created_at: now,
            updated_at: now,
            finalized_at: None,
        };
        project.stats = crate::stats::compute(&project);
        project
    }

    /// Move the project into a team workspace. Writes still go through the
    /// owner's path.
    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self.visibility = Visibility::Team;
        self
    }

    /// The single consistency domain every collaborator writes through.
    pub fn storage_path(&self) -> String {
        format!("users/{}/projects/{}", self.owner_id, self.id)
    }

    /// All questions in display order with their positions.
    pub fn questions(&self) -> impl Iterator<Item = (QuestionPosition, &Question)> {
        self.sections.iter().enumerate().flat_map(|(si, section)| {
            section.questions.iter().enumerate().map(move |(qi, q)| {
                (
                    QuestionPosition {
                        section: si,
                        question: qi,
                    },
                    q,
                )
            })
        })
    }

    pub fn find_question(&self, id: EntityId) -> Option<(QuestionPosition, &Question)> {
        self.questions().find(|(_, q)| q.id == id)
    }

    pub fn question(&self, id: EntityId) -> Result<&Question, CoreError> {
        self.find_question(id)
            .map(|(_, q)| q)
            .ok_or_else(|| question_not_found(id))
    }

    pub fn question_mut(&mut self, id: EntityId) -> Result<&mut Question, CoreError> {
        self.sections
            .iter_mut()
            .flat_map(|s| s.questions.iter_mut())
            .find(|q| q.id == id)
            .ok_or_else(|| question_not_found(id))
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    pub fn badge(&self, question: &Question) -> DisplayBadge {
        match question.review_state {
            ReviewState::Unassigned | ReviewState::Draft => DisplayBadge::Draft,
            ReviewState::Review => DisplayBadge::InReview,
            ReviewState::Approved if self.is_finalized() => DisplayBadge::Final,
            ReviewState::Approved => DisplayBadge::Approved,
        }
    }
}

pub(crate) fn question_not_found(id: EntityId) -> CoreError {
    CoreError::NotFound {
        entity: "question",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample() -> Project {
        Project::new(
            "Security questionnaire",
            "owner-1",
            vec![
                Section::new("General", ["Q1", "Q2"]),
                Section::new("Security", ["Q3"]),
            ],
            Utc::now(),
        )
    }

    #[test]
    fn test_questions_iterate_in_position_order() {
        let project = sample();
        let positions: Vec<_> = project
            .questions()
            .map(|(p, _)| (p.section, p.question))
            .collect();
        assert_eq!(positions, vec![(0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn test_lookup_survives_section_reorder() {
        let mut project = sample();
        let q3 = project.sections[1].questions[0].id;
        project.sections.swap(0, 1);

        let (pos, q) = project.find_question(q3).unwrap();
        assert_eq!(q.text, "Q3");
        assert_eq!(pos, QuestionPosition { section: 0, question: 0 });
    }

    #[test]
    fn test_missing_question_is_not_found() {
        let project = sample();
        let err = project.question(new_id()).unwrap_err();
        assert!(err.to_string().contains("question"));
    }

    #[test]
    fn test_badge_reflects_finalization() {
        let mut project = sample();
        let id = project.sections[0].questions[0].id;
        project.question_mut(id).unwrap().review_state = ReviewState::Approved;

        let q = project.question(id).unwrap().clone();
        assert_eq!(project.badge(&q), DisplayBadge::Approved);

        project.finalized_at = Some(Utc::now());
        assert_eq!(project.badge(&q), DisplayBadge::Final);
    }

    #[test]
    fn test_question_serializes_workflow_status_field() {
        let q = Question::new("Do you encrypt data at rest?");
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["workflowStatus"], "unassigned");
        assert_eq!(json["status"], "draft");
        assert!(json.get("pendingSnapshot").is_none());
    }

    #[test]
    fn test_storage_path_uses_owner() {
        let project = sample().with_team("team-9");
        assert!(project.storage_path().starts_with("users/owner-1/projects/"));
        assert_eq!(project.visibility, Visibility::Team);
    }
}
