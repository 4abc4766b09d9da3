//! Bulk and single-question assignment planning.
//!
//! Bulk assignment is a deterministic round-robin over unassigned questions in
//! position order. The plan is computed as a preview first so the caller can
//! show who receives the remainder before anything is written.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::CoreError;
use crate::model::{Project, Question, QuestionPosition, ReviewState};
use crate::types::{EntityId, Timestamp};

/// Maximum number of editors in one bulk assignment.
pub const MAX_EDITORS_PER_BATCH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub question_id: EntityId,
    pub position: QuestionPosition,
    pub editor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorLoad {
    pub editor: String,
    pub count: usize,
}

/// A computed, not yet committed, bulk assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentPreview {
    pub assignments: Vec<Assignment>,
    pub loads: Vec<EditorLoad>,
    /// `floor(questions / editors)`.
    pub base_share: usize,
    /// `questions mod editors`; this many leading editors get one extra.
    pub remainder: usize,
}

impl AssignmentPreview {
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Editors receiving `base_share + 1`, in input order.
    pub fn extra_editors(&self) -> impl Iterator<Item = &str> {
        self.loads
            .iter()
            .take(self.remainder)
            .map(|l| l.editor.as_str())
    }
}

/// Emitted for every committed assignment; the caller turns these into
/// notifications after the write lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentNotice {
    pub question_id: EntityId,
    pub question_text: String,
    pub editor: String,
    pub assigned_by: String,
}

/// Outcome of a single-question assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignOutcome {
    Assigned { previous: Option<String> },
    /// Already assigned to this editor; nothing written.
    Unchanged,
    /// Assigned to someone else and the caller did not confirm the override.
    NeedsConfirmation { current: String },
}

/// Reject empty, blank, duplicate or oversized editor lists.
pub fn validate_editors(editors: &[String]) -> Result<(), CoreError> {
    if editors.is_empty() {
        return Err(CoreError::Validation(
            "Select at least one editor".to_string(),
        ));
    }
    if editors.len() > MAX_EDITORS_PER_BATCH {
        return Err(CoreError::Validation(format!(
            "At most {MAX_EDITORS_PER_BATCH} editors may be selected, got {}",
            editors.len()
        )));
    }
    let mut seen = HashSet::new();
    for (i, editor) in editors.iter().enumerate() {
        if editor.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Editor at index {i} must not be empty"
            )));
        }
        if !seen.insert(editor.to_ascii_lowercase()) {
            return Err(CoreError::Validation(format!(
                "Editor '{editor}' is selected more than once"
            )));
        }
    }
    Ok(())
}

/// Round-robin `questions` over `editors`: after sorting by position,
/// question `i` goes to `editors[i mod N]`.
pub fn distribute(
    questions: &[(QuestionPosition, EntityId)],
    editors: &[String],
) -> Result<Vec<Assignment>, CoreError> {
    validate_editors(editors)?;

    let mut ordered = questions.to_vec();
    ordered.sort_by_key(|(pos, _)| *pos);

    Ok(ordered
        .into_iter()
        .enumerate()
        .map(|(i, (position, question_id))| Assignment {
            question_id,
            position,
            editor: editors[i % editors.len()].clone(),
        })
        .collect())
}

/// Plan a bulk assignment of every question without an assignee.
pub fn preview(project: &Project, editors: &[String]) -> Result<AssignmentPreview, CoreError> {
    let unassigned: Vec<_> = project
        .questions()
        .filter(|(_, q)| q.assigned_to.is_none())
        .map(|(pos, q)| (pos, q.id))
        .collect();

    let assignments = distribute(&unassigned, editors)?;
    let loads = editors
        .iter()
        .map(|editor| EditorLoad {
            editor: editor.clone(),
            count: assignments.iter().filter(|a| &a.editor == editor).count(),
        })
        .collect();

    Ok(AssignmentPreview {
        base_share: assignments.len() / editors.len(),
        remainder: assignments.len() % editors.len(),
        assignments,
        loads,
    })
}

/// Set the assignee fields. An `unassigned` question enters `draft`.
pub(crate) fn stamp(question: &mut Question, editor: &str, assigned_by: &str, now: Timestamp) {
    question.assigned_to = Some(editor.to_string());
    question.assigned_by = Some(assigned_by.to_string());
    question.assigned_at = Some(now);
    if question.review_state == ReviewState::Unassigned {
        question.review_state = ReviewState::Draft;
    }
}

/// Assign one question, gating reassignment behind `confirm_reassign`.
pub fn assign_one(
    question: &mut Question,
    editor: &str,
    assigned_by: &str,
    confirm_reassign: bool,
    now: Timestamp,
) -> AssignOutcome {
    let previous = question.assigned_to.clone();
    match previous.as_deref() {
        Some(current) if current.eq_ignore_ascii_case(editor) => AssignOutcome::Unchanged,
        Some(current) if !confirm_reassign => AssignOutcome::NeedsConfirmation {
            current: current.to_string(),
        },
        _ => {
            stamp(question, editor, assigned_by, now);
            AssignOutcome::Assigned { previous }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;
    use crate::model::Section;
    use crate::types::new_id;

    fn editors(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn pool(n: usize) -> Vec<(QuestionPosition, EntityId)> {
        (0..n)
            .map(|i| {
                (
                    QuestionPosition {
                        section: i / 4,
                        question: i % 4,
                    },
                    new_id(),
                )
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // distribute
    // -----------------------------------------------------------------------

    #[test]
    fn test_seven_questions_three_editors() {
        let plan = distribute(&pool(7), &editors(&["alice", "bob", "carol"])).unwrap();
        let count = |who: &str| plan.iter().filter(|a| a.editor == who).count();
        assert_eq!(count("alice"), 3);
        assert_eq!(count("bob"), 2);
        assert_eq!(count("carol"), 2);
    }

    #[test]
    fn test_fairness_across_sizes() {
        let names = editors(&["e1", "e2", "e3", "e4"]);
        for n in 0..25 {
            let plan = distribute(&pool(n), &names).unwrap();
            let k = names.len();
            for (idx, name) in names.iter().enumerate() {
                let got = plan.iter().filter(|a| &a.editor == name).count();
                let expected = n / k + usize::from(idx < n % k);
                assert_eq!(got, expected, "n={n} editor={name}");
            }
        }
    }

    #[test]
    fn test_assignment_follows_position_order() {
        let mut questions = pool(3);
        questions.reverse();
        let plan = distribute(&questions, &editors(&["a", "b", "c"])).unwrap();
        let positions: Vec<_> = plan.iter().map(|a| a.position.question).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(plan[0].editor, "a");
    }

    #[test]
    fn test_empty_editor_list_rejected() {
        let err = distribute(&pool(3), &[]).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn test_duplicate_editor_rejected() {
        let err = distribute(&pool(3), &editors(&["a@x.com", "A@x.com"])).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("more than once"));
    }

    // -----------------------------------------------------------------------
    // preview
    // -----------------------------------------------------------------------

    #[test]
    fn test_preview_skips_assigned_questions_and_reports_remainder() {
        let mut project = Project::new(
            "P",
            "owner",
            vec![Section::new("S", ["q1", "q2", "q3", "q4", "q5", "q6"])],
            Utc::now(),
        );
        project.sections[0].questions[0].assigned_to = Some("zed".into());

        let plan = preview(&project, &editors(&["alice", "bob"])).unwrap();
        assert_eq!(plan.assignments.len(), 5);
        assert_eq!(plan.base_share, 2);
        assert_eq!(plan.remainder, 1);
        assert_eq!(plan.extra_editors().collect::<Vec<_>>(), vec!["alice"]);
        assert_eq!(plan.loads[0].count, 3);
        assert_eq!(plan.loads[1].count, 2);
    }

    // -----------------------------------------------------------------------
    // assign_one
    // -----------------------------------------------------------------------

    #[test]
    fn test_first_assignment_enters_draft() {
        let mut q = Question::new("q");
        let outcome = assign_one(&mut q, "alice", "owner@x.com", false, Utc::now());
        assert_eq!(outcome, AssignOutcome::Assigned { previous: None });
        assert_eq!(q.review_state, ReviewState::Draft);
        assert_eq!(q.assigned_by.as_deref(), Some("owner@x.com"));
    }

    #[test]
    fn test_reassignment_requires_confirmation() {
        let mut q = Question::new("q");
        assign_one(&mut q, "alice", "owner", false, Utc::now());

        let outcome = assign_one(&mut q, "bob", "owner", false, Utc::now());
        assert_eq!(
            outcome,
            AssignOutcome::NeedsConfirmation {
                current: "alice".into()
            }
        );
        assert_eq!(q.assigned_to.as_deref(), Some("alice"));

        let outcome = assign_one(&mut q, "bob", "owner", true, Utc::now());
        assert_eq!(
            outcome,
            AssignOutcome::Assigned {
                previous: Some("alice".into())
            }
        );
    }

    #[test]
    fn test_same_editor_is_unchanged() {
        let mut q = Question::new("q");
        assign_one(&mut q, "alice", "owner", false, Utc::now());
        assert_eq!(
            assign_one(&mut q, "ALICE", "owner", false, Utc::now()),
            AssignOutcome::Unchanged
        );
    }
}
