//! In-memory orchestration of one project's question set.
//!
//! [`CollaborativeDocument`] answers "may this actor do this to that question
//! right now" by composing the lock manager, version history, review state
//! machine and assignment planner, applies the mutation, and recomputes the
//! aggregate stats. It performs no I/O; the caller persists
//! [`CollaborativeDocument::into_project`] as a whole-document write.

use serde::Serialize;

use crate::assignment::{self, AssignOutcome, AssignmentNotice, AssignmentPreview};
use crate::collaborators::GeneratedAnswer;
use crate::error::CoreError;
use crate::locking::{self, LockDecision, LockManager};
use crate::model::{ChangeType, Project, ProvenanceKind, Question, ReviewState, Stats, VersionAuthor};
use crate::roles::Actor;
use crate::stats;
use crate::types::{EntityId, Timestamp};
use crate::versioning::{self, Restored};
use crate::workflow;

/// Highest trust score an answer can carry.
pub const MAX_TRUST_SCORE: u8 = 100;

/// Returned by [`CollaborativeDocument::start_edit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditSession {
    pub question_id: EntityId,
    pub content: String,
    pub lock: LockDecision,
}

#[derive(Debug, Clone)]
pub struct CollaborativeDocument {
    project: Project,
    locks: LockManager,
}

impl CollaborativeDocument {
    pub fn new(project: Project) -> Self {
        Self::with_lock_manager(project, LockManager::new())
    }

    pub fn with_lock_manager(project: Project, locks: LockManager) -> Self {
        Self { project, locks }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn into_project(self) -> Project {
        self.project
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn question(&self, question_id: EntityId) -> Result<&Question, CoreError> {
        self.project.question(question_id)
    }

    /// Live lock holder on a question, if any.
    pub fn lock_holder(&self, question_id: EntityId, now: Timestamp) -> Result<Option<&str>, CoreError> {
        let question = self.project.question(question_id)?;
        Ok(self.locks.holder(question, now))
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Take the advisory lock and hand back the editable content.
    pub fn start_edit(
        &mut self,
        question_id: EntityId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<EditSession, CoreError> {
        actor.require_edit()?;
        let locks = self.locks;
        let question = self.project.question_mut(question_id)?;
        let lock = locks.try_acquire(question, &actor.uid, &actor.display_name, now);
        lock.clone().into_result()?;

        Ok(EditSession {
            question_id,
            content: question.response.clone(),
            lock,
        })
    }

    /// Drop the caller's lock without saving. Returns whether a lock was
    /// released.
    pub fn cancel_edit(&mut self, question_id: EntityId, actor: &Actor) -> Result<bool, CoreError> {
        let locks = self.locks;
        let question = self.project.question_mut(question_id)?;
        Ok(locks.release(question, &actor.uid))
    }

    /// Save new answer text.
    ///
    /// Snapshots the replaced text, marks the answer `edited` and always
    /// clears the lock. Changing an approved answer reopens it to `draft`, so
    /// it needs a role allowed to reopen plus `confirm_approved_overwrite`.
    pub fn save_edit(
        &mut self,
        question_id: EntityId,
        content: &str,
        actor: &Actor,
        confirm_approved_overwrite: bool,
        now: Timestamp,
    ) -> Result<&Question, CoreError> {
        actor.require_edit()?;
        let question = self.project.question_mut(question_id)?;
        let changed = question.response != content;

        if changed && question.is_approved() {
            workflow::authorize(actor, question, ReviewState::Draft)?;
            if !confirm_approved_overwrite {
                return Err(CoreError::ConfirmationRequired(
                    "This answer is approved; saving will reopen it for review".to_string(),
                ));
            }
        }

        versioning::snapshot_if_changed(question, content, &author(actor), ChangeType::Edited, now);
        if changed && question.is_approved() {
            question.review_state = ReviewState::Draft;
            workflow::clear_approval(question);
        }
        question.response = content.to_string();
        question.status = ProvenanceKind::Edited;
        question.last_edited_at = Some(now);
        question.last_edited_by = Some(actor.display_name.clone());
        locking::clear(question);

        self.touch(now, changed);
        self.project.question(question_id)
    }

    /// Replace the answer with a freshly generated draft.
    ///
    /// Review restarts at `draft`, so the actor must be allowed to make that
    /// transition. Refused while someone else holds a live lock.
    pub fn regenerate(
        &mut self,
        question_id: EntityId,
        answer: GeneratedAnswer,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<&Question, CoreError> {
        actor.require_edit()?;
        let locks = self.locks;
        let question = self.project.question_mut(question_id)?;

        if let Some(holder) = locks.holder(question, now) {
            if holder != actor.uid {
                return Err(CoreError::Locked {
                    holder: holder.to_string(),
                    remaining_ms: locks.remaining_ms(question, now).unwrap_or_default(),
                });
            }
        }
        if question.review_state != ReviewState::Draft {
            workflow::authorize(actor, question, ReviewState::Draft)?;
        }

        versioning::snapshot_if_changed(
            question,
            &answer.response,
            &author(actor),
            ChangeType::Generated,
            now,
        );
        question.response = answer.response;
        question.trust_score = Some(answer.trust_score.min(MAX_TRUST_SCORE));
        question.sources = answer.sources;
        question.status = ProvenanceKind::Generated;
        question.review_state = ReviewState::Draft;
        workflow::clear_approval(question);
        question.last_edited_at = Some(now);
        question.last_edited_by = Some(actor.display_name.clone());
        locking::clear(question);

        self.touch(now, true);
        self.project.question(question_id)
    }

    /// Bring back an earlier version as the current answer. Approved answers
    /// must be reopened first.
    pub fn restore_version(
        &mut self,
        question_id: EntityId,
        version_id: EntityId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Restored, CoreError> {
        actor.require_edit()?;
        let question = self.project.question_mut(question_id)?;
        if question.is_approved() {
            return Err(CoreError::Conflict(
                "Reopen the approved answer before restoring an earlier version".to_string(),
            ));
        }
        let restored = versioning::restore(question, version_id, &author(actor), now)?;
        self.touch(now, true);
        Ok(restored)
    }

    // -----------------------------------------------------------------------
    // Review workflow
    // -----------------------------------------------------------------------

    /// Move a question through the review workflow. Returns the previous
    /// state.
    pub fn change_status(
        &mut self,
        question_id: EntityId,
        target: ReviewState,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<ReviewState, CoreError> {
        let question = self.project.question_mut(question_id)?;
        let previous = workflow::apply(question, target, actor, now)?;
        self.touch(now, true);
        Ok(previous)
    }

    /// Mark the project final. Every question must be approved.
    pub fn finalize(&mut self, actor: &Actor, now: Timestamp) -> Result<(), CoreError> {
        actor.require_manager("finalize a project")?;
        let stats = self.recompute_stats();
        if stats.total_questions == 0 {
            return Err(CoreError::Validation(
                "A project without questions cannot be finalized".to_string(),
            ));
        }
        let pending = stats.total_questions - stats.approved;
        if pending > 0 {
            return Err(CoreError::Validation(format!(
                "{pending} question(s) are not approved yet"
            )));
        }
        self.project.finalized_at = Some(now);
        self.project.updated_at = now;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    /// Pure round-robin plan over unassigned questions.
    pub fn preview_assignment(&self, editors: &[String]) -> Result<AssignmentPreview, CoreError> {
        assignment::preview(&self.project, editors)
    }

    /// Apply a preview. Fails without writing anything if any previewed
    /// question has been assigned since the preview was taken.
    pub fn commit_assignment(
        &mut self,
        preview: &AssignmentPreview,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Vec<AssignmentNotice>, CoreError> {
        actor.require_manager("assign questions")?;

        for planned in &preview.assignments {
            let question = self.project.question(planned.question_id)?;
            if let Some(current) = &question.assigned_to {
                return Err(CoreError::Conflict(format!(
                    "Question {} was assigned to {current} after the preview; preview again",
                    planned.question_id
                )));
            }
        }

        let mut notices = Vec::with_capacity(preview.assignments.len());
        for planned in &preview.assignments {
            let question = self.project.question_mut(planned.question_id)?;
            assignment::stamp(question, &planned.editor, &actor.email, now);
            notices.push(AssignmentNotice {
                question_id: question.id,
                question_text: question.text.clone(),
                editor: planned.editor.clone(),
                assigned_by: actor.email.clone(),
            });
        }

        if !notices.is_empty() {
            self.touch(now, false);
        }
        Ok(notices)
    }

    /// Assign or reassign a single question.
    pub fn assign(
        &mut self,
        question_id: EntityId,
        editor: &str,
        actor: &Actor,
        confirm_reassign: bool,
        now: Timestamp,
    ) -> Result<(AssignOutcome, Option<AssignmentNotice>), CoreError> {
        actor.require_manager("assign questions")?;
        if editor.trim().is_empty() {
            return Err(CoreError::Validation("Editor must not be empty".to_string()));
        }
        let question = self.project.question_mut(question_id)?;
        let outcome = assignment::assign_one(question, editor, &actor.email, confirm_reassign, now);
        let notice = matches!(outcome, AssignOutcome::Assigned { .. }).then(|| AssignmentNotice {
            question_id,
            question_text: question.text.clone(),
            editor: editor.to_string(),
            assigned_by: actor.email.clone(),
        });
        if notice.is_some() {
            self.touch(now, false);
        }
        Ok((outcome, notice))
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub fn recompute_stats(&mut self) -> Stats {
        self.project.stats = stats::compute(&self.project);
        self.project.stats
    }

    fn touch(&mut self, now: Timestamp, content_or_state_changed: bool) {
        if content_or_state_changed {
            self.project.finalized_at = None;
        }
        self.project.updated_at = now;
        self.recompute_stats();
    }
}

fn author(actor: &Actor) -> VersionAuthor {
    VersionAuthor {
        uid: actor.uid.clone(),
        name: actor.display_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::Section;
    use crate::roles::Role;

    fn t(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn owner() -> Actor {
        Actor::new("u-owner", "owner@example.com", "Owner", Role::Owner)
    }

    fn editor(name: &str) -> Actor {
        Actor::new(
            format!("u-{name}"),
            format!("{name}@example.com"),
            name,
            Role::Editor,
        )
    }

    fn doc(questions: usize) -> CollaborativeDocument {
        let texts: Vec<String> = (1..=questions).map(|i| format!("Question {i}")).collect();
        CollaborativeDocument::new(Project::new(
            "RFP",
            "u-owner",
            vec![Section::new("General", texts)],
            t(0),
        ))
    }

    fn qid(doc: &CollaborativeDocument, i: usize) -> EntityId {
        doc.project().sections[0].questions[i].id
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    #[test]
    fn test_start_edit_locks_and_returns_content() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        let session = d.start_edit(q, &editor("alice"), t(0)).unwrap();
        assert_eq!(session.content, "");
        assert_eq!(d.lock_holder(q, t(1)).unwrap(), Some("u-alice"));
    }

    #[test]
    fn test_start_edit_reports_holder() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        d.start_edit(q, &editor("alice"), t(0)).unwrap();

        let err = d.start_edit(q, &editor("bob"), t(100)).unwrap_err();
        assert_matches!(err, CoreError::Locked { ref holder, remaining_ms: 200_000 } if holder == "u-alice");
        assert_eq!(err.remaining_secs(), Some(200));
    }

    #[test]
    fn test_viewer_cannot_start_edit() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        let viewer = Actor::new("u-v", "v@example.com", "V", Role::Viewer);
        assert_matches!(d.start_edit(q, &viewer, t(0)), Err(CoreError::Forbidden(_)));
    }

    #[test]
    fn test_save_releases_any_lock() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        d.start_edit(q, &editor("alice"), t(0)).unwrap();

        let saved = d.save_edit(q, "Yes, AES-256.", &editor("bob"), false, t(10)).unwrap();
        assert!(saved.locked_by.is_none());
        assert_eq!(saved.status, ProvenanceKind::Edited);
        assert_eq!(saved.last_edited_by.as_deref(), Some("bob"));
        assert_eq!(d.project().stats.answered, 1);
    }

    #[test]
    fn test_cancel_only_releases_own_lock() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        d.start_edit(q, &editor("alice"), t(0)).unwrap();
        assert!(!d.cancel_edit(q, &editor("bob")).unwrap());
        assert!(d.cancel_edit(q, &editor("alice")).unwrap());
    }

    #[test]
    fn test_overwriting_approved_answer_needs_confirmation() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        d.save_edit(q, "v1", &owner(), false, t(0)).unwrap();
        d.change_status(q, ReviewState::Draft, &owner(), t(1)).unwrap();
        d.change_status(q, ReviewState::Review, &owner(), t(2)).unwrap();
        d.change_status(q, ReviewState::Approved, &owner(), t(3)).unwrap();

        let err = d.save_edit(q, "v2", &owner(), false, t(4)).unwrap_err();
        assert_matches!(err, CoreError::ConfirmationRequired(_));

        // Unchanged text is not an overwrite.
        d.save_edit(q, "v1", &owner(), false, t(5)).unwrap();
        assert!(d.question(q).unwrap().is_approved());

        let saved = d.save_edit(q, "v2", &owner(), true, t(6)).unwrap();
        assert_eq!(saved.review_state, ReviewState::Draft);
        assert!(saved.approved_by.is_none());
    }

    #[test]
    fn test_editor_cannot_reopen_approved_answer_by_saving() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        d.assign(q, "alice@example.com", &owner(), false, t(0)).unwrap();
        d.save_edit(q, "v1", &editor("alice"), false, t(1)).unwrap();
        d.change_status(q, ReviewState::Review, &editor("alice"), t(2)).unwrap();
        d.change_status(q, ReviewState::Approved, &owner(), t(3)).unwrap();

        let err = d.save_edit(q, "v2", &editor("alice"), true, t(4)).unwrap_err();
        assert_matches!(err, CoreError::Forbidden(_));

        let question = d.question(q).unwrap();
        assert!(question.is_approved());
        assert_eq!(question.response, "v1");
        assert!(question.versions.is_empty());

        // Unchanged text is still a plain checkpoint.
        d.save_edit(q, "v1", &editor("alice"), false, t(5)).unwrap();
        assert!(d.question(q).unwrap().is_approved());
    }

    // -----------------------------------------------------------------------
    // Regenerate
    // -----------------------------------------------------------------------

    #[test]
    fn test_regenerate_resets_review_and_snapshots() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        d.save_edit(q, "manual", &owner(), false, t(0)).unwrap();
        d.change_status(q, ReviewState::Draft, &owner(), t(1)).unwrap();
        d.change_status(q, ReviewState::Review, &owner(), t(2)).unwrap();
        d.assign(q, "alice@example.com", &owner(), false, t(2)).unwrap();

        let answer = GeneratedAnswer {
            response: "generated".into(),
            trust_score: 140,
            sources: vec!["policy.pdf".into()],
        };
        let q_after = d.regenerate(q, answer, &editor("alice"), t(3)).unwrap();
        assert_eq!(q_after.status, ProvenanceKind::Generated);
        assert_eq!(q_after.review_state, ReviewState::Draft);
        assert_eq!(q_after.trust_score, Some(100));
        assert_eq!(q_after.versions.len(), 1);
        assert_eq!(q_after.versions[0].change_type, ChangeType::Generated);
    }

    #[test]
    fn test_unassigned_editor_cannot_regenerate_under_review() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        d.assign(q, "alice@example.com", &owner(), false, t(0)).unwrap();
        d.save_edit(q, "draft", &editor("alice"), false, t(1)).unwrap();
        d.change_status(q, ReviewState::Review, &editor("alice"), t(2)).unwrap();

        let err = d
            .regenerate(q, GeneratedAnswer::fallback(), &editor("bob"), t(3))
            .unwrap_err();
        assert_matches!(err, CoreError::Forbidden(_));
        assert_eq!(d.question(q).unwrap().review_state, ReviewState::Review);
        assert_eq!(d.question(q).unwrap().response, "draft");

        let q_after = d
            .regenerate(q, GeneratedAnswer::fallback(), &editor("alice"), t(4))
            .unwrap();
        assert_eq!(q_after.review_state, ReviewState::Draft);
    }

    #[test]
    fn test_editor_cannot_regenerate_approved_answer() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        d.assign(q, "alice@example.com", &owner(), false, t(0)).unwrap();
        d.change_status(q, ReviewState::Review, &owner(), t(1)).unwrap();
        d.change_status(q, ReviewState::Approved, &owner(), t(2)).unwrap();

        assert_matches!(
            d.regenerate(q, GeneratedAnswer::fallback(), &editor("alice"), t(3)),
            Err(CoreError::Forbidden(_))
        );
        assert!(d.question(q).unwrap().is_approved());
    }

    #[test]
    fn test_regenerate_respects_foreign_live_lock() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        d.start_edit(q, &editor("alice"), t(0)).unwrap();
        let err = d
            .regenerate(q, GeneratedAnswer::fallback(), &editor("bob"), t(10))
            .unwrap_err();
        assert_matches!(err, CoreError::Locked { .. });
    }

    // -----------------------------------------------------------------------
    // Restore
    // -----------------------------------------------------------------------

    #[test]
    fn test_restore_on_approved_answer_is_refused() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        d.save_edit(q, "v1", &owner(), false, t(0)).unwrap();
        d.save_edit(q, "v2", &owner(), false, t(1)).unwrap();
        let v1 = d.question(q).unwrap().versions[0].id;
        for s in [ReviewState::Draft, ReviewState::Review, ReviewState::Approved] {
            d.change_status(q, s, &owner(), t(2)).unwrap();
        }
        assert_matches!(d.restore_version(q, v1, &owner(), t(3)), Err(CoreError::Conflict(_)));
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    #[test]
    fn test_commit_assignment_stamps_and_notifies() {
        let mut d = doc(4);
        let editors = vec!["alice@example.com".to_string(), "bob@example.com".to_string()];
        let preview = d.preview_assignment(&editors).unwrap();
        let notices = d.commit_assignment(&preview, &owner(), t(0)).unwrap();

        assert_eq!(notices.len(), 4);
        assert_eq!(notices[0].editor, "alice@example.com");
        assert_eq!(notices[1].editor, "bob@example.com");
        for (_, q) in d.project().questions() {
            assert_eq!(q.review_state, ReviewState::Draft);
            assert_eq!(q.assigned_by.as_deref(), Some("owner@example.com"));
        }
    }

    #[test]
    fn test_stale_preview_is_rejected_atomically() {
        let mut d = doc(3);
        let editors = vec!["alice@example.com".to_string()];
        let preview = d.preview_assignment(&editors).unwrap();
        let q2 = qid(&d, 1);
        d.assign(q2, "carol@example.com", &owner(), false, t(0)).unwrap();

        let err = d.commit_assignment(&preview, &owner(), t(1)).unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
        assert!(d.question(qid(&d, 0)).unwrap().assigned_to.is_none());
    }

    #[test]
    fn test_editor_cannot_assign() {
        let mut d = doc(1);
        let preview = d.preview_assignment(&["x@example.com".to_string()]).unwrap();
        assert_matches!(
            d.commit_assignment(&preview, &editor("alice"), t(0)),
            Err(CoreError::Forbidden(_))
        );
    }

    // -----------------------------------------------------------------------
    // Finalize
    // -----------------------------------------------------------------------

    #[test]
    fn test_finalize_requires_all_approved_and_is_cleared_by_edits() {
        let mut d = doc(1);
        let q = qid(&d, 0);
        assert_matches!(d.finalize(&owner(), t(0)), Err(CoreError::Validation(_)));

        d.save_edit(q, "answer", &owner(), false, t(1)).unwrap();
        for s in [ReviewState::Draft, ReviewState::Review, ReviewState::Approved] {
            d.change_status(q, s, &owner(), t(2)).unwrap();
        }
        d.finalize(&owner(), t(3)).unwrap();
        assert!(d.project().is_finalized());

        d.change_status(q, ReviewState::Draft, &owner(), t(4)).unwrap();
        assert!(!d.project().is_finalized());
    }
}
