//! Persisted workflow operations.
//!
//! Each operation loads the project, applies one mutation through
//! [`CollaborativeDocument`], and writes the whole document back with a
//! revision compare-and-swap. When another client wrote in between, the
//! mutation is re-applied once to the fresh copy; question-scoped operations
//! re-validate against the new state, so a concurrent edit to a sibling
//! question is kept rather than overwritten. A failed write leaves nothing
//! behind: the mutated copy is discarded and the error is surfaced.
//!
//! After a write lands the service publishes a [`PlatformEvent`] and sends
//! notifications. Notification failures are logged and never undo the write.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rfpdesk_core::assignment::{AssignOutcome, AssignmentNotice, AssignmentPreview};
use rfpdesk_core::document::EditSession;
use rfpdesk_core::locking::LockManager;
use rfpdesk_core::types::{EntityId, Revision, Timestamp};
use rfpdesk_core::versioning::Restored;
use rfpdesk_core::{
    Actor, AnswerGenerator, CollaborativeDocument, CoreError, GeneratedAnswer, Notification,
    Notifier, Project, ProjectStore, Question, ReviewState, StoredProject,
};
use rfpdesk_events::{event_types, EventBus, PlatformEvent};
use tokio::sync::broadcast;

use crate::notifications;

/// Re-apply attempts after a revision conflict.
pub const MAX_REBASES: usize = 1;

/// How long answer generation may take before the fallback answer is used.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// A mutation that reached the store.
#[derive(Debug, Clone)]
pub struct Committed<T> {
    pub value: T,
    /// Revision after the write. Unchanged when the mutation was a no-op.
    pub revision: Revision,
    pub project: Project,
    /// `false` when the mutation changed nothing and no write was issued.
    pub written: bool,
}

impl<T> Committed<T> {
    pub fn stored(&self) -> StoredProject {
        StoredProject {
            project: self.project.clone(),
            revision: self.revision,
        }
    }
}

pub struct WorkflowService {
    store: Arc<dyn ProjectStore>,
    notifier: Arc<dyn Notifier>,
    bus: Arc<EventBus>,
    locks: LockManager,
}

impl WorkflowService {
    pub fn new(store: Arc<dyn ProjectStore>, notifier: Arc<dyn Notifier>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            notifier,
            bus,
            locks: LockManager::new(),
        }
    }

    pub fn with_lock_manager(mut self, locks: LockManager) -> Self {
        self.locks = locks;
        self
    }

    /// Change feed of every stored project.
    pub fn subscribe(&self) -> broadcast::Receiver<StoredProject> {
        self.store.subscribe()
    }

    pub async fn load(&self, owner_id: &str, project_id: EntityId) -> Result<StoredProject, CoreError> {
        self.store.get_project(owner_id, project_id).await
    }

    /// Persist a freshly uploaded project. Fails if the id already exists.
    pub async fn create_project(&self, project: Project) -> Result<StoredProject, CoreError> {
        let revision = self
            .store
            .save_project(&project.owner_id, &project, Some(0))
            .await?;
        tracing::info!(project_id = %project.id, owner_id = %project.owner_id, "Project created");
        Ok(StoredProject { project, revision })
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    pub async fn start_edit(
        &self,
        owner_id: &str,
        project_id: EntityId,
        question_id: EntityId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Committed<EditSession>, CoreError> {
        let committed = self
            .mutate(owner_id, project_id, "start_edit", |doc| {
                doc.start_edit(question_id, actor, now)
            })
            .await?;
        self.publish(event_types::QUESTION_EDIT_STARTED, &committed, Some(question_id), actor);
        Ok(committed)
    }

    pub async fn cancel_edit(
        &self,
        owner_id: &str,
        project_id: EntityId,
        question_id: EntityId,
        actor: &Actor,
    ) -> Result<Committed<bool>, CoreError> {
        let committed = self
            .mutate(owner_id, project_id, "cancel_edit", |doc| {
                doc.cancel_edit(question_id, actor)
            })
            .await?;
        if committed.value {
            self.publish(event_types::QUESTION_EDIT_CANCELLED, &committed, Some(question_id), actor);
        }
        Ok(committed)
    }

    pub async fn save_edit(
        &self,
        owner_id: &str,
        project_id: EntityId,
        question_id: EntityId,
        content: &str,
        actor: &Actor,
        confirm_approved_overwrite: bool,
        now: Timestamp,
    ) -> Result<Committed<Question>, CoreError> {
        let committed = self
            .mutate(owner_id, project_id, "save_edit", |doc| {
                doc.save_edit(question_id, content, actor, confirm_approved_overwrite, now)
                    .cloned()
            })
            .await?;
        self.publish(event_types::QUESTION_SAVED, &committed, Some(question_id), actor);
        Ok(committed)
    }

    /// Draft a new answer with `generator`, falling back to a fixed answer
    /// when generation fails or times out, then apply it like a save.
    pub async fn regenerate(
        &self,
        owner_id: &str,
        project_id: EntityId,
        question_id: EntityId,
        actor: &Actor,
        generator: &dyn AnswerGenerator,
    ) -> Result<Committed<Question>, CoreError> {
        let text = self
            .load(owner_id, project_id)
            .await?
            .project
            .question(question_id)?
            .text
            .clone();

        let answer = match tokio::time::timeout(GENERATION_TIMEOUT, generator.generate(&text)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                tracing::warn!(%project_id, %question_id, error = %e, "Answer generation failed, using fallback");
                GeneratedAnswer::fallback()
            }
            Err(_) => {
                tracing::warn!(
                    %project_id,
                    %question_id,
                    timeout_secs = GENERATION_TIMEOUT.as_secs(),
                    "Answer generation timed out, using fallback"
                );
                GeneratedAnswer::fallback()
            }
        };

        let now = Utc::now();
        let committed = self
            .mutate(owner_id, project_id, "regenerate", |doc| {
                doc.regenerate(question_id, answer.clone(), actor, now).cloned()
            })
            .await?;
        self.publish(event_types::QUESTION_REGENERATED, &committed, Some(question_id), actor);
        Ok(committed)
    }

    pub async fn restore_version(
        &self,
        owner_id: &str,
        project_id: EntityId,
        question_id: EntityId,
        version_id: EntityId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Committed<Restored>, CoreError> {
        let committed = self
            .mutate(owner_id, project_id, "restore_version", |doc| {
                doc.restore_version(question_id, version_id, actor, now)
            })
            .await?;
        self.publish(event_types::QUESTION_RESTORED, &committed, Some(question_id), actor);
        Ok(committed)
    }

    // -----------------------------------------------------------------------
    // Review workflow
    // -----------------------------------------------------------------------

    /// Returns the previous state. The assignee is notified when someone
    /// else moved their question.
    pub async fn change_status(
        &self,
        owner_id: &str,
        project_id: EntityId,
        question_id: EntityId,
        target: ReviewState,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Committed<ReviewState>, CoreError> {
        let committed = self
            .mutate(owner_id, project_id, "change_status", |doc| {
                doc.change_status(question_id, target, actor, now)
            })
            .await?;
        self.publish(event_types::QUESTION_STATUS_CHANGED, &committed, Some(question_id), actor);

        let question = committed.project.question(question_id)?;
        if let Some(assignee) = question.assigned_to.as_deref() {
            if !actor.is_assignee(Some(assignee)) {
                let notification = notifications::status_change(
                    &committed.project,
                    question_id,
                    &question.text,
                    committed.value,
                    target,
                    &actor.display_name,
                );
                self.deliver(assignee, notification).await;
            }
        }
        Ok(committed)
    }

    pub async fn finalize(
        &self,
        owner_id: &str,
        project_id: EntityId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Committed<()>, CoreError> {
        let committed = self
            .mutate(owner_id, project_id, "finalize", |doc| doc.finalize(actor, now))
            .await?;
        self.publish(event_types::PROJECT_FINALIZED, &committed, None, actor);
        Ok(committed)
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    /// Plan a bulk assignment on the current server copy. Nothing is written.
    pub async fn preview_assignment(
        &self,
        owner_id: &str,
        project_id: EntityId,
        editors: &[String],
    ) -> Result<AssignmentPreview, CoreError> {
        let stored = self.load(owner_id, project_id).await?;
        CollaborativeDocument::with_lock_manager(stored.project, self.locks).preview_assignment(editors)
    }

    /// Commit a preview, then notify each assigned editor.
    pub async fn commit_assignment(
        &self,
        owner_id: &str,
        project_id: EntityId,
        preview: &AssignmentPreview,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Committed<Vec<AssignmentNotice>>, CoreError> {
        let committed = self
            .mutate(owner_id, project_id, "commit_assignment", |doc| {
                doc.commit_assignment(preview, actor, now)
            })
            .await?;

        for notice in &committed.value {
            self.publish(event_types::QUESTION_ASSIGNED, &committed, Some(notice.question_id), actor);
            let notification = notifications::assignment(&committed.project, notice, false);
            self.deliver(&notice.editor, notification).await;
        }
        tracing::info!(
            %project_id,
            assigned = committed.value.len(),
            editors = preview.loads.len(),
            "Bulk assignment committed"
        );
        Ok(committed)
    }

    pub async fn assign(
        &self,
        owner_id: &str,
        project_id: EntityId,
        question_id: EntityId,
        editor: &str,
        actor: &Actor,
        confirm_reassign: bool,
        now: Timestamp,
    ) -> Result<Committed<AssignOutcome>, CoreError> {
        let committed = self
            .mutate(owner_id, project_id, "assign", |doc| {
                doc.assign(question_id, editor, actor, confirm_reassign, now)
            })
            .await?;

        let Committed {
            value: (outcome, notice),
            revision,
            project,
            written,
        } = committed;
        let committed = Committed {
            value: outcome,
            revision,
            project,
            written,
        };
        if let Some(notice) = notice {
            let reassigned = matches!(
                committed.value,
                AssignOutcome::Assigned { previous: Some(_) }
            );
            self.publish(event_types::QUESTION_ASSIGNED, &committed, Some(question_id), actor);
            let notification = notifications::assignment(&committed.project, &notice, reassigned);
            self.deliver(&notice.editor, notification).await;
        }
        Ok(committed)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn mutate<T, F>(
        &self,
        owner_id: &str,
        project_id: EntityId,
        operation: &'static str,
        apply: F,
    ) -> Result<Committed<T>, CoreError>
    where
        F: Fn(&mut CollaborativeDocument) -> Result<T, CoreError> + Send + Sync,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            let stored = self.store.get_project(owner_id, project_id).await?;
            let mut doc = CollaborativeDocument::with_lock_manager(stored.project.clone(), self.locks);
            let value = apply(&mut doc)?;
            let project = doc.into_project();

            if project == stored.project {
                return Ok(Committed {
                    value,
                    revision: stored.revision,
                    project,
                    written: false,
                });
            }

            match self
                .store
                .save_project(owner_id, &project, Some(stored.revision))
                .await
            {
                Ok(revision) => {
                    tracing::debug!(%project_id, operation, revision, "Project written");
                    return Ok(Committed {
                        value,
                        revision,
                        project,
                        written: true,
                    });
                }
                Err(CoreError::Conflict(reason)) if attempt < MAX_REBASES => {
                    attempt += 1;
                    tracing::info!(%project_id, operation, %reason, "Revision conflict, re-applying on fresh copy");
                }
                Err(e) => {
                    tracing::error!(%project_id, operation, error = %e, "Project write failed");
                    return Err(e);
                }
            }
        }
    }

    fn publish<T>(
        &self,
        event_type: &str,
        committed: &Committed<T>,
        question_id: Option<EntityId>,
        actor: &Actor,
    ) {
        if !committed.written {
            return;
        }
        let stats = &committed.project.stats;
        let mut event = PlatformEvent::new(event_type)
            .for_project(committed.project.id, committed.revision)
            .with_actor(actor.uid.clone())
            .with_payload(serde_json::json!({
                "totalQuestions": stats.total_questions,
                "answered": stats.answered,
                "approved": stats.approved,
                "progress": stats.progress,
            }));
        if let Some(question_id) = question_id {
            event = event.for_question(question_id);
        }
        self.bus.publish(event);
    }

    async fn deliver(&self, recipient: &str, notification: Notification) {
        let kind = notification.kind.clone();
        if let Err(e) = self.notifier.notify(recipient, notification).await {
            tracing::warn!(%recipient, %kind, error = %e, "Notification delivery failed");
        }
    }
}
