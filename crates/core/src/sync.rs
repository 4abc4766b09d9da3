//! Client-side reconciliation of remote document pushes.
//!
//! State is `{server copy, optional local draft}`. While a draft is open,
//! remote pushes are held back so in-flight keystrokes are not discarded;
//! once the draft is saved or cancelled the newest held push replaces the
//! server copy wholesale. There is no field-level merge.

use serde::Serialize;

use crate::collaborators::StoredProject;
use crate::error::CoreError;
use crate::types::{EntityId, Revision, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalDraft {
    pub question_id: EntityId,
    pub content: String,
    pub started_at: Timestamp,
}

/// What happened to a remote push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoteUpdate {
    /// Replaced the server copy.
    Applied,
    /// Same or older revision than what we have, or another project.
    Ignored,
    /// Held back behind an open local draft.
    Deferred { local: Revision, remote: Revision },
}

impl RemoteUpdate {
    /// The warning to show when the view may be behind.
    pub fn stale_warning(&self) -> Option<CoreError> {
        match *self {
            RemoteUpdate::Deferred { local, remote } => Some(CoreError::StaleDocument { local, remote }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentSync {
    server: StoredProject,
    draft: Option<LocalDraft>,
    deferred: Option<StoredProject>,
}

impl DocumentSync {
    pub fn new(server: StoredProject) -> Self {
        Self {
            server,
            draft: None,
            deferred: None,
        }
    }

    pub fn server(&self) -> &StoredProject {
        &self.server
    }

    pub fn revision(&self) -> Revision {
        self.server.revision
    }

    pub fn draft(&self) -> Option<&LocalDraft> {
        self.draft.as_ref()
    }

    pub fn has_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Open a local draft. Only one question is edited at a time per client.
    pub fn begin_draft(
        &mut self,
        question_id: EntityId,
        now: Timestamp,
    ) -> Result<&LocalDraft, CoreError> {
        if let Some(open) = &self.draft {
            if open.question_id != question_id {
                return Err(CoreError::Conflict(format!(
                    "Another question ({}) is already being edited",
                    open.question_id
                )));
            }
        }
        let content = self.server.project.question(question_id)?.response.clone();
        Ok(self.draft.insert(LocalDraft {
            question_id,
            content,
            started_at: now,
        }))
    }

    pub fn update_draft(&mut self, content: impl Into<String>) -> Result<(), CoreError> {
        match self.draft.as_mut() {
            Some(draft) => {
                draft.content = content.into();
                Ok(())
            }
            None => Err(CoreError::Validation("No draft is open".to_string())),
        }
    }

    pub fn on_remote(&mut self, update: StoredProject) -> RemoteUpdate {
        if update.project.id != self.server.project.id || update.revision <= self.server.revision {
            return RemoteUpdate::Ignored;
        }
        if self.draft.is_some() {
            let local = self.server.revision;
            let remote = update.revision;
            if self.deferred.as_ref().map_or(true, |d| d.revision < remote) {
                self.deferred = Some(update);
            }
            return RemoteUpdate::Deferred { local, remote };
        }
        self.server = update;
        RemoteUpdate::Applied
    }

    /// Close the draft (after cancel or a failed save) and adopt the newest
    /// held-back push, if any. Returns the closed draft.
    pub fn finish_draft(&mut self) -> Option<LocalDraft> {
        let draft = self.draft.take();
        if let Some(deferred) = self.deferred.take() {
            if deferred.revision > self.server.revision {
                self.server = deferred;
            }
        }
        draft
    }

    /// Our own save landed; it becomes the server copy unless a newer push
    /// was already held back.
    pub fn acknowledge_save(&mut self, saved: StoredProject) {
        self.draft = None;
        let newest = match self.deferred.take() {
            Some(deferred) if deferred.revision > saved.revision => deferred,
            _ => saved,
        };
        if newest.revision > self.server.revision {
            self.server = newest;
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;
    use crate::model::{Project, Section};

    fn stored(project: &Project, revision: Revision, answer: &str) -> StoredProject {
        let mut project = project.clone();
        project.sections[0].questions[0].response = answer.into();
        StoredProject { project, revision }
    }

    fn setup() -> (DocumentSync, Project, EntityId) {
        let project = Project::new("P", "owner", vec![Section::new("S", ["q1", "q2"])], Utc::now());
        let q = project.sections[0].questions[0].id;
        (DocumentSync::new(stored(&project, 1, "")), project, q)
    }

    #[test]
    fn test_remote_applied_without_draft() {
        let (mut sync, project, _) = setup();
        assert_eq!(sync.on_remote(stored(&project, 2, "remote")), RemoteUpdate::Applied);
        assert_eq!(sync.revision(), 2);
    }

    #[test]
    fn test_older_remote_ignored() {
        let (mut sync, project, _) = setup();
        assert_eq!(sync.on_remote(stored(&project, 1, "same")), RemoteUpdate::Ignored);
    }

    #[test]
    fn test_remote_deferred_while_drafting() {
        let (mut sync, project, q) = setup();
        sync.begin_draft(q, Utc::now()).unwrap();
        sync.update_draft("typing...").unwrap();

        let outcome = sync.on_remote(stored(&project, 2, "remote"));
        assert_eq!(outcome, RemoteUpdate::Deferred { local: 1, remote: 2 });
        assert_matches!(outcome.stale_warning(), Some(CoreError::StaleDocument { local: 1, remote: 2 }));
        assert_eq!(sync.revision(), 1);
        assert_eq!(sync.draft().unwrap().content, "typing...");
    }

    #[test]
    fn test_cancel_adopts_newest_deferred() {
        let (mut sync, project, q) = setup();
        sync.begin_draft(q, Utc::now()).unwrap();
        sync.on_remote(stored(&project, 3, "newest"));
        sync.on_remote(stored(&project, 2, "older"));

        let draft = sync.finish_draft();
        assert!(draft.is_some());
        assert_eq!(sync.revision(), 3);
        assert_eq!(sync.server().project.sections[0].questions[0].response, "newest");
    }

    #[test]
    fn test_acknowledged_save_becomes_server_copy() {
        let (mut sync, project, q) = setup();
        sync.begin_draft(q, Utc::now()).unwrap();
        sync.acknowledge_save(stored(&project, 2, "mine"));
        assert!(sync.draft().is_none());
        assert_eq!(sync.server().project.sections[0].questions[0].response, "mine");
    }

    #[test]
    fn test_second_draft_on_other_question_conflicts() {
        let (mut sync, project, q) = setup();
        let q2 = project.sections[0].questions[1].id;
        sync.begin_draft(q, Utc::now()).unwrap();
        assert_matches!(sync.begin_draft(q2, Utc::now()), Err(CoreError::Conflict(_)));
    }
}
