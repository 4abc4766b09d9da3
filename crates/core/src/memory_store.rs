//! Process-local [`ProjectStore`] with the same revision semantics as the
//! database-backed store. Used for embedding and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::collaborators::{ProjectStore, StoredProject};
use crate::error::CoreError;
use crate::model::Project;
use crate::types::{EntityId, Revision};

/// Buffer capacity for the change feed.
const FEED_CAPACITY: usize = 256;

pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<(String, EntityId), StoredProject>>,
    feed: broadcast::Sender<StoredProject>,
}

impl Default for InMemoryProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            projects: RwLock::new(HashMap::new()),
            feed,
        }
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn get_project(
        &self,
        owner_id: &str,
        project_id: EntityId,
    ) -> Result<StoredProject, CoreError> {
        self.projects
            .read()
            .await
            .get(&(owner_id.to_string(), project_id))
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity: "project",
                id: project_id.to_string(),
            })
    }

    async fn save_project(
        &self,
        owner_id: &str,
        project: &Project,
        expected: Option<Revision>,
    ) -> Result<Revision, CoreError> {
        let stored = {
            let mut projects = self.projects.write().await;
            let key = (owner_id.to_string(), project.id);
            let current = projects.get(&key).map(|p| p.revision).unwrap_or(0);
            if let Some(expected) = expected {
                if expected != current {
                    return Err(CoreError::Conflict(format!(
                        "Project {} is at revision {current}, expected {expected}",
                        project.id
                    )));
                }
            }
            let stored = StoredProject {
                project: project.clone(),
                revision: current + 1,
            };
            projects.insert(key, stored.clone());
            stored
        };

        let revision = stored.revision;
        // No receivers is fine.
        let _ = self.feed.send(stored);
        Ok(revision)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoredProject> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;
    use crate::model::Section;

    fn project() -> Project {
        Project::new("P", "owner", vec![Section::new("S", ["q"])], Utc::now())
    }

    #[tokio::test]
    async fn test_first_save_creates_revision_one() {
        let store = InMemoryProjectStore::new();
        let p = project();
        assert_eq!(store.save_project("owner", &p, Some(0)).await.unwrap(), 1);
        assert_eq!(store.get_project("owner", p.id).await.unwrap().revision, 1);
    }

    #[tokio::test]
    async fn test_stale_expected_revision_conflicts() {
        let store = InMemoryProjectStore::new();
        let p = project();
        store.save_project("owner", &p, None).await.unwrap();
        store.save_project("owner", &p, Some(1)).await.unwrap();

        let err = store.save_project("owner", &p, Some(1)).await.unwrap_err();
        assert_matches!(err, CoreError::Conflict(_));
    }

    #[tokio::test]
    async fn test_unconditional_save_is_last_write_wins() {
        let store = InMemoryProjectStore::new();
        let mut p = project();
        store.save_project("owner", &p, None).await.unwrap();
        p.name = "Renamed".into();
        assert_eq!(store.save_project("owner", &p, None).await.unwrap(), 2);
        assert_eq!(store.get_project("owner", p.id).await.unwrap().project.name, "Renamed");
    }

    #[tokio::test]
    async fn test_projects_are_scoped_by_owner() {
        let store = InMemoryProjectStore::new();
        let p = project();
        store.save_project("owner", &p, None).await.unwrap();
        assert_matches!(
            store.get_project("someone-else", p.id).await,
            Err(CoreError::NotFound { entity: "project", .. })
        );
    }

    #[tokio::test]
    async fn test_subscribers_receive_saves() {
        let store = InMemoryProjectStore::new();
        let mut rx = store.subscribe();
        let p = project();
        store.save_project("owner", &p, None).await.unwrap();

        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed.project.id, p.id);
        assert_eq!(pushed.revision, 1);
    }
}
