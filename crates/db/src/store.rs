//! [`ProjectStore`] backed by the `projects` table.
//!
//! Writes are compare-and-swap on the `revision` column. The change feed is
//! driven by the `project_changes` NOTIFY channel, so writes made by other
//! processes reach subscribers too; [`PgProjectStore::listen`] must be
//! running for the feed to produce anything.

use async_trait::async_trait;
use rfpdesk_core::types::{EntityId, Revision};
use rfpdesk_core::{CoreError, Project, ProjectStore, StoredProject};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::broadcast;

use crate::error::persistence;
use crate::models::project::{encode_document, ProjectChange};
use crate::repositories::ProjectRepo;

/// NOTIFY channel raised by the `projects` trigger.
pub const CHANGE_CHANNEL: &str = "project_changes";

/// Buffer capacity for the change feed.
const FEED_CAPACITY: usize = 256;

pub struct PgProjectStore {
    pool: PgPool,
    feed: broadcast::Sender<StoredProject>,
}

impl PgProjectStore {
    pub fn new(pool: PgPool) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self { pool, feed }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Forward `project_changes` notifications to subscribers until the
    /// listener connection fails.
    ///
    /// Each notification triggers a fresh read, so subscribers always get the
    /// full document. Notifications are skipped while nobody is subscribed.
    pub async fn listen(&self) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        tracing::info!(channel = CHANGE_CHANNEL, "Listening for project changes");

        loop {
            let notification = listener.recv().await?;
            if self.feed.receiver_count() == 0 {
                continue;
            }

            let change = match ProjectChange::parse(notification.payload()) {
                Ok(change) => change,
                Err(e) => {
                    tracing::warn!(error = %e, payload = notification.payload(), "Ignoring malformed change notification");
                    continue;
                }
            };

            match ProjectRepo::get(&self.pool, &change.owner_id, change.project_id).await? {
                Some(row) => match row.into_stored() {
                    Ok(stored) => {
                        let _ = self.feed.send(stored);
                    }
                    Err(e) => {
                        tracing::error!(project_id = %change.project_id, error = %e, "Failed to decode changed project");
                    }
                },
                None => {
                    tracing::debug!(project_id = %change.project_id, "Changed project no longer exists");
                }
            }
        }
    }
}

#[async_trait]
impl ProjectStore for PgProjectStore {
    async fn get_project(
        &self,
        owner_id: &str,
        project_id: EntityId,
    ) -> Result<StoredProject, CoreError> {
        let row = ProjectRepo::get(&self.pool, owner_id, project_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "project",
                id: project_id.to_string(),
            })?;
        Ok(row.into_stored()?)
    }

    async fn save_project(
        &self,
        owner_id: &str,
        project: &Project,
        expected: Option<Revision>,
    ) -> Result<Revision, CoreError> {
        let document = encode_document(project)?;

        let revision = match expected {
            None => ProjectRepo::upsert(&self.pool, owner_id, project.id, &project.name, &document)
                .await
                .map_err(persistence)?,
            Some(0) => ProjectRepo::insert(&self.pool, owner_id, project.id, &project.name, &document)
                .await
                .map_err(persistence)?
                .ok_or_else(|| CoreError::Conflict(format!("Project {} already exists", project.id)))?,
            Some(expected) => {
                let updated = ProjectRepo::update_if_revision(
                    &self.pool,
                    owner_id,
                    project.id,
                    &project.name,
                    &document,
                    expected,
                )
                .await
                .map_err(persistence)?;

                match updated {
                    Some(revision) => revision,
                    None => {
                        let current = ProjectRepo::revision(&self.pool, owner_id, project.id)
                            .await
                            .map_err(persistence)?;
                        return Err(match current {
                            Some(current) => CoreError::Conflict(format!(
                                "Project {} is at revision {current}, expected {expected}",
                                project.id
                            )),
                            None => CoreError::NotFound {
                                entity: "project",
                                id: project.id.to_string(),
                            },
                        });
                    }
                }
            }
        };

        tracing::debug!(project_id = %project.id, %owner_id, revision, "Project document saved");
        Ok(revision)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoredProject> {
        self.feed.subscribe()
    }
}
