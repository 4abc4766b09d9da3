//! Append-only answer history.
//!
//! `versions` holds prior answers, oldest first. The current text always
//! lives in `response`; the text it replaces is pushed to history before it
//! is overwritten, unless history already ends with that exact text.

use crate::error::CoreError;
use crate::model::{ChangeType, PendingSnapshot, ProvenanceKind, Question, Version, VersionAuthor};
use crate::types::{new_id, EntityId, Timestamp};

/// Result of [`restore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub content: String,
    pub prior_versions: Vec<Version>,
}

/// Snapshot the current response before it is replaced by `new_content`.
///
/// Any content displaced by an earlier restore is written first. Returns the
/// number of versions appended (0, 1 or 2).
pub fn snapshot_if_changed(
    question: &mut Question,
    new_content: &str,
    author: &VersionAuthor,
    change_type: ChangeType,
    now: Timestamp,
) -> usize {
    let mut appended = 0;

    if let Some(pending) = question.pending_snapshot.take() {
        if push_unless_latest(
            &mut question.versions,
            Version {
                id: new_id(),
                content: pending.content,
                edited_at: pending.displaced_at,
                edited_by: pending.displaced_by,
                change_type: ChangeType::Restored,
                trust_score: pending.trust_score,
            },
        ) {
            appended += 1;
        }
    }

    if question.response.trim().is_empty() || question.response == new_content {
        return appended;
    }

    let snapshot = Version {
        id: new_id(),
        content: question.response.clone(),
        edited_at: now,
        edited_by: author.clone(),
        change_type,
        trust_score: question.trust_score,
    };
    if push_unless_latest(&mut question.versions, snapshot) {
        appended += 1;
    }
    appended
}

fn push_unless_latest(versions: &mut Vec<Version>, version: Version) -> bool {
    if version.content.trim().is_empty() {
        return false;
    }
    if versions.last().is_some_and(|v| v.content == version.content) {
        return false;
    }
    versions.push(version);
    true
}

/// Copy a stored version forward as the current response.
///
/// History is left untouched. The displaced response is parked as a pending
/// snapshot and lands in `versions` on the next snapshotting edit; if a
/// pending snapshot already exists it is kept, since the content in between
/// came from history anyway.
pub fn restore(
    question: &mut Question,
    version_id: EntityId,
    author: &VersionAuthor,
    now: Timestamp,
) -> Result<Restored, CoreError> {
    let version = question
        .version(version_id)
        .cloned()
        .ok_or_else(|| CoreError::NotFound {
            entity: "version",
            id: version_id.to_string(),
        })?;

    if question.pending_snapshot.is_none()
        && !question.response.trim().is_empty()
        && question.response != version.content
    {
        question.pending_snapshot = Some(PendingSnapshot {
            content: question.response.clone(),
            trust_score: question.trust_score,
            displaced_at: now,
            displaced_by: author.clone(),
        });
    }

    question.response = version.content.clone();
    question.status = ProvenanceKind::Restored;
    if version.trust_score.is_some() {
        question.trust_score = version.trust_score;
    }
    question.last_edited_at = Some(now);
    question.last_edited_by = Some(author.name.clone());

    Ok(Restored {
        content: version.content,
        prior_versions: question.versions.clone(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn author() -> VersionAuthor {
        VersionAuthor {
            uid: "u1".into(),
            name: "Alice".into(),
        }
    }

    fn answered(text: &str) -> Question {
        let mut q = Question::new("Do you support SSO?");
        q.response = text.into();
        q
    }

    // -----------------------------------------------------------------------
    // snapshot_if_changed
    // -----------------------------------------------------------------------

    #[test]
    fn test_unchanged_content_creates_no_version() {
        let mut q = answered("X");
        let n = snapshot_if_changed(&mut q, "X", &author(), ChangeType::Edited, Utc::now());
        assert_eq!(n, 0);
        assert!(q.versions.is_empty());
    }

    #[test]
    fn test_changed_content_snapshots_previous() {
        let mut q = answered("X");
        q.trust_score = Some(82);
        let n = snapshot_if_changed(&mut q, "Y", &author(), ChangeType::Edited, Utc::now());

        assert_eq!(n, 1);
        assert_eq!(q.versions[0].content, "X");
        assert_eq!(q.versions[0].change_type, ChangeType::Edited);
        assert_eq!(q.versions[0].trust_score, Some(82));
    }

    #[test]
    fn test_empty_previous_response_is_not_snapshotted() {
        let mut q = answered("");
        snapshot_if_changed(&mut q, "first answer", &author(), ChangeType::Edited, Utc::now());
        assert!(q.versions.is_empty());
    }

    #[test]
    fn test_identical_latest_version_is_not_duplicated() {
        let mut q = answered("X");
        snapshot_if_changed(&mut q, "Y", &author(), ChangeType::Edited, Utc::now());
        // Response reverted to "X" without going through history.
        q.response = "X".into();
        let n = snapshot_if_changed(&mut q, "Z", &author(), ChangeType::Edited, Utc::now());
        assert_eq!(n, 0);
        assert_eq!(q.versions.len(), 1);
    }

    // -----------------------------------------------------------------------
    // restore
    // -----------------------------------------------------------------------

    #[test]
    fn test_restore_copies_content_forward() {
        let mut q = answered("X");
        snapshot_if_changed(&mut q, "Y", &author(), ChangeType::Edited, Utc::now());
        q.response = "Y".into();
        let v = q.versions[0].id;

        let restored = restore(&mut q, v, &author(), Utc::now()).unwrap();
        assert_eq!(restored.content, "X");
        assert_eq!(q.response, "X");
        assert_eq!(q.status, ProvenanceKind::Restored);
        assert_eq!(q.versions.len(), 1);
        assert_eq!(q.versions[0].id, v);
    }

    #[test]
    fn test_displaced_content_lands_on_next_edit() {
        let mut q = answered("X");
        snapshot_if_changed(&mut q, "Y", &author(), ChangeType::Edited, Utc::now());
        q.response = "Y".into();
        let v = q.versions[0].id;
        restore(&mut q, v, &author(), Utc::now()).unwrap();
        assert_eq!(q.pending_snapshot.as_ref().map(|p| p.content.as_str()), Some("Y"));

        let n = snapshot_if_changed(&mut q, "Z", &author(), ChangeType::Edited, Utc::now());
        // Displaced "Y" first, then the restored "X" being replaced by "Z".
        assert_eq!(n, 2);
        let contents: Vec<_> = q.versions.iter().map(|v| v.content.as_str()).collect();
        assert_eq!(contents, vec!["X", "Y", "X"]);
        assert_eq!(q.versions[1].change_type, ChangeType::Restored);
        assert!(q.pending_snapshot.is_none());
    }

    #[test]
    fn test_restore_unknown_version() {
        let mut q = answered("X");
        let err = restore(&mut q, new_id(), &author(), Utc::now()).unwrap_err();
        assert_matches!(err, CoreError::NotFound { entity: "version", .. });
    }
}
