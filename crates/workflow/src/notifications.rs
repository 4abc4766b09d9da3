//! Notification payloads for workflow side effects.

use rfpdesk_core::assignment::AssignmentNotice;
use rfpdesk_core::collaborators::notification_kinds;
use rfpdesk_core::types::EntityId;
use rfpdesk_core::{Notification, Project, ReviewState};

/// Deep link to a question inside a project.
pub fn question_link(project_id: EntityId, question_id: EntityId) -> String {
    format!("/projects/{project_id}?question={question_id}")
}

pub fn assignment(project: &Project, notice: &AssignmentNotice, reassigned: bool) -> Notification {
    let (kind, title) = if reassigned {
        (notification_kinds::REASSIGNMENT, "Question reassigned to you")
    } else {
        (notification_kinds::ASSIGNMENT, "New question assigned")
    };
    Notification {
        kind: kind.to_string(),
        title: title.to_string(),
        message: format!(
            "{} assigned you \"{}\" in {}",
            notice.assigned_by,
            truncate(&notice.question_text, 120),
            project.name
        ),
        link: question_link(project.id, notice.question_id),
    }
}

pub fn status_change(
    project: &Project,
    question_id: EntityId,
    question_text: &str,
    from: ReviewState,
    to: ReviewState,
    changed_by: &str,
) -> Notification {
    Notification {
        kind: notification_kinds::STATUS_CHANGE.to_string(),
        title: format!("Answer moved to {to}"),
        message: format!(
            "{changed_by} moved \"{}\" in {} from {from} to {to}",
            truncate(question_text, 120),
            project.name
        ),
        link: question_link(project.id, question_id),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
