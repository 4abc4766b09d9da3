//! Review state machine and role gating.
//!
//! ```text
//! unassigned -> draft -> review -> approved
//!                 ^        |          |
//!                 +--------+----------+
//! ```
//!
//! There is no terminal state; approved answers can always be reopened by an
//! owner or admin. Graph legality is checked before role gating, so an
//! illegal edge reports `InvalidTransition` for every role.

use crate::error::CoreError;
use crate::model::{Question, ReviewState};
use crate::roles::{Actor, Role};
use crate::types::Timestamp;

/// Every legal `(from, to)` edge.
pub const TRANSITIONS: &[(ReviewState, ReviewState)] = &[
    (ReviewState::Unassigned, ReviewState::Draft),
    (ReviewState::Draft, ReviewState::Review),
    (ReviewState::Review, ReviewState::Draft),
    (ReviewState::Review, ReviewState::Approved),
    (ReviewState::Approved, ReviewState::Draft),
];

/// Targets reachable from `from` in one step.
pub fn valid_transitions(from: ReviewState) -> &'static [ReviewState] {
    match from {
        ReviewState::Unassigned => &[ReviewState::Draft],
        ReviewState::Draft => &[ReviewState::Review],
        ReviewState::Review => &[ReviewState::Draft, ReviewState::Approved],
        ReviewState::Approved => &[ReviewState::Draft],
    }
}

pub fn can_transition(from: ReviewState, to: ReviewState) -> bool {
    valid_transitions(from).contains(&to)
}

pub fn validate_transition(from: ReviewState, to: ReviewState) -> Result<(), CoreError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}

/// Role check for moving `question` to `target`.
///
/// Viewers never transition. Editors only act on questions assigned to them
/// and cannot move anything out of `approved`. Owners and admins may act on
/// any question.
pub fn authorize(actor: &Actor, question: &Question, target: ReviewState) -> Result<(), CoreError> {
    match actor.role {
        Role::Owner | Role::Admin => Ok(()),
        Role::Viewer => Err(CoreError::Forbidden(format!(
            "{} has the viewer role and cannot change review status",
            actor.email
        ))),
        Role::Editor => {
            if !actor.is_assignee(question.assigned_to.as_deref()) {
                return Err(CoreError::Forbidden(format!(
                    "{} is not assigned to this question",
                    actor.email
                )));
            }
            if question.review_state == ReviewState::Approved {
                return Err(CoreError::Forbidden(format!(
                    "Only owners and admins may reopen an approved answer (requested {target})"
                )));
            }
            Ok(())
        }
    }
}

/// Validate and apply a transition. Returns the previous state.
///
/// Entering `approved` stamps `approved_by` / `approved_at`; leaving it
/// clears both.
pub fn apply(
    question: &mut Question,
    target: ReviewState,
    actor: &Actor,
    now: Timestamp,
) -> Result<ReviewState, CoreError> {
    let from = question.review_state;
    validate_transition(from, target)?;
    authorize(actor, question, target)?;

    question.review_state = target;
    if target == ReviewState::Approved {
        question.approved_by = Some(actor.email.clone());
        question.approved_at = Some(now);
    } else {
        clear_approval(question);
    }
    Ok(from)
}

pub(crate) fn clear_approval(question: &mut Question) {
    question.approved_by = None;
    question.approved_at = None;
}
