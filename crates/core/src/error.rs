use crate::model::ReviewState;
use crate::types::UserId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Locked: question is being edited by {holder} ({remaining_ms} ms remaining)")]
    Locked { holder: UserId, remaining_ms: i64 },

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: ReviewState, to: ReviewState },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Stale document: remote revision {remote} deferred while local edit is open (local revision {local})")]
    StaleDocument { local: i64, remote: i64 },

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Seconds left on the lock, rounded up, for `Locked` errors.
    pub fn remaining_secs(&self) -> Option<i64> {
        match self {
            CoreError::Locked { remaining_ms, .. } => Some((remaining_ms + 999) / 1000),
            _ => None,
        }
    }
}
