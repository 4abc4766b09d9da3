//! Advisory per-question edit locks.
//!
//! A lock is the `lockedBy` / `lockedAt` pair on a [`Question`]. Liveness is
//! computed from wall-clock age against the TTL; there is no unlock event a
//! crashed client could fail to send. Locks narrow the collision window
//! between editors but do not guarantee exclusion: the check and the write
//! that follows are two separate store calls. Revision compare-and-swap in
//! the store is what prevents lost updates.

use chrono::Duration;
use serde::Serialize;

use crate::error::CoreError;
use crate::model::Question;
use crate::types::{Timestamp, UserId};

/// Lock time-to-live in milliseconds (5 minutes).
pub const LOCK_TTL_MS: i64 = 300_000;

/// Outcome of [`LockManager::try_acquire`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LockDecision {
    /// The caller now holds the lock. `reclaimed_from` names the previous
    /// holder when an expired lock was taken over.
    Granted { reclaimed_from: Option<UserId> },
    /// A different, live holder exists.
    Denied {
        held_by: UserId,
        held_by_name: Option<String>,
        remaining_ms: i64,
    },
}

impl LockDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, LockDecision::Granted { .. })
    }

    pub fn into_result(self) -> Result<(), CoreError> {
        match self {
            LockDecision::Granted { .. } => Ok(()),
            LockDecision::Denied {
                held_by,
                remaining_ms,
                ..
            } => Err(CoreError::Locked {
                holder: held_by,
                remaining_ms,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LockManager {
    ttl: Duration,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self::with_ttl(Duration::milliseconds(LOCK_TTL_MS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Milliseconds until the current lock expires, or `None` when the
    /// question is unlocked or the lock is already stale.
    ///
    /// A `lockedAt` in the future (client clock skew) counts as freshly
    /// acquired, so the result never exceeds the TTL.
    pub fn remaining_ms(&self, question: &Question, now: Timestamp) -> Option<i64> {
        question.locked_by.as_ref()?;
        let locked_at = question.locked_at?;
        let age = (now - locked_at).max(Duration::zero());
        if age > self.ttl {
            None
        } else {
            Some((self.ttl - age).num_milliseconds())
        }
    }

    pub fn is_live(&self, question: &Question, now: Timestamp) -> bool {
        self.remaining_ms(question, now).is_some()
    }

    /// The live holder, if any.
    pub fn holder<'q>(&self, question: &'q Question, now: Timestamp) -> Option<&'q str> {
        if self.is_live(question, now) {
            question.locked_by.as_deref()
        } else {
            None
        }
    }

    /// Try to take the lock for `editor_id`.
    ///
    /// Succeeds when the question is unlocked, already held by the same
    /// editor (the acquisition time is refreshed), or held by a lock older
    /// than the TTL. Only the question's lock fields change; the caller
    /// persists.
    pub fn try_acquire(
        &self,
        question: &mut Question,
        editor_id: &str,
        editor_name: &str,
        now: Timestamp,
    ) -> LockDecision {
        let mut reclaimed_from = None;

        if let Some(holder) = question.locked_by.as_deref() {
            if holder != editor_id {
                match self.remaining_ms(question, now) {
                    Some(remaining_ms) => {
                        return LockDecision::Denied {
                            held_by: holder.to_string(),
                            held_by_name: question.locked_by_name.clone(),
                            remaining_ms,
                        };
                    }
                    None => reclaimed_from = Some(holder.to_string()),
                }
            }
        }

        question.locked_by = Some(editor_id.to_string());
        question.locked_by_name = Some(editor_name.to_string());
        question.locked_at = Some(now);
        LockDecision::Granted { reclaimed_from }
    }

    /// Release the lock if `editor_id` holds it. Returns whether anything
    /// was cleared; a stale reference can never drop someone else's lock.
    pub fn release(&self, question: &mut Question, editor_id: &str) -> bool {
        if question.locked_by.as_deref() == Some(editor_id) {
            clear(question);
            true
        } else {
            false
        }
    }
}

/// Drop the lock regardless of holder. Saving is an authoritative
/// checkpoint and always ends with the question unlocked.
pub fn clear(question: &mut Question) {
    question.locked_by = None;
    question.locked_by_name = None;
    question.locked_at = None;
}
