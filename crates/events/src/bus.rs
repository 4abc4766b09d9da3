//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`PlatformEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use rfpdesk_core::types::{EntityId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Known event type names.
pub mod event_types {
    pub const QUESTION_EDIT_STARTED: &str = "question.edit_started";
    pub const QUESTION_EDIT_CANCELLED: &str = "question.edit_cancelled";
    pub const QUESTION_SAVED: &str = "question.saved";
    pub const QUESTION_REGENERATED: &str = "question.regenerated";
    pub const QUESTION_RESTORED: &str = "question.restored";
    pub const QUESTION_STATUS_CHANGED: &str = "question.status_changed";
    pub const QUESTION_ASSIGNED: &str = "question.assigned";
    pub const PROJECT_FINALIZED: &str = "project.finalized";
    pub const NOTIFICATION: &str = "notification";
}

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event that occurred on a project.
///
/// Constructed via [`PlatformEvent::new`] and enriched with the builder
/// methods [`for_project`](PlatformEvent::for_project),
/// [`for_question`](PlatformEvent::for_question),
/// [`with_actor`](PlatformEvent::with_actor),
/// [`with_recipient`](PlatformEvent::with_recipient) and
/// [`with_payload`](PlatformEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"question.saved"`.
    pub event_type: String,

    pub project_id: Option<EntityId>,

    pub question_id: Option<EntityId>,

    /// Uid of the user that triggered the event.
    pub actor: Option<UserId>,

    /// Addressee for notification events.
    pub recipient: Option<String>,

    /// Revision of the project document after the write, when there was one.
    pub revision: Option<i64>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            project_id: None,
            question_id: None,
            actor: None,
            recipient: None,
            revision: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn for_project(mut self, project_id: EntityId, revision: i64) -> Self {
        self.project_id = Some(project_id);
        self.revision = Some(revision);
        self
    }

    pub fn for_question(mut self, question_id: EntityId) -> Self {
        self.question_id = Some(question_id);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<UserId>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use rfpdesk_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::new("question.saved"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Returns the number of
    /// subscribers that will see it.
    pub fn publish(&self, event: PlatformEvent) -> usize {
        // A SendError only means there are zero receivers.
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
