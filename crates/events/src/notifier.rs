//! Notification delivery over the event bus.

use std::sync::Arc;

use async_trait::async_trait;
use rfpdesk_core::{CoreError, Notification, Notifier};

use crate::bus::{event_types, EventBus, PlatformEvent};

/// Publishes every notification as a [`event_types::NOTIFICATION`] event
/// addressed to the recipient. Whoever holds the recipient's connection
/// picks it up; with nobody listening the notification is dropped.
pub struct BusNotifier {
    bus: Arc<EventBus>,
}

impl BusNotifier {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl Notifier for BusNotifier {
    async fn notify(&self, user: &str, notification: Notification) -> Result<(), CoreError> {
        let payload = serde_json::to_value(&notification)
            .map_err(|e| CoreError::Internal(format!("Failed to encode notification: {e}")))?;
        let delivered = self.bus.publish(
            PlatformEvent::new(event_types::NOTIFICATION)
                .with_recipient(user)
                .with_payload(payload),
        );
        if delivered == 0 {
            tracing::debug!(recipient = %user, kind = %notification.kind, "No listeners for notification");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rfpdesk_core::collaborators::notification_kinds;

    use super::*;

    #[tokio::test]
    async fn notification_is_published_to_recipient() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let notifier = BusNotifier::new(Arc::clone(&bus));

        notifier
            .notify(
                "alice@example.com",
                Notification {
                    kind: notification_kinds::ASSIGNMENT.to_string(),
                    title: "New assignment".into(),
                    message: "You were assigned 3 questions".into(),
                    link: "/projects/p1".into(),
                },
            )
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, event_types::NOTIFICATION);
        assert_eq!(event.recipient.as_deref(), Some("alice@example.com"));
        assert_eq!(event.payload["type"], "assignment");
        assert_eq!(event.payload["title"], "New assignment");
    }

    #[tokio::test]
    async fn notify_without_listeners_succeeds() {
        let notifier = BusNotifier::new(Arc::new(EventBus::default()));
        let result = notifier
            .notify(
                "bob@example.com",
                Notification {
                    kind: notification_kinds::STATUS_CHANGE.to_string(),
                    title: "t".into(),
                    message: "m".into(),
                    link: "/".into(),
                },
            )
            .await;
        assert!(result.is_ok());
    }
}
