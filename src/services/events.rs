//! Domain event publishing over NATS.

use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

/// Publishes events as JSON when a NATS client is configured, otherwise only logs
/// them. Failures never reach the caller.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    pub async fn publish(&self, event: &DomainEvent) {
        let subject = event.subject();
        let Some(client) = &self.nats else {
            debug!(subject = %subject, event = ?event, "Event not published (no NATS client)");
            return;
        };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(subject = %subject, error = %e, "Failed to serialize event");
                return;
            }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            warn!(subject = %subject, error = %e, "Failed to publish event");
        }
    }

    pub async fn publish_all(&self, events: &[DomainEvent]) {
        for event in events {
            self.publish(event).await;
        }
    }
}
