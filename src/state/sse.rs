use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::dto::sse::ServerEvent;

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    /// Serialize `payload` and broadcast it under the `name` event.
    pub fn publish<T: Serialize>(&self, name: &str, payload: &T) {
        match ServerEvent::json(name.to_string(), payload) {
            Ok(event) => self.broadcast(event),
            Err(err) => warn!(event = name, error = %err, "failed to serialize SSE payload"),
        }
    }

    /// Number of connected subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscribers_with_event_name() {
        let hub = SseHub::new(4);
        let mut rx = hub.subscribe();
        assert_eq!(hub.receiver_count(), 1);

        hub.publish("lobby.cycle", &serde_json::json!({ "cycle": 2 }));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("lobby.cycle"));
        assert_eq!(event.data, r#"{"cycle":2}"#);
    }

    #[test]
    fn broadcast_without_subscribers_is_silent() {
        let hub = SseHub::new(4);
        hub.publish("session.status", &"waiting");
    }
}
