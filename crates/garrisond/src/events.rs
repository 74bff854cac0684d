//! Event bus - fire-and-forget broadcast to connected observers

use garrison_ipc::{Event, NotifyStatus};
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast channel wrapper shared by every component that emits events
///
/// Publishing never blocks: observers that fall behind lose the oldest
/// events in their queue, and publishing with no observers is a no-op.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all events from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Publish an event to every current subscriber
    pub fn publish(&self, event: Event) {
        match self.sender.send(event) {
            Ok(receivers) => trace!("Event delivered to {} observers", receivers),
            Err(_) => trace!("Event published with no observers connected"),
        }
    }

    /// Emit one console line for a server
    pub fn console(&self, id: &str, data: impl Into<String>) {
        self.publish(Event::ConsoleOutput {
            id: id.to_string(),
            data: data.into(),
        });
    }

    /// Emit one line of install/update tool output
    pub fn installer(&self, context_id: &str, data: impl Into<String>) {
        self.publish(Event::InstallerOutput {
            data: data.into(),
            context_id: context_id.to_string(),
        });
    }

    pub fn notify_success(&self, message: impl Into<String>) {
        self.notify(NotifyStatus::Success, message);
    }

    pub fn notify_info(&self, message: impl Into<String>) {
        self.notify(NotifyStatus::Info, message);
    }

    pub fn notify_error(&self, message: impl Into<String>) {
        self.notify(NotifyStatus::Error, message);
    }

    fn notify(&self, status: NotifyStatus, message: impl Into<String>) {
        self.publish(Event::Notification {
            status,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.console("valheim", "hello");

        match rx.recv().await.unwrap() {
            Event::ConsoleOutput { id, data } => {
                assert_eq!(id, "valheim");
                assert_eq!(data, "hello");
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new(16);
        bus.notify_error("nobody is listening");
    }

    #[tokio::test]
    async fn test_lagged_subscriber_drops_oldest() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..5 {
            bus.console("s1", format!("line {}", i));
        }

        // The receiver lagged; the first recv reports the loss.
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        // What remains are the newest events.
        match rx.recv().await.unwrap() {
            Event::ConsoleOutput { data, .. } => assert_eq!(data, "line 3"),
            other => panic!("Unexpected event: {:?}", other),
        }
    }
}
