//! Progress bus over a tokio broadcast channel

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;
use uuid::Uuid;

use crate::types::EventEnvelope;

const DEFAULT_CAPACITY: usize = 1000;

/// Fan-out of progress events to every connected observer.
///
/// Cloning yields another handle to the same channel. Publishing never
/// waits for observers, and nothing is kept for late subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns how many observers received the envelope; 0 when it was dropped.
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Every envelope published from now on, for all runs.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Envelopes of a single run, published from now on.
    pub fn subscribe_run(&self, run_id: Uuid) -> RunSubscription {
        RunSubscription {
            run_id,
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Receiver narrowed to one run. Envelopes of other runs are skipped; a
/// lagging receiver skips what it missed and keeps going.
pub struct RunSubscription {
    run_id: Uuid,
    receiver: broadcast::Receiver<EventEnvelope>,
}

impl RunSubscription {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Next envelope of the run, or `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.run_id == Some(self.run_id) => return Some(envelope),
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!(run_id = %self.run_id, missed, "Run subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next envelope of the run that is already queued.
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) if envelope.run_id == Some(self.run_id) => return Some(envelope),
                Ok(_) => {}
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(run_id = %self.run_id, missed, "Run subscription lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Milestone, ProgressEvent};

    fn status(text: &str) -> EventEnvelope {
        EventEnvelope::new(Milestone::GenerationStarted, ProgressEvent::status(text))
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let envelope = status("generating");
        let sent = bus.publish(envelope.clone());
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, envelope.id);
        assert_eq!(received.event, ProgressEvent::status("generating"));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let envelope = status("validating");
        let envelope_id = envelope.id;

        let sent = bus.publish(envelope);
        assert_eq!(sent, 2);

        assert_eq!(rx1.recv().await.unwrap().id, envelope_id);
        assert_eq!(rx2.recv().await.unwrap().id, envelope_id);
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = EventBus::new();

        // Dropped, not an error
        let sent = bus.publish(status("nobody listens"));
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_replay() {
        let bus = EventBus::new();
        bus.publish(status("early"));

        let mut rx = bus.subscribe();
        bus.publish(status("late"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event, ProgressEvent::status("late"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_subscription_skips_other_runs() {
        let bus = EventBus::new();
        let run_id = Uuid::new_v4();
        let mut run = bus.subscribe_run(run_id);

        bus.publish(status("other").with_run(Uuid::new_v4()));
        bus.publish(status("unscoped"));
        bus.publish(status("mine").with_run(run_id));

        let received = run.recv().await.unwrap();
        assert_eq!(received.event, ProgressEvent::status("mine"));
        assert!(run.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_run_subscription_survives_lag() {
        let bus = EventBus::with_capacity(2);
        let run_id = Uuid::new_v4();
        let mut run = bus.subscribe_run(run_id);

        for i in 0..5 {
            bus.publish(status(&format!("event {}", i)).with_run(run_id));
        }

        // The oldest envelopes are gone; the newest are still delivered
        assert_eq!(run.recv().await.unwrap().event, ProgressEvent::status("event 3"));
        assert_eq!(run.try_recv().unwrap().event, ProgressEvent::status("event 4"));
        assert!(run.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_run_subscription_ends_with_bus() {
        let bus = EventBus::new();
        let mut run = bus.subscribe_run(Uuid::new_v4());
        drop(bus);
        assert!(run.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscriber_count() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let _rx1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_clone() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let _rx = bus2.subscribe();
        assert_eq!(bus1.subscriber_count(), 1);
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
