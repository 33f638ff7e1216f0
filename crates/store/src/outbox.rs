//! Event outbox: a bounded channel between committed transactions and
//! downstream consumers.
//!
//! The engine and the orchestrator publish events only after their
//! transaction commits, so a rollback is never announced. The dispatcher
//! drains the channel independently, which keeps "the event was
//! published" separate from "a subscriber ran" — the property the tests
//! rely on.

use domain::DomainEvent;
use tokio::sync::mpsc;

/// Fire-and-forget publisher for domain events.
pub trait EventBus: Clone + Send + Sync + 'static {
    /// Publishes an event. Must only be called after the state it
    /// announces has committed.
    fn publish(&self, event: DomainEvent);
}

/// The writing half of the outbox.
#[derive(Clone)]
pub struct Outbox {
    sender: mpsc::Sender<DomainEvent>,
}

/// The draining half of the outbox.
pub struct OutboxDispatcher {
    receiver: mpsc::Receiver<DomainEvent>,
}

impl Outbox {
    /// Creates an outbox with the given channel capacity.
    pub fn bounded(capacity: usize) -> (Outbox, OutboxDispatcher) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Outbox { sender }, OutboxDispatcher { receiver })
    }
}

impl EventBus for Outbox {
    fn publish(&self, event: DomainEvent) {
        let topic = event.topic();
        match self.sender.try_send(event) {
            Ok(()) => {
                metrics::counter!("outbox_published_total").increment(1);
            }
            Err(err) => {
                // Best-effort delivery: a full or closed channel drops
                // the event rather than blocking the commit path.
                metrics::counter!("outbox_dropped_total").increment(1);
                tracing::warn!(topic, %err, "dropping outbox event");
            }
        }
    }
}

impl OutboxDispatcher {
    /// Waits for the next event; `None` once every publisher is gone.
    pub async fn recv(&mut self) -> Option<DomainEvent> {
        self.receiver.recv().await
    }

    /// Drains whatever is currently buffered without waiting.
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Runs until the outbox side is dropped, invoking `handler` per event.
    pub async fn run<H>(mut self, mut handler: H)
    where
        H: FnMut(DomainEvent) + Send,
    {
        while let Some(event) = self.recv().await {
            handler(event);
        }
    }
}
