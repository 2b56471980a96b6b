//! Event publishing for reindex passes.
//!
//! The orchestrator announces when a pass starts, completes, or aborts.
//! Delivery is fire-and-forget: a pass never waits on, or fails because of,
//! its subscribers.

use tokio::sync::broadcast;
use tracing::debug;

use reindexer_shared::ReindexEvent;

/// Default number of events buffered per subscriber.
const DEFAULT_CAPACITY: usize = 64;

/// Sink for pass lifecycle events.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ReindexEvent);
}

/// Publisher that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: ReindexEvent) {}
}

/// Publisher fanning events out to any number of in-process subscribers.
///
/// Slow subscribers lag and lose the oldest events rather than blocking
/// the pass.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<ReindexEvent>,
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ReindexEvent> {
        self.tx.subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: ReindexEvent) {
        if self.tx.send(event).is_err() {
            debug!("No event subscribers");
        }
    }
}
