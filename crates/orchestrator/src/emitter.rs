//! Run-scoped progress publisher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use events::{EventBus, EventEnvelope, Milestone, ProgressEvent};
use tracing::trace;
use uuid::Uuid;

/// Publishes progress for one run, stamping every envelope with the run id.
///
/// Publishing never waits for observers; with nobody subscribed the event
/// is simply dropped.
#[derive(Clone)]
pub struct ProgressEmitter {
    bus: EventBus,
    run_id: Uuid,
    sequence: Arc<AtomicU64>,
}

impl ProgressEmitter {
    pub fn new(bus: EventBus, run_id: Uuid) -> Self {
        Self {
            bus,
            run_id,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn emit(&self, milestone: Milestone, attempt: Option<u32>, event: ProgressEvent) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);

        let mut envelope = EventEnvelope::new(milestone, event).with_run(self.run_id);
        if let Some(attempt) = attempt {
            envelope = envelope.with_attempt(attempt);
        }

        let delivered = self.bus.publish(envelope);
        trace!(
            run_id = %self.run_id,
            seq,
            milestone = milestone.as_str(),
            delivered,
            "Published progress event"
        );
    }

    pub fn status(&self, milestone: Milestone, attempt: Option<u32>, text: impl Into<String>) {
        self.emit(milestone, attempt, ProgressEvent::status(text));
    }

    /// Number of events emitted so far
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}
