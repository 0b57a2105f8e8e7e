use serde::{Deserialize, Serialize};
use uuid::Uuid;

use events::EventEnvelope;

/// Control messages a WebSocket observer may send
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        #[serde(default)]
        run_ids: Option<Vec<Uuid>>,
    },
    Unsubscribe,
    Ping,
}

/// Replies to control messages. Progress envelopes are sent as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed { run_ids: Option<Vec<Uuid>> },
    Unsubscribed,
    Pong,
    Error { message: String },
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub run_ids: Option<Vec<Uuid>>,
}

impl SubscriptionFilter {
    pub fn for_runs(run_ids: Vec<Uuid>) -> Self {
        Self {
            run_ids: Some(run_ids),
        }
    }

    /// Envelopes without a run id are delivered to everyone.
    pub fn matches(&self, envelope: &EventEnvelope) -> bool {
        match (&self.run_ids, envelope.run_id) {
            (Some(ids), Some(run_id)) => ids.contains(&run_id),
            _ => true,
        }
    }
}
