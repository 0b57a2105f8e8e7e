//! Progress broadcast for generation runs
//!
//! Observers subscribe to an [`EventBus`] and receive every [`EventEnvelope`]
//! published after they subscribed. Nothing is buffered for late subscribers.

mod bus;
mod types;

pub use bus::{EventBus, RunSubscription};
pub use types::*;
