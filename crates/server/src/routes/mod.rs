mod agents;
mod cases;
mod contract;
mod health;
mod runs;
mod ws;

pub use agents::*;
pub use cases::*;
pub use contract::*;
pub use health::*;
pub use runs::*;
pub use ws::*;
