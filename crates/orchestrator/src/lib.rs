pub mod emitter;
pub mod error;
pub mod pipeline;
pub mod repair_loop;
pub mod state_machine;

pub use emitter::ProgressEmitter;
pub use error::{OrchestratorError, Result};
pub use pipeline::{AgentPipeline, PipelineConfig, RunReport};
pub use repair_loop::{LoopConfig, LoopReport, RepairLoop};
pub use state_machine::{LoopState, LoopStateMachine};
