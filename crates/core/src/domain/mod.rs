mod artifact;
mod attempt;
mod case;
mod context;

pub use artifact::{entry_path, ArtifactNode, ArtifactTree, TreeError};
pub use attempt::{Attempt, AttemptOutcome, ExecutionResult, TestPlan};
pub use case::{Case, CaseStatus, CaseType};
pub use context::{FlowKind, SpecContext};
