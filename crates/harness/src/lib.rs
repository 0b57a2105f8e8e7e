//! Out-of-process validation of a materialized test project

mod policy;
mod runner;

pub use policy::ExitPolicy;
pub use runner::{HarnessConfig, PytestRunner, ValidationRunner};
