//! Filesystem side of a generation run: materializing artifact trees,
//! rolling them back, per-run directories and archive packaging.

pub mod archive;
mod error;
mod materializer;
mod run;

pub use error::{Result, WorkspaceError};
pub use materializer::{materialize, materialize_json, remove, rollback, Materialized};
pub use run::{RunWorkspace, WorkspaceConfig, WorkspaceManager};
