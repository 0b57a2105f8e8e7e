//! Domain types shared across the testforge workspace.

pub mod domain;
mod error;

pub use domain::*;
pub use error::{CoreError, Result};
