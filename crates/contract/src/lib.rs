//! Interface-description document handling: loading and tag-based reduction.

mod document;
mod error;
mod reduce;

pub use document::ContractDocument;
pub use error::{ContractError, Result};
pub use reduce::{reduce, references, COMPONENT_REF_PREFIX};
