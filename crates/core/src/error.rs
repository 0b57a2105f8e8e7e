use thiserror::Error;
use uuid::Uuid;

use crate::domain::TreeError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Case not found: {0}")]
    CaseNotFound(Uuid),

    #[error("Invalid artifact tree: {0}")]
    InvalidTree(#[from] TreeError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
