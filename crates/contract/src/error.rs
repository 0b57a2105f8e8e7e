use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Contract document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to parse contract document: {0}")]
    Parse(String),

    #[error("Failed to render contract document: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ContractError>;
