use testforge_core::TreeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Invalid artifact tree: {0}")]
    InvalidTree(#[from] TreeError),

    #[error("Run workspace not found: {0}")]
    RunNotFound(String),

    #[error("Run workspace already exists: {0}")]
    RunAlreadyExists(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for WorkspaceError {
    fn from(e: zip::result::ZipError) -> Self {
        WorkspaceError::Archive(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;
