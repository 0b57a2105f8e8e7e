use capability::CapabilityError;
use contract::ContractError;
use testforge_core::{CoreError, TreeError};
use thiserror::Error;
use workspace::WorkspaceError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// Generator output that cannot be materialized. Never retried.
    #[error("Invalid artifact at attempt {attempt}: {reason}")]
    InvalidArtifact { attempt: u32, reason: String },

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    pub fn invalid_artifact(attempt: u32, error: &TreeError) -> Self {
        Self::InvalidArtifact {
            attempt,
            reason: error.to_string(),
        }
    }
}

impl From<CoreError> for OrchestratorError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(message) => Self::Validation(message),
            other => Self::Validation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
