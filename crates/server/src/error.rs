use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use contract::ContractError;
use orchestrator::OrchestratorError;
use serde::Serialize;
use utoipa::ToSchema;
use workspace::WorkspaceError;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    /// Well-formed request the service cannot act on
    Unprocessable(String),
    /// A generative capability failed before the repair loop started
    BadGateway(String),
    Internal(String),
    Database(db::DbError),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", msg)
            }
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "capability_error", msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                match err {
                    db::DbError::CaseNotFound(id) => (
                        StatusCode::NOT_FOUND,
                        "not_found",
                        format!("Case not found: {}", id),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "database_error",
                        "Database error occurred".to_string(),
                    ),
                }
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<db::DbError> for AppError {
    fn from(err: db::DbError) -> Self {
        AppError::Database(err)
    }
}

impl From<WorkspaceError> for AppError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::RunNotFound(id) => AppError::NotFound(format!("Run not found: {}", id)),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ContractError> for AppError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::Io(e) => AppError::Internal(e.to_string()),
            other => AppError::Unprocessable(other.to_string()),
        }
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(msg) => AppError::BadRequest(msg),
            OrchestratorError::Contract(e) => e.into(),
            OrchestratorError::Capability(e) => AppError::BadGateway(e.to_string()),
            e @ OrchestratorError::InvalidArtifact { .. } => AppError::Unprocessable(e.to_string()),
            OrchestratorError::Workspace(e) => e.into(),
            OrchestratorError::Database(e) => e.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}
