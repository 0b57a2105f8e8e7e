use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use crate::error::AppError;
use crate::registry::RunSummary;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/runs/{id}",
    params(("id" = Uuid, Path, description = "Run id")),
    responses(
        (status = 200, description = "Run summary", body = RunSummary),
        (status = 404, description = "Unknown run", body = crate::error::ErrorResponse)
    ),
    tag = "runs"
)]
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RunSummary>, AppError> {
    state
        .runs
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Run not found: {}", id)))
}

#[utoipa::path(
    get,
    path = "/api/v1/runs/{id}/archive",
    params(("id" = Uuid, Path, description = "Run id")),
    responses(
        (status = 200, description = "Zip archive of the generated test project"),
        (status = 404, description = "Unknown run", body = crate::error::ErrorResponse)
    ),
    tag = "runs"
)]
pub async fn get_run_archive(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let run = state.pipeline.workspaces().open_run(id).await?;
    let bytes = workspace::archive::archive_bytes(&run.project_dir).await?;
    tracing::debug!(run_id = %id, bytes = bytes.len(), "Serving run archive");

    let disposition = format!("attachment; filename=\"testforge-{}.zip\"", id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
