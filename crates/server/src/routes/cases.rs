use axum::extract::{Path, State};
use axum::Json;
use testforge_core::Case;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/cases",
    responses(
        (status = 200, description = "Stored cases, newest first", body = Vec<Case>)
    ),
    tag = "cases"
)]
pub async fn list_cases(State(state): State<AppState>) -> Result<Json<Vec<Case>>, AppError> {
    let cases = state.cases.find_all().await?;
    Ok(Json(cases))
}

#[utoipa::path(
    get,
    path = "/api/v1/cases/{id}",
    params(("id" = Uuid, Path, description = "Case id")),
    responses(
        (status = 200, description = "Case found", body = Case),
        (status = 404, description = "Case not found", body = crate::error::ErrorResponse)
    ),
    tag = "cases"
)]
pub async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Case>, AppError> {
    match state.cases.find_by_id(id).await? {
        Some(case) => Ok(Json(case)),
        None => Err(AppError::NotFound(format!("Case not found: {}", id))),
    }
}
