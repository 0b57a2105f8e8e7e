use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReduceContractRequest {
    /// Operation tags to keep
    #[serde(default)]
    pub tags: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/contract/reduce",
    request_body = ReduceContractRequest,
    responses(
        (status = 200, description = "Contract with only the selected operations and the components they reference"),
        (status = 422, description = "Contract document missing or unreadable", body = crate::error::ErrorResponse)
    ),
    tag = "contract"
)]
pub async fn reduce_contract(
    State(state): State<AppState>,
    Json(payload): Json<ReduceContractRequest>,
) -> Result<Json<Value>, AppError> {
    let reduced = state.pipeline.reduce_contract(&payload.tags).await?;
    Ok(Json(reduced))
}
