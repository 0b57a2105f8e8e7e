use axum::extract::State;
use axum::Json;
use orchestrator::OrchestratorError;
use serde::{Deserialize, Serialize};
use testforge_core::SpecContext;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UiAgentRequest {
    /// Page under test
    pub ui_url: String,
    /// Requirement text
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApiAgentRequest {
    pub base_endpoint: String,
    /// Contract tags selecting the operations under test
    #[serde(default)]
    pub tags: Vec<String>,
    pub token: Option<String>,
    /// Requirement text
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentResponse {
    /// True only when the generated tests passed validation
    pub success: bool,
    pub run_id: Uuid,
    pub state: String,
    pub attempts: usize,
    pub rollbacks: u32,
    pub case_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/api/v1/ui_agent_entry_point",
    request_body = UiAgentRequest,
    responses(
        (status = 200, description = "Run finished", body = AgentResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 422, description = "Generated code was not a valid tree", body = crate::error::ErrorResponse),
        (status = 502, description = "Page fetch or planning failed", body = crate::error::ErrorResponse)
    ),
    tag = "agents"
)]
pub async fn ui_agent_entry_point(
    State(state): State<AppState>,
    Json(payload): Json<UiAgentRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    run_agent(&state, SpecContext::ui(payload.ui_url, payload.text)).await
}

#[utoipa::path(
    post,
    path = "/api/v1/api_agent_entry_point",
    request_body = ApiAgentRequest,
    responses(
        (status = 200, description = "Run finished", body = AgentResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 422, description = "Contract missing or generated code invalid", body = crate::error::ErrorResponse),
        (status = 502, description = "Planning failed", body = crate::error::ErrorResponse)
    ),
    tag = "agents"
)]
pub async fn api_agent_entry_point(
    State(state): State<AppState>,
    Json(payload): Json<ApiAgentRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    let token = payload.token.filter(|t| !t.trim().is_empty());
    let spec = SpecContext::api(payload.base_endpoint, payload.text, token, payload.tags);
    run_agent(&state, spec).await
}

async fn run_agent(state: &AppState, spec: SpecContext) -> Result<Json<AgentResponse>, AppError> {
    spec.validate().map_err(OrchestratorError::from)?;

    let run_id = Uuid::new_v4();
    state.runs.start(run_id, spec.flow).await;
    info!(run_id = %run_id, flow = spec.flow.as_str(), "Agent request accepted");

    match state.pipeline.run_with_id(run_id, spec).await {
        Ok(report) => {
            state.runs.finish(&report).await;
            Ok(Json(AgentResponse {
                success: report.succeeded(),
                run_id,
                state: report.state.as_str().to_string(),
                attempts: report.attempts.len(),
                rollbacks: report.rollbacks,
                case_id: report.case_id,
            }))
        }
        Err(e) => {
            warn!(run_id = %run_id, error = %e, "Agent request failed");
            state.runs.fail(run_id, e.to_string()).await;
            Err(e.into())
        }
    }
}
