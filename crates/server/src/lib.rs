pub mod error;
pub mod messages;
pub mod registry;
pub mod routes;
pub mod settings;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "testforge API",
        version = "0.1.0",
        description = "Generates, validates and repairs automated test projects for web pages and HTTP APIs"
    ),
    paths(
        routes::health_check,
        routes::ui_agent_entry_point,
        routes::api_agent_entry_point,
        routes::reduce_contract,
        routes::websocket_handler,
        routes::get_run,
        routes::get_run_archive,
        routes::list_cases,
        routes::get_case,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::UiAgentRequest,
        routes::ApiAgentRequest,
        routes::AgentResponse,
        routes::ReduceContractRequest,
        registry::RunSummary,
        registry::AttemptSummary,
        error::ErrorResponse,
        testforge_core::Case,
        testforge_core::CaseType,
        testforge_core::CaseStatus,
        testforge_core::FlowKind,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "agents", description = "Test generation entry points"),
        (name = "contract", description = "Interface-description reduction"),
        (name = "events", description = "Real-time progress (WebSocket)"),
        (name = "runs", description = "Run summaries and archives"),
        (name = "cases", description = "Stored test cases"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health_check))
        .route("/ui_agent_entry_point", post(routes::ui_agent_entry_point))
        .route("/api_agent_entry_point", post(routes::api_agent_entry_point))
        .route("/contract/reduce", post(routes::reduce_contract))
        .route("/ws", get(routes::websocket_handler))
        .route("/runs/{id}", get(routes::get_run))
        .route("/runs/{id}/archive", get(routes::get_run_archive))
        .route("/cases", get(routes::list_cases))
        .route("/cases/{id}", get(routes::get_case));

    let prefix = state.settings.server.api_prefix.trim_end_matches('/').to_string();
    let router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&prefix, api)
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
