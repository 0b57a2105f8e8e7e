use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use capability::{
    ChatClient, ChatClientConfig, HttpPageFetcher, LlmArtifactAdapter, LlmPlanAdapter,
    ModelSettings,
};
use db::CaseRepository;
use events::EventBus;
use harness::{ExitPolicy, HarnessConfig, PytestRunner};
use orchestrator::{AgentPipeline, LoopConfig, PipelineConfig, RepairLoop};
use tracing::{info, warn};
use workspace::{WorkspaceConfig, WorkspaceManager};

use crate::registry::RunRegistry;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub event_bus: EventBus,
    pub pipeline: Arc<AgentPipeline>,
    pub cases: CaseRepository,
    pub runs: RunRegistry,
}

impl AppState {
    pub fn new(settings: Settings, pipeline: AgentPipeline, cases: CaseRepository) -> Self {
        Self {
            settings: Arc::new(settings),
            event_bus: pipeline.bus().clone(),
            pipeline: Arc::new(pipeline),
            cases,
            runs: RunRegistry::new(),
        }
    }

    /// Wire the production stack: database, chat-backed adapters, page
    /// fetcher and the subprocess harness.
    pub async fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let pool = db::create_pool(&settings.database.url)
            .await
            .context("Failed to create database pool")?;
        db::run_migrations(&pool)
            .await
            .context("Failed to run migrations")?;
        let cases = CaseRepository::new(pool);

        let cap = &settings.capability;
        let mut client_config = ChatClientConfig::new(cap.base_url.clone())
            .with_timeout(Duration::from_secs(cap.request_timeout_secs));
        match &cap.api_key {
            Some(key) => client_config = client_config.with_api_key(key.clone()),
            None => warn!("No capability API key configured, test generation is unavailable"),
        }
        let client = ChatClient::new(client_config).context("Failed to build chat client")?;

        let planner = LlmPlanAdapter::new(
            client.clone(),
            ModelSettings::new(cap.plan_model.clone(), cap.plan_temperature, cap.plan_max_tokens),
        );
        let generator = LlmArtifactAdapter::new(
            client,
            ModelSettings::new(cap.code_model.clone(), cap.code_temperature, cap.code_max_tokens),
        );
        let pages = HttpPageFetcher::new().context("Failed to build page fetcher")?;

        let h = &settings.harness;
        let policy = if h.accept_failed_assertions {
            ExitPolicy::lenient()
        } else {
            ExitPolicy::strict()
        };
        let runner = PytestRunner::new(
            HarnessConfig::new(h.program.clone())
                .with_args(h.args.clone())
                .with_timeout(Duration::from_secs(h.timeout_secs))
                .with_policy(policy),
        );

        if !settings.contract.path.exists() {
            warn!(
                path = %settings.contract.path.display(),
                "Contract document not found, API flow requests will fail until it exists"
            );
        }

        let repair_loop = RepairLoop::new(
            Arc::new(generator),
            Arc::new(runner),
            LoopConfig::new().with_max_attempts(settings.repair.max_attempts),
        );
        let pipeline = AgentPipeline::new(
            Arc::new(planner),
            Arc::new(pages),
            repair_loop,
            WorkspaceManager::new(WorkspaceConfig::new(settings.workspace.base_dir.clone())),
            EventBus::new(),
            PipelineConfig::new(settings.contract.path.clone()),
        )
        .with_cases(cases.clone());

        info!(
            base_url = %settings.capability.base_url,
            max_attempts = settings.repair.max_attempts,
            workspace = %settings.workspace.base_dir.display(),
            "Pipeline ready"
        );

        Ok(Self::new(settings, pipeline, cases))
    }
}
