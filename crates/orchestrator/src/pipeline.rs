use std::path::PathBuf;
use std::sync::Arc;

use capability::{GenerationContext, PageFetcher, PlanAdapter};
use contract::ContractDocument;
use db::CaseRepository;
use events::{EventBus, Milestone, ProgressEvent};
use serde_json::Value;
use testforge_core::{ArtifactTree, Attempt, Case, CaseStatus, FlowKind, SpecContext, TestPlan};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use workspace::WorkspaceManager;

use crate::emitter::ProgressEmitter;
use crate::error::{OrchestratorError, Result};
use crate::repair_loop::RepairLoop;
use crate::state_machine::LoopState;

const PLAN_FILE: &str = "test_plan.md";
const CASE_NAME_LEN: usize = 60;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Interface-description document used by the API flow
    pub contract_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            contract_path: PathBuf::from("openapi.yaml"),
        }
    }
}

impl PipelineConfig {
    pub fn new(contract_path: impl Into<PathBuf>) -> Self {
        Self {
            contract_path: contract_path.into(),
        }
    }
}

/// Outcome of one generation request.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub flow: FlowKind,
    pub state: LoopState,
    pub plan: TestPlan,
    pub attempts: Vec<Attempt>,
    pub rollbacks: u32,
    pub final_tree: Option<ArtifactTree>,
    pub project_dir: PathBuf,
    /// Absent when the case record could not be stored
    pub case_id: Option<Uuid>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == LoopState::Succeeded
    }
}

/// Drives one request from validated input to a persisted case: context,
/// plan, repair loop.
pub struct AgentPipeline {
    planner: Arc<dyn PlanAdapter>,
    pages: Arc<dyn PageFetcher>,
    repair_loop: RepairLoop,
    workspaces: WorkspaceManager,
    bus: EventBus,
    cases: Option<CaseRepository>,
    config: PipelineConfig,
}

impl AgentPipeline {
    pub fn new(
        planner: Arc<dyn PlanAdapter>,
        pages: Arc<dyn PageFetcher>,
        repair_loop: RepairLoop,
        workspaces: WorkspaceManager,
        bus: EventBus,
        config: PipelineConfig,
    ) -> Self {
        Self {
            planner,
            pages,
            repair_loop,
            workspaces,
            bus,
            cases: None,
            config,
        }
    }

    pub fn with_cases(mut self, cases: CaseRepository) -> Self {
        self.cases = Some(cases);
        self
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the configured contract and keep only what the given tags need.
    pub async fn reduce_contract(&self, tags: &[String]) -> Result<Value> {
        let document = ContractDocument::load(&self.config.contract_path).await?;
        Ok(document.reduce(tags))
    }

    pub async fn run(&self, spec: SpecContext) -> Result<RunReport> {
        self.run_with_id(Uuid::new_v4(), spec).await
    }

    /// Run with a caller-chosen id so observers can filter on it before the
    /// first event is published.
    pub async fn run_with_id(&self, run_id: Uuid, spec: SpecContext) -> Result<RunReport> {
        spec.validate()?;
        info!(run_id = %run_id, flow = spec.flow.as_str(), "Starting run");

        let context = self.build_context(&spec).await?;
        let run = self.workspaces.create_run(run_id).await?;
        let emitter = ProgressEmitter::new(self.bus.clone(), run_id);

        let plan = self.planner.plan(&context).await.map_err(|e| {
            error!(run_id = %run_id, error = %e, "Planning failed");
            OrchestratorError::from(e)
        })?;
        emitter.emit(
            Milestone::PlanReady,
            None,
            ProgressEvent::TestPlan(plan.as_str().to_string()),
        );
        tokio::fs::write(run.root.join(PLAN_FILE), plan.as_str()).await?;
        debug!(run_id = %run_id, "Test plan written");

        match self.repair_loop.run(&context, &plan, &run, &emitter).await {
            Ok(report) => {
                let status = if report.succeeded() {
                    CaseStatus::Validated
                } else {
                    CaseStatus::NeedsReview
                };
                let case_id = self
                    .persist_case(&spec, &plan, report.final_tree.as_ref(), status)
                    .await;

                info!(
                    run_id = %run_id,
                    state = %report.state,
                    attempts = report.attempts.len(),
                    rollbacks = report.rollbacks,
                    "Run finished"
                );

                Ok(RunReport {
                    run_id,
                    flow: spec.flow,
                    state: report.state,
                    plan,
                    attempts: report.attempts,
                    rollbacks: report.rollbacks,
                    final_tree: report.final_tree,
                    project_dir: run.project_dir,
                    case_id,
                })
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Run aborted");
                self.persist_case(&spec, &plan, None, CaseStatus::Failed)
                    .await;
                Err(e)
            }
        }
    }

    async fn build_context(&self, spec: &SpecContext) -> Result<GenerationContext> {
        match spec.flow {
            FlowKind::Ui => {
                let html = self.pages.fetch(&spec.target).await?;
                Ok(GenerationContext::Ui {
                    url: spec.target.clone(),
                    requirement: spec.requirement.clone(),
                    page_html: html,
                })
            }
            FlowKind::Api => {
                let reduced = self.reduce_contract(spec.selected_tags()).await?;
                let contract = ContractDocument::to_yaml(&reduced)?;
                Ok(GenerationContext::Api {
                    base_endpoint: spec.target.clone(),
                    requirement: spec.requirement.clone(),
                    token: spec.token.clone(),
                    contract,
                })
            }
        }
    }

    /// Store the case record. Failures are logged and otherwise ignored.
    async fn persist_case(
        &self,
        spec: &SpecContext,
        plan: &TestPlan,
        tree: Option<&ArtifactTree>,
        status: CaseStatus,
    ) -> Option<Uuid> {
        let cases = self.cases.as_ref()?;

        let mut case = Case::new(case_name(&spec.requirement), &spec.requirement, spec.flow.into())
            .with_status(status)
            .with_plan(plan.as_str());
        if let Some(tree) = tree {
            case = case.with_code(tree.to_json());
        }

        match cases.create(&case).await {
            Ok(stored) => Some(stored.id),
            Err(e) => {
                error!(case_id = %case.id, error = %e, "Failed to store case");
                None
            }
        }
    }
}

/// First line of the requirement, shortened for listings.
fn case_name(requirement: &str) -> String {
    let first_line = requirement.trim().lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= CASE_NAME_LEN {
        first_line.to_string()
    } else {
        let mut name: String = first_line.chars().take(CASE_NAME_LEN - 3).collect();
        name.push_str("...");
        name
    }
}
