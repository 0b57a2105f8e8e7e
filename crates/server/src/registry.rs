use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use orchestrator::RunReport;
use serde::Serialize;
use testforge_core::{Attempt, AttemptOutcome, ExecutionResult, FlowKind};
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

const RUNNING: &str = "running";
const FAILED: &str = "failed";
/// Runs remembered before the oldest are forgotten
const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttemptSummary {
    pub number: u32,
    pub success: bool,
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&Attempt> for AttemptSummary {
    fn from(attempt: &Attempt) -> Self {
        let (exit_code, detail) = match &attempt.outcome {
            AttemptOutcome::Validated { result } => match result {
                ExecutionResult::ToolUnavailable { program, reason } => {
                    (None, Some(format!("{} unavailable: {}", program, reason)))
                }
                other => (other.exit_code(), None),
            },
            AttemptOutcome::GenerationFailed { reason } => (None, Some(reason.clone())),
        };

        Self {
            number: attempt.number,
            success: attempt.is_success(),
            exit_code,
            detail,
        }
    }
}

/// What an observer can learn about a run after the request returned.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub flow: FlowKind,
    /// `running`, a terminal loop state, or `failed`
    pub state: String,
    pub attempts: Vec<AttemptSummary>,
    pub rollbacks: u32,
    pub case_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// In-memory index of runs started by this process, bounded in size.
///
/// When full, the oldest finished run is evicted first; the oldest running
/// one only if nothing has finished.
#[derive(Debug, Clone)]
pub struct RunRegistry {
    inner: Arc<RwLock<Runs>>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Runs {
    by_id: HashMap<Uuid, RunSummary>,
    order: VecDeque<Uuid>,
}

impl Runs {
    fn evict_one(&mut self) {
        let position = self
            .order
            .iter()
            .position(|id| {
                self.by_id
                    .get(id)
                    .is_some_and(|summary| summary.finished_at.is_some())
            })
            .unwrap_or(0);
        if let Some(id) = self.order.remove(position) {
            self.by_id.remove(&id);
        }
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Runs::default())),
            capacity: capacity.max(1),
        }
    }

    pub async fn start(&self, run_id: Uuid, flow: FlowKind) {
        let summary = RunSummary {
            run_id,
            flow,
            state: RUNNING.to_string(),
            attempts: Vec::new(),
            rollbacks: 0,
            case_id: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        };

        let mut runs = self.inner.write().await;
        if runs.by_id.insert(run_id, summary).is_none() {
            runs.order.push_back(run_id);
        }
        while runs.by_id.len() > self.capacity {
            runs.evict_one();
        }
    }

    pub async fn finish(&self, report: &RunReport) {
        let mut runs = self.inner.write().await;
        if let Some(summary) = runs.by_id.get_mut(&report.run_id) {
            summary.state = report.state.as_str().to_string();
            summary.attempts = report.attempts.iter().map(AttemptSummary::from).collect();
            summary.rollbacks = report.rollbacks;
            summary.case_id = report.case_id;
            summary.finished_at = Some(Utc::now());
        }
    }

    pub async fn fail(&self, run_id: Uuid, error: impl Into<String>) {
        let mut runs = self.inner.write().await;
        if let Some(summary) = runs.by_id.get_mut(&run_id) {
            summary.state = FAILED.to_string();
            summary.error = Some(error.into());
            summary.finished_at = Some(Utc::now());
        }
    }

    pub async fn get(&self, run_id: Uuid) -> Option<RunSummary> {
        self.inner.read().await.by_id.get(&run_id).cloned()
    }
}
