//! Progress event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use testforge_core::ArtifactTree;
use uuid::Uuid;

/// Point in a run at which an event was published
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    PlanReady,
    GenerationStarted,
    CodeReceived,
    ValidationStarted,
    Retry,
    Succeeded,
    Exhausted,
    Aborted,
}

impl Milestone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanReady => "plan_ready",
            Self::GenerationStarted => "generation_started",
            Self::CodeReceived => "code_received",
            Self::ValidationStarted => "validation_started",
            Self::Retry => "retry",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
            Self::Aborted => "aborted",
        }
    }

    /// Whether no further events follow for the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted | Self::Aborted)
    }
}

/// Payload of a progress event. Serialized under a single key:
/// `test_plan`, `directory_structure` or `status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEvent {
    TestPlan(String),
    #[serde(rename = "directory_structure")]
    Artifact(ArtifactTree),
    Status(String),
}

impl ProgressEvent {
    pub fn status(text: impl Into<String>) -> Self {
        Self::Status(text.into())
    }

    pub fn status_text(&self) -> Option<&str> {
        match self {
            Self::Status(text) => Some(text),
            _ => None,
        }
    }
}

/// Envelope wrapping a progress event with run metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub run_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub milestone: Milestone,
    /// 1-based attempt number, absent outside the repair loop
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attempt: Option<u32>,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

impl EventEnvelope {
    pub fn new(milestone: Milestone, event: ProgressEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id: None,
            timestamp: Utc::now(),
            milestone,
            attempt: None,
            event,
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}
