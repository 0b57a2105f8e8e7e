use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::context::FlowKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Ui,
    Api,
}

impl CaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Api => "api",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ui" => Some(Self::Ui),
            "api" => Some(Self::Api),
            _ => None,
        }
    }
}

impl From<FlowKind> for CaseType {
    fn from(flow: FlowKind) -> Self {
        match flow {
            FlowKind::Ui => Self::Ui,
            FlowKind::Api => Self::Api,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Harness accepted the generated suite
    Validated,
    /// Attempts exhausted, a human has to look at the last tree
    #[default]
    NeedsReview,
    /// Run aborted before a usable tree existed
    Failed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validated => "validated",
            Self::NeedsReview => "needs_review",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "validated" => Some(Self::Validated),
            "needs_review" => Some(Self::NeedsReview),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Stored metadata of one generated test suite.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Case {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub case_type: CaseType,
    pub status: CaseStatus,
    pub plan: Option<String>,
    /// Final tree serialized as `directory_structure` JSON
    #[schema(value_type = Option<Object>)]
    pub code: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        case_type: CaseType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            case_type,
            status: CaseStatus::default(),
            plan: None,
            code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_status(mut self, status: CaseStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_plan(mut self, plan: impl Into<String>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    pub fn with_code(mut self, code: serde_json::Value) -> Self {
        self.code = Some(code);
        self
    }
}
