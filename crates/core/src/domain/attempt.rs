use serde::{Deserialize, Serialize};

use super::artifact::ArtifactTree;

/// Natural-language test plan produced once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestPlan(String);

impl TestPlan {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for TestPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classified result of one harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success {
        exit_code: i32,
    },
    /// The harness ran (or was killed) and reported failure. `exit_code` is
    /// `None` when the process was terminated by a signal or timed out.
    FailureRetryable {
        exit_code: Option<i32>,
        output: String,
    },
    /// The harness executable could not be started at all.
    ToolUnavailable {
        program: String,
        reason: String,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionResult::Success { exit_code } => Some(*exit_code),
            ExecutionResult::FailureRetryable { exit_code, .. } => *exit_code,
            ExecutionResult::ToolUnavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Validated { result: ExecutionResult },
    GenerationFailed { reason: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Validated { result } if result.is_success())
    }
}

/// One pass of generate, materialize, validate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based
    pub number: u32,
    pub tree: Option<ArtifactTree>,
    pub outcome: AttemptOutcome,
}

impl Attempt {
    pub fn validated(number: u32, tree: ArtifactTree, result: ExecutionResult) -> Self {
        Self {
            number,
            tree: Some(tree),
            outcome: AttemptOutcome::Validated { result },
        }
    }

    pub fn generation_failed(number: u32, reason: impl Into<String>) -> Self {
        Self {
            number,
            tree: None,
            outcome: AttemptOutcome::GenerationFailed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_result_exit_code() {
        assert_eq!(ExecutionResult::Success { exit_code: 0 }.exit_code(), Some(0));
        let timed_out = ExecutionResult::FailureRetryable {
            exit_code: None,
            output: "timed out".to_string(),
        };
        assert_eq!(timed_out.exit_code(), None);
        assert!(!timed_out.is_success());
    }

    #[test]
    fn test_attempt_success_only_when_validated_ok() {
        let tree = ArtifactTree::new().with_file("a.py", "");
        let ok = Attempt::validated(1, tree.clone(), ExecutionResult::Success { exit_code: 0 });
        assert!(ok.is_success());

        let failed = Attempt::validated(
            2,
            tree,
            ExecutionResult::FailureRetryable {
                exit_code: Some(2),
                output: String::new(),
            },
        );
        assert!(!failed.is_success());

        let no_tree = Attempt::generation_failed(3, "timeout");
        assert!(!no_tree.is_success());
        assert!(no_tree.tree.is_none());
    }

    #[test]
    fn test_execution_result_serialization() {
        let json = serde_json::to_value(ExecutionResult::ToolUnavailable {
            program: "pytest".to_string(),
            reason: "not found".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "tool_unavailable");
        assert_eq!(json["program"], "pytest");
    }

    #[test]
    fn test_plan_is_transparent() {
        let plan = TestPlan::new("1. open page");
        assert_eq!(serde_json::to_string(&plan).unwrap(), "\"1. open page\"");
        assert_eq!(plan.to_string(), "1. open page");
    }
}
