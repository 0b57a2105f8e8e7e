use async_trait::async_trait;
use serde_json::{Map, Value};
use testforge_core::{ArtifactTree, TestPlan};

use crate::error::{CapabilityError, Result};

const TREE_KEY: &str = "directory_structure";

/// Input shared by planning and code generation for one request.
#[derive(Debug, Clone)]
pub enum GenerationContext {
    Ui {
        url: String,
        requirement: String,
        /// Page markup with vector graphics stripped
        page_html: String,
    },
    Api {
        base_endpoint: String,
        requirement: String,
        token: Option<String>,
        /// Reduced contract rendered as YAML
        contract: String,
    },
}

impl GenerationContext {
    pub fn requirement(&self) -> &str {
        match self {
            Self::Ui { requirement, .. } | Self::Api { requirement, .. } => requirement,
        }
    }
}

/// One code generation call. `repair` carries the full tree of the attempt
/// that failed validation.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactRequest<'a> {
    pub context: &'a GenerationContext,
    pub plan: &'a TestPlan,
    pub repair: Option<&'a ArtifactTree>,
}

impl<'a> ArtifactRequest<'a> {
    pub fn initial(context: &'a GenerationContext, plan: &'a TestPlan) -> Self {
        Self {
            context,
            plan,
            repair: None,
        }
    }

    pub fn repair(
        context: &'a GenerationContext,
        plan: &'a TestPlan,
        failed: &'a ArtifactTree,
    ) -> Self {
        Self {
            context,
            plan,
            repair: Some(failed),
        }
    }
}

/// Raw generator output: the object found under `directory_structure`.
///
/// Not yet validated as a tree; that happens when it is materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArtifact {
    pub structure: Value,
}

impl GeneratedArtifact {
    pub fn new(structure: Value) -> Self {
        Self { structure }
    }

    /// Parse a completion that should hold `{"directory_structure": {...}}`.
    pub fn from_completion(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(strip_code_fence(content))
            .map_err(|e| CapabilityError::MalformedResponse(format!("not JSON: {}", e)))?;

        let Value::Object(mut root) = value else {
            return Err(CapabilityError::MalformedResponse(
                "response is not a JSON object".to_string(),
            ));
        };

        match root.remove(TREE_KEY) {
            Some(structure @ Value::Object(_)) => Ok(Self { structure }),
            Some(_) => Err(CapabilityError::MalformedResponse(format!(
                "'{}' is not an object",
                TREE_KEY
            ))),
            None => Err(CapabilityError::MalformedResponse(format!(
                "missing '{}' key",
                TREE_KEY
            ))),
        }
    }

    /// `{"directory_structure": ...}` wrapper used when sending a tree back.
    pub fn wrap(tree: &ArtifactTree) -> Value {
        let mut root = Map::new();
        root.insert(TREE_KEY.to_string(), tree.to_json());
        Value::Object(root)
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches("json");
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[async_trait]
pub trait PlanAdapter: Send + Sync {
    async fn plan(&self, context: &GenerationContext) -> Result<TestPlan>;
}

#[async_trait]
pub trait ArtifactAdapter: Send + Sync {
    async fn generate(&self, request: &ArtifactRequest<'_>) -> Result<GeneratedArtifact>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_completion_extracts_structure() {
        let artifact = GeneratedArtifact::from_completion(
            r#"{"directory_structure": {"tests/": {"test_a.py": "x"}}}"#,
        )
        .unwrap();
        assert_eq!(artifact.structure, json!({"tests/": {"test_a.py": "x"}}));
    }

    #[test]
    fn test_from_completion_accepts_fenced_json() {
        let artifact = GeneratedArtifact::from_completion(
            "```json\n{\"directory_structure\": {\"a.py\": \"\"}}\n```",
        )
        .unwrap();
        assert_eq!(artifact.structure["a.py"], "");
    }

    #[test]
    fn test_from_completion_rejects_bad_shapes() {
        for content in [
            "not json",
            "[1, 2]",
            r#"{"files": {}}"#,
            r#"{"directory_structure": "tests"}"#,
        ] {
            assert!(
                matches!(
                    GeneratedArtifact::from_completion(content),
                    Err(CapabilityError::MalformedResponse(_))
                ),
                "accepted {content}"
            );
        }
    }

    #[test]
    fn test_wrap_tree() {
        let tree = ArtifactTree::new().with_file("a.py", "x");
        assert_eq!(
            GeneratedArtifact::wrap(&tree),
            json!({"directory_structure": {"a.py": "x"}})
        );
    }

    #[test]
    fn test_context_requirement() {
        let ctx = GenerationContext::Api {
            base_endpoint: "https://api.example.com".into(),
            requirement: "cover users".into(),
            token: None,
            contract: String::new(),
        };
        assert_eq!(ctx.requirement(), "cover users");
    }
}
