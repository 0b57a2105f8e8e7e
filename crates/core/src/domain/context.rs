use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};

const MAX_TARGET_LEN: usize = 100;
const MAX_REQUIREMENT_LEN: usize = 10_000;
const MAX_TOKEN_LEN: usize = 100;
const MAX_TAGS: usize = 100;

/// Which kind of system under test a request targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// A web page, driven through a browser automation harness
    Ui,
    /// An HTTP API described by an interface-description document
    Api,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ui => "ui",
            Self::Api => "api",
        }
    }
}

/// Everything a single generation request carries. Never mutated after
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecContext {
    pub flow: FlowKind,
    /// Target page URL (UI flow) or base endpoint (API flow)
    pub target: String,
    /// Free-text requirement
    pub requirement: String,
    pub token: Option<String>,
    /// Selected contract tags (API flow only)
    pub tags: Option<Vec<String>>,
}

impl SpecContext {
    pub fn ui(url: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self {
            flow: FlowKind::Ui,
            target: url.into(),
            requirement: requirement.into(),
            token: None,
            tags: None,
        }
    }

    pub fn api(
        base_endpoint: impl Into<String>,
        requirement: impl Into<String>,
        token: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            flow: FlowKind::Api,
            target: base_endpoint.into(),
            requirement: requirement.into(),
            token,
            tags: Some(tags),
        }
    }

    /// Selected tags, empty when none were given.
    pub fn selected_tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }

    /// Check request fields before any work is started.
    pub fn validate(&self) -> Result<()> {
        let target = self.target.trim();
        if target.is_empty() {
            return Err(CoreError::Validation("target must not be empty".to_string()));
        }
        if target.chars().count() > MAX_TARGET_LEN {
            return Err(CoreError::Validation(format!(
                "target exceeds {} characters",
                MAX_TARGET_LEN
            )));
        }
        if !(target.starts_with("http://") || target.starts_with("https://")) {
            return Err(CoreError::Validation(format!(
                "target must be an http(s) URL: {}",
                target
            )));
        }

        if self.requirement.trim().is_empty() {
            return Err(CoreError::Validation(
                "requirement text must not be empty".to_string(),
            ));
        }
        if self.requirement.chars().count() > MAX_REQUIREMENT_LEN {
            return Err(CoreError::Validation(format!(
                "requirement text exceeds {} characters",
                MAX_REQUIREMENT_LEN
            )));
        }

        if let Some(token) = &self.token {
            if token.chars().count() > MAX_TOKEN_LEN {
                return Err(CoreError::Validation(format!(
                    "token exceeds {} characters",
                    MAX_TOKEN_LEN
                )));
            }
        }

        if self.selected_tags().len() > MAX_TAGS {
            return Err(CoreError::Validation(format!(
                "at most {} tags may be selected",
                MAX_TAGS
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_context_valid() {
        let ctx = SpecContext::ui("https://example.com/login", "Check the login form");
        assert_eq!(ctx.flow, FlowKind::Ui);
        assert!(ctx.validate().is_ok());
        assert!(ctx.selected_tags().is_empty());
    }

    #[test]
    fn test_api_context_keeps_tags() {
        let ctx = SpecContext::api(
            "https://api.example.com/v1",
            "Cover user creation",
            Some("secret".to_string()),
            vec!["users".to_string()],
        );
        assert!(ctx.validate().is_ok());
        assert_eq!(ctx.selected_tags(), ["users".to_string()]);
    }

    #[test]
    fn test_empty_requirement_rejected() {
        let ctx = SpecContext::ui("https://example.com", "   ");
        assert!(matches!(ctx.validate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_non_http_target_rejected() {
        let ctx = SpecContext::ui("ftp://example.com", "text");
        assert!(matches!(ctx.validate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_long_target_rejected() {
        let url = format!("https://example.com/{}", "a".repeat(100));
        let ctx = SpecContext::ui(url, "text");
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_long_token_rejected() {
        let ctx = SpecContext::api(
            "https://api.example.com",
            "text",
            Some("t".repeat(101)),
            vec![],
        );
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_flow_kind_as_str() {
        assert_eq!(FlowKind::Ui.as_str(), "ui");
        assert_eq!(FlowKind::Api.as_str(), "api");
    }
}
