use async_trait::async_trait;
use testforge_core::TestPlan;
use tracing::{debug, info};

use crate::adapter::{ArtifactAdapter, ArtifactRequest, GeneratedArtifact, GenerationContext, PlanAdapter};
use crate::client::{ChatClient, ChatMessage, ChatRequest};
use crate::error::{CapabilityError, Result};
use crate::prompts;

/// Model, sampling temperature and output budget for one kind of call
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelSettings {
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    fn request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest::new(&self.model, messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

pub struct LlmPlanAdapter {
    client: ChatClient,
    settings: ModelSettings,
}

impl LlmPlanAdapter {
    pub fn new(client: ChatClient, settings: ModelSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl PlanAdapter for LlmPlanAdapter {
    async fn plan(&self, context: &GenerationContext) -> Result<TestPlan> {
        let prompt = match context {
            GenerationContext::Ui {
                url,
                requirement,
                page_html,
            } => prompts::ui_plan_prompt(url, requirement, page_html),
            GenerationContext::Api {
                base_endpoint,
                requirement,
                token,
                contract,
            } => prompts::api_plan_prompt(base_endpoint, contract, token.as_deref(), requirement),
        };

        let request = self.settings.request(vec![ChatMessage::system(prompt)]);
        let text = self.client.complete(&request).await?;

        info!(model = %self.settings.model, chars = text.len(), "Test plan received");
        Ok(TestPlan::new(text))
    }
}

pub struct LlmArtifactAdapter {
    client: ChatClient,
    settings: ModelSettings,
}

impl LlmArtifactAdapter {
    pub fn new(client: ChatClient, settings: ModelSettings) -> Self {
        Self { client, settings }
    }

    fn messages(request: &ArtifactRequest<'_>) -> Result<Vec<ChatMessage>> {
        if let Some(failed) = request.repair {
            let previous = serde_json::to_string(&GeneratedArtifact::wrap(failed))
                .map_err(|e| CapabilityError::MalformedResponse(e.to_string()))?;
            return Ok(vec![
                ChatMessage::system(prompts::REPAIR_PROMPT),
                ChatMessage::system(previous),
            ]);
        }

        let plan = request.plan.as_str();
        Ok(match request.context {
            GenerationContext::Ui { page_html, .. } => vec![
                ChatMessage::system(prompts::ui_code_prompt()),
                ChatMessage::user(prompts::ui_code_input(plan, page_html)),
            ],
            GenerationContext::Api {
                base_endpoint,
                token,
                contract,
                ..
            } => vec![ChatMessage::system(prompts::api_code_prompt(
                plan,
                base_endpoint,
                contract,
                token.as_deref(),
            ))],
        })
    }
}

#[async_trait]
impl ArtifactAdapter for LlmArtifactAdapter {
    async fn generate(&self, request: &ArtifactRequest<'_>) -> Result<GeneratedArtifact> {
        let messages = Self::messages(request)?;
        let chat = self.settings.request(messages).json();

        debug!(
            model = %self.settings.model,
            repair = request.repair.is_some(),
            "Requesting artifact tree"
        );

        let content = self.client.complete(&chat).await?;
        GeneratedArtifact::from_completion(&content)
    }
}
