//! Generative capabilities used by the repair loop
//!
//! [`PlanAdapter`] and [`ArtifactAdapter`] are the seams the orchestrator
//! depends on. The LLM-backed implementations talk to an OpenAI-compatible
//! chat completion endpoint through [`ChatClient`].

mod adapter;
pub mod client;
mod error;
mod llm;
mod page;
pub mod prompts;

pub use adapter::{ArtifactAdapter, ArtifactRequest, GeneratedArtifact, GenerationContext, PlanAdapter};
pub use client::{ChatClient, ChatClientConfig, ChatMessage, ChatRequest, Role};
pub use error::{CapabilityError, Result};
pub use llm::{LlmArtifactAdapter, LlmPlanAdapter, ModelSettings};
pub use page::{strip_vector_tags, HttpPageFetcher, PageFetcher};
