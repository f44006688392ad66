//! LLM integration for the trainer.
//!
//! The session machine only sees the [`LlmProvider`] trait. The production
//! implementation is [`GeminiProvider`], which calls the Gemini REST API
//! directly with `reqwest`. A [`Connector`] turns a credential into a
//! provider so each client can bring its own API key.

pub mod gemini;

pub use gemini::{GeminiConnector, GeminiProvider};

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MODELS;
use crate::error::LlmError;

/// Author of a turn in the history sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human side of the chat (the representative).
    User,
    /// The model side of the chat (the simulated customer).
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// A single prior turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

/// A prompt plus optional prior history, sent as one `generateContent` call.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Earlier turns, oldest first.
    pub history: Vec<ChatMessage>,
    /// The new user turn.
    pub prompt: String,
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            history: Vec::new(),
            prompt: prompt.into(),
            temperature: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A hosted text-generation service.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and error messages.
    fn name(&self) -> &str;

    /// Generate text with the given model.
    async fn generate(&self, model: &str, request: GenerationRequest) -> Result<String, LlmError>;

    /// Identifiers of the models that support content generation.
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

/// Builds a provider bound to a credential.
pub trait Connector: Send + Sync {
    fn connect(&self, api_key: SecretString) -> Result<Arc<dyn LlmProvider>, LlmError>;
}

/// Outcome of model discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelListing {
    pub models: Vec<String>,
    /// True when the list came from the service rather than the defaults.
    pub fetched: bool,
}

impl ModelListing {
    pub fn defaults() -> Self {
        Self {
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            fetched: false,
        }
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// The preferred model if listed, otherwise the first entry.
    pub fn pick(&self, preferred: Option<&str>) -> Option<String> {
        preferred
            .filter(|p| self.contains(p))
            .map(str::to_string)
            .or_else(|| self.models.first().cloned())
    }
}

/// List models that can generate content, failing soft to [`DEFAULT_MODELS`].
///
/// With no provider (no credential yet) the defaults are returned directly.
pub async fn list_available_models(provider: Option<&dyn LlmProvider>) -> ModelListing {
    let Some(provider) = provider else {
        return ModelListing::defaults();
    };

    match provider.list_models().await {
        Ok(models) if !models.is_empty() => {
            tracing::info!(provider = provider.name(), count = models.len(), "Fetched model list");
            ModelListing {
                models,
                fetched: true,
            }
        }
        Ok(_) => {
            tracing::warn!(provider = provider.name(), "Model list was empty, using defaults");
            ModelListing::defaults()
        }
        Err(e) => {
            tracing::warn!(
                provider = provider.name(),
                error = %e,
                "Model list fetch failed, using defaults"
            );
            ModelListing::defaults()
        }
    }
}
