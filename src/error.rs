//! Error types for the NEXUS trainer.

use std::time::Duration;

use crate::session::Stage;

/// Suggestion shown alongside any failure talking to the generation service.
pub const SWITCH_MODEL_HINT: &str =
    "エラーが出た場合、使用モデルを別のもの（例: gemini-1.5-flash）に変更して再試行してください。";

/// Top-level error type for the trainer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl Error {
    /// Short machine-readable category, sent to clients with the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Llm(_) => "external_service",
            Self::Session(_) => "session",
        }
    }

    /// Follow-up advice for the trainee, if any.
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Llm(_) => Some(SWITCH_MODEL_HINT),
            _ => None,
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown model {model}; choose one of the listed models")]
    UnknownModel { model: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Model {model} not available on provider {provider}")]
    ModelNotAvailable { provider: String, model: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Session state machine errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot {action} while the session is {stage}")]
    InvalidTransition { stage: Stage, action: String },

    #[error("Nothing to say: the representative line is empty")]
    EmptyUtterance,
}

/// Result type alias for the trainer.
pub type Result<T> = std::result::Result<T, Error>;
