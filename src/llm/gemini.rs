//! Gemini REST client.
//!
//! Talks to `generateContent` and the model listing endpoint. The API key is
//! sent in the `x-goog-api-key` header so it never appears in URLs or logs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, Connector, GenerationRequest, LlmProvider};
use crate::error::LlmError;

const PROVIDER: &str = "gemini";
const API_VERSION: &str = "v1beta";
const GENERATE_METHOD: &str = "generateContent";
/// Upper bound on model list pages, in case the service keeps returning tokens.
const MAX_LIST_PAGES: usize = 20;

/// Creates [`GeminiProvider`]s that share one HTTP client.
#[derive(Clone)]
pub struct GeminiConnector {
    client: Client,
    base_url: String,
}

impl GeminiConnector {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl Connector for GeminiConnector {
    fn connect(&self, api_key: SecretString) -> Result<Arc<dyn LlmProvider>, LlmError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
            });
        }
        Ok(Arc::new(GeminiProvider {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key,
        }))
    }
}

/// Gemini provider bound to one API key.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl GeminiProvider {
    /// Standalone provider with its own HTTP client.
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn models_url(&self) -> String {
        format!("{}/{API_VERSION}/models", self.base_url)
    }

    fn generate_url(&self, model: &str) -> String {
        let model = model.trim_start_matches("models/");
        format!("{}/{API_VERSION}/models/{model}:{GENERATE_METHOD}", self.base_url)
    }

    fn key_header(&self) -> Result<HeaderValue, LlmError> {
        HeaderValue::from_str(self.api_key.expose_secret()).map_err(|_| LlmError::AuthFailed {
            provider: PROVIDER.to_string(),
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, model: &str, request: GenerationRequest) -> Result<String, LlmError> {
        let body = GenerateContentRequest::from_request(&request);
        debug!(
            model,
            history = request.history.len(),
            prompt_chars = request.prompt.chars().count(),
            "Sending generateContent"
        );

        let response = self
            .client
            .post(self.generate_url(model))
            .header("x-goog-api-key", self.key_header()?)
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body, model, retry_after));
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to parse generateContent response: {e}"),
            })?;

        extract_text(parsed)
    }

    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let mut query: Vec<(&str, String)> = vec![("pageSize", "1000".to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(self.models_url())
                .header("x-goog-api-key", self.key_header()?)
                .query(&query)
                .send()
                .await
                .map_err(request_failed)?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(map_http_error(status, &body, "*", None));
            }

            let page: ListModelsResponse =
                response.json().await.map_err(|e| LlmError::InvalidResponse {
                    provider: PROVIDER.to_string(),
                    reason: format!("Failed to parse model list: {e}"),
                })?;

            models.extend(
                page.models
                    .into_iter()
                    .filter(|m| m.supported_generation_methods.iter().any(|g| g == GENERATE_METHOD))
                    .map(|m| m.name.trim_start_matches("models/").to_string()),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    fn from_request(request: &GenerationRequest) -> Self {
        let mut contents: Vec<Content> = request.history.iter().map(Content::from).collect();
        contents.push(Content::from(&ChatMessage::user(request.prompt.clone())));
        Self {
            contents,
            generation_config: request
                .temperature
                .map(|temperature| GenerationConfig { temperature }),
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<TextPart>,
}

impl From<&ChatMessage> for Content {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            parts: vec![TextPart {
                text: message.content.clone(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn build_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: format!("Failed to build HTTP client: {e}"),
        })
}

fn request_failed(err: reqwest::Error) -> LlmError {
    LlmError::RequestFailed {
        provider: PROVIDER.to_string(),
        reason: format!("Gemini API request failed: {err}"),
    }
}

/// Join the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("prompt blocked: {reason}"),
        });
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "no candidates in response".to_string(),
        })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!(
                "candidate has no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        });
    }

    Ok(text)
}

fn map_http_error(
    status: StatusCode,
    body: &str,
    model: &str,
    retry_after: Option<Duration>,
) -> LlmError {
    let (status_text, message) = serde_json::from_str::<ErrorWrapper>(body)
        .map(|w| {
            (
                w.error.status.unwrap_or_default(),
                w.error.message.unwrap_or_else(|| body.to_string()),
            )
        })
        .unwrap_or_else(|_| (String::new(), body.to_string()));

    let bad_key = status_text == "UNAUTHENTICATED"
        || message.contains("API key not valid")
        || body.contains("API_KEY_INVALID");

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthFailed {
            provider: PROVIDER.to_string(),
        },
        StatusCode::BAD_REQUEST if bad_key => LlmError::AuthFailed {
            provider: PROVIDER.to_string(),
        },
        StatusCode::NOT_FOUND => LlmError::ModelNotAvailable {
            provider: PROVIDER.to_string(),
            model: model.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
            provider: PROVIDER.to_string(),
            retry_after,
        },
        _ => LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: if status_text.is_empty() {
                format!("{status}: {message}")
            } else {
                format!("{status} {status_text}: {message}")
            },
        },
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
