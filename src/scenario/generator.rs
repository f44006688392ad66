//! Scenario generator: asks the model for a customer and parses the reply.

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmProvider};

use super::campaign::{Campaign, Mood};
use super::profile::{CustomerProfile, parse_profile};
use super::prompts::profile_prompt;

/// Configuration for customer generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Base URL of the avatar image service; the seed is appended as a query.
    pub avatar_base_url: String,
    pub temperature: Option<f32>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            avatar_base_url: crate::config::DEFAULT_AVATAR_BASE_URL.to_string(),
            temperature: None,
        }
    }
}

/// Reference to a generated placeholder portrait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Avatar {
    pub seed: u16,
    pub url: String,
}

impl Avatar {
    /// Pick a random 4-digit seed.
    pub fn random(base_url: &str) -> Self {
        let seed = rand::thread_rng().gen_range(1000..=9999);
        Self::from_seed(base_url, seed)
    }

    pub fn from_seed(base_url: &str, seed: u16) -> Self {
        Self {
            seed,
            url: format!("{base_url}?seed={seed}"),
        }
    }
}

/// A freshly generated customer.
#[derive(Debug, Clone)]
pub struct GeneratedCustomer {
    pub profile: CustomerProfile,
    pub avatar: Avatar,
}

/// Builds customer profiles from a campaign and mood.
#[derive(Debug, Clone, Default)]
pub struct ScenarioGenerator {
    config: GeneratorConfig,
}

impl ScenarioGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a customer profile with `model`.
    ///
    /// The profile may be sparse or carry unexpected labels; that is not an
    /// error. Only a failed call to the provider is.
    pub async fn generate_profile(
        &self,
        llm: &dyn LlmProvider,
        model: &str,
        campaign: Campaign,
        mood: Mood,
    ) -> Result<GeneratedCustomer, LlmError> {
        info!(
            model,
            campaign = campaign.id(),
            mood = mood.id(),
            "Generating customer profile"
        );

        let request = GenerationRequest::new(profile_prompt(campaign, mood))
            .with_temperature(self.config.temperature);
        let text = llm.generate(model, request).await?;

        let profile = parse_profile(&text);
        if profile.is_empty() {
            warn!(model, "Generated profile has no labelled fields");
        }

        let avatar = Avatar::random(&self.config.avatar_base_url);
        info!(fields = profile.len(), avatar_seed = avatar.seed, "Customer profile ready");

        Ok(GeneratedCustomer { profile, avatar })
    }
}
