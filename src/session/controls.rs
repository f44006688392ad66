//! Per-client selections: credential, model, campaign, and mood.
//!
//! These survive a session reset, the same way form selections stay put when
//! the trainee throws away a customer.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::error::{ConfigError, Error};
use crate::llm::{Connector, LlmProvider, ModelListing, list_available_models};
use crate::scenario::{Campaign, Mood};

use super::machine::Backend;

/// Sidebar state for one client.
pub struct Controls {
    pub campaign: Campaign,
    pub mood: Mood,
    provider: Option<Arc<dyn LlmProvider>>,
    model: Option<String>,
    listing: ModelListing,
    preferred_model: Option<String>,
}

impl Controls {
    /// Controls with no credential yet; the default model list is offered.
    pub fn new(preferred_model: Option<String>) -> Self {
        let listing = ModelListing::defaults();
        let model = listing.pick(preferred_model.as_deref());
        Self {
            campaign: Campaign::default(),
            mood: Mood::default(),
            provider: None,
            model,
            listing,
            preferred_model,
        }
    }

    /// Bind a provider and refresh the model list from it.
    pub async fn attach(&mut self, provider: Arc<dyn LlmProvider>) {
        let listing = list_available_models(Some(provider.as_ref())).await;
        let model = listing.pick(self.kept_model());
        self.commit(provider, listing, model);
    }

    /// Apply a `configure` request: optional new credential, optional model.
    ///
    /// Nothing changes unless the whole request succeeds.
    pub async fn configure(
        &mut self,
        connector: &dyn Connector,
        api_key: Option<SecretString>,
        model: Option<String>,
    ) -> Result<(), Error> {
        let Some(key) = api_key else {
            if let Some(model) = model {
                self.select_model(&model)?;
            }
            return Ok(());
        };

        let provider = connector.connect(key)?;
        let listing = list_available_models(Some(provider.as_ref())).await;
        let model = match model {
            Some(model) => Some(checked_model(&listing, &model)?),
            None => listing.pick(self.kept_model()),
        };
        self.commit(provider, listing, model);
        Ok(())
    }

    /// Choose a model from the current listing.
    pub fn select_model(&mut self, model: &str) -> Result<(), ConfigError> {
        self.model = Some(checked_model(&self.listing, model)?);
        Ok(())
    }

    fn kept_model(&self) -> Option<&str> {
        self.model.as_deref().or(self.preferred_model.as_deref())
    }

    fn commit(
        &mut self,
        provider: Arc<dyn LlmProvider>,
        listing: ModelListing,
        model: Option<String>,
    ) {
        self.provider = Some(provider);
        self.listing = listing;
        self.model = model;
        info!(
            fetched = self.listing.fetched,
            models = self.listing.models.len(),
            model = self.model.as_deref().unwrap_or("-"),
            "Credential configured"
        );
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn listing(&self) -> &ModelListing {
        &self.listing
    }

    pub fn has_credential(&self) -> bool {
        self.provider.is_some()
    }

    /// Provider and model for the next transition, if both are set.
    pub fn backend(&self) -> Option<Backend<'_>> {
        match (&self.provider, &self.model) {
            (Some(llm), Some(model)) => Some(Backend {
                llm: llm.as_ref(),
                model,
            }),
            _ => None,
        }
    }
}

fn checked_model(listing: &ModelListing, model: &str) -> Result<String, ConfigError> {
    let model = model.trim();
    if !listing.contains(model) {
        return Err(ConfigError::UnknownModel {
            model: model.to_string(),
        });
    }
    Ok(model.to_string())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::GenerationRequest;

    struct ListOnly(Vec<&'static str>);

    #[async_trait]
    impl LlmProvider for ListOnly {
        fn name(&self) -> &str {
            "list-only"
        }

        async fn generate(
            &self,
            _model: &str,
            _request: GenerationRequest,
        ) -> Result<String, LlmError> {
            Ok(String::new())
        }

        async fn list_models(&self) -> Result<Vec<String>, LlmError> {
            Ok(self.0.iter().map(|m| m.to_string()).collect())
        }
    }

    struct StaticConnector(Vec<&'static str>);

    impl Connector for StaticConnector {
        fn connect(&self, _api_key: SecretString) -> Result<Arc<dyn LlmProvider>, LlmError> {
            Ok(Arc::new(ListOnly(self.0.clone())))
        }
    }

    #[test]
    fn starts_without_backend() {
        let controls = Controls::new(None);
        assert!(!controls.has_credential());
        assert_eq!(controls.model(), Some("gemini-1.5-flash"));
        assert!(controls.backend().is_none());
        assert!(!controls.listing().fetched);
    }

    #[test]
    fn preferred_model_used_when_listed() {
        let controls = Controls::new(Some("gemini-pro".into()));
        assert_eq!(controls.model(), Some("gemini-pro"));
    }

    #[tokio::test]
    async fn configure_fetches_models_and_enables_backend() {
        let mut controls = Controls::new(None);
        let connector = StaticConnector(vec!["gemini-2.0-flash", "gemini-2.0-pro"]);
        controls
            .configure(&connector, Some(SecretString::from("k")), Some("gemini-2.0-pro".into()))
            .await
            .unwrap();

        assert!(controls.listing().fetched);
        assert_eq!(controls.model(), Some("gemini-2.0-pro"));
        let backend = controls.backend().unwrap();
        assert_eq!(backend.model, "gemini-2.0-pro");
        assert_eq!(backend.llm.name(), "list-only");
    }

    #[tokio::test]
    async fn configure_with_unlisted_model_changes_nothing() {
        let mut controls = Controls::new(None);
        let connector = StaticConnector(vec!["gemini-2.0-flash"]);
        let err = controls
            .configure(&connector, Some(SecretString::from("k")), Some("bogus".into()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "configuration");
        assert!(!controls.has_credential());
        assert_eq!(controls.model(), Some("gemini-1.5-flash"));
        assert_eq!(controls.listing(), &ModelListing::defaults());
    }

    #[tokio::test]
    async fn current_model_replaced_when_not_in_new_listing() {
        let mut controls = Controls::new(None);
        controls
            .configure(
                &StaticConnector(vec!["gemini-2.0-flash"]),
                Some(SecretString::from("k")),
                None,
            )
            .await
            .unwrap();
        assert_eq!(controls.model(), Some("gemini-2.0-flash"));
    }

    #[test]
    fn unknown_model_rejected() {
        let mut controls = Controls::new(None);
        let err = controls.select_model("gpt-4o").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModel { .. }));
        assert_eq!(controls.model(), Some("gemini-1.5-flash"));
    }
}
