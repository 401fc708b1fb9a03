use std::collections::HashMap;
use std::sync::Arc;

use strum::IntoEnumIterator;
use tracing::debug;

use super::anthropic::AnthropicProvider;
use super::base::{Provider, ProviderKind};
use super::configs::ProviderConfig;
use super::databricks::DatabricksProvider;
use super::google::GoogleProvider;
use super::openai::OpenAiProvider;
use super::responses::OpenAiResponsesProvider;
use crate::errors::ProviderError;

pub fn get_provider(config: ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    match config {
        ProviderConfig::OpenAi(openai_config) => Ok(Arc::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::OpenAiResponses(responses_config) => {
            Ok(Arc::new(OpenAiResponsesProvider::new(responses_config)?))
        }
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Arc::new(AnthropicProvider::new(anthropic_config)?))
        }
        ProviderConfig::Google(google_config) => Ok(Arc::new(GoogleProvider::new(google_config)?)),
        ProviderConfig::Databricks(databricks_config) => {
            Ok(Arc::new(DatabricksProvider::new(databricks_config)?))
        }
    }
}

/// The set of configured providers, one of which is the default. Requests
/// can pick a different one per call.
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
    default: ProviderKind,
}

impl ProviderRegistry {
    pub fn new(default: ProviderKind) -> Self {
        Self {
            providers: HashMap::new(),
            default,
        }
    }

    /// A registry holding just one provider, used as the default
    pub fn single(provider: Arc<dyn Provider>) -> Self {
        let mut registry = Self::new(provider.kind());
        registry.register(provider);
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn with_config(mut self, config: ProviderConfig) -> Result<Self, ProviderError> {
        self.register(get_provider(config)?);
        Ok(self)
    }

    /// Build a registry from the environment. The default provider must be
    /// configured; others are registered when their credentials are present
    /// and skipped otherwise.
    pub fn from_env(default: ProviderKind) -> Result<Self, ProviderError> {
        let mut registry = Self::new(default);
        for kind in ProviderKind::iter() {
            match ProviderConfig::from_env(kind) {
                Ok(config) => registry.register(get_provider(config)?),
                Err(ProviderError::Configuration(reason)) => {
                    if kind == default {
                        return Err(ProviderError::Configuration(reason));
                    }
                    debug!(provider = %kind, %reason, "skipping unconfigured provider");
                }
                Err(other) => return Err(other),
            }
        }
        Ok(registry)
    }

    pub fn default_kind(&self) -> ProviderKind {
        self.default
    }

    /// Look up the provider for a request, falling back to the default
    /// when no explicit service was asked for
    pub fn resolve(
        &self,
        service: Option<ProviderKind>,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        let kind = service.unwrap_or(self.default);
        self.providers.get(&kind).cloned().ok_or_else(|| {
            ProviderError::Configuration(format!("provider '{}' is not configured", kind))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::configs::OpenAiProviderConfig;

    #[test]
    fn test_registry_resolves_default_and_explicit() {
        let config = OpenAiProviderConfig::new(
            "http://localhost:1".to_string(),
            "test_api_key".to_string(),
        );
        let registry = ProviderRegistry::new(ProviderKind::OpenAi)
            .with_config(ProviderConfig::OpenAi(config))
            .unwrap();

        assert_eq!(
            registry.resolve(None).unwrap().kind(),
            ProviderKind::OpenAi
        );
        assert_eq!(
            registry
                .resolve(Some(ProviderKind::OpenAi))
                .unwrap()
                .kind(),
            ProviderKind::OpenAi
        );
    }

    #[test]
    fn test_registry_rejects_unconfigured() {
        let registry = ProviderRegistry::new(ProviderKind::OpenAi);
        let error = registry.resolve(Some(ProviderKind::Anthropic)).err().unwrap();
        match error {
            ProviderError::Configuration(reason) => {
                assert!(reason.contains("anthropic"));
            }
            other => panic!("expected Configuration, got {:?}", other),
        }
    }
}
