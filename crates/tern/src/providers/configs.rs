use std::env;

use crate::errors::ProviderError;
use crate::providers::anthropic::ANTHROPIC_HOST;
use crate::providers::base::{ModelTiers, ProviderKind};
use crate::providers::google::GOOGLE_HOST;
use crate::providers::openai::OPENAI_HOST;
use crate::providers::utils::ImageFormat;

/// Configuration for a provider, wrapped so the factory can dispatch on it
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    OpenAiResponses(OpenAiResponsesProviderConfig),
    Anthropic(AnthropicProviderConfig),
    Google(GoogleProviderConfig),
    Databricks(DatabricksProviderConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::OpenAi(_) => ProviderKind::OpenAi,
            ProviderConfig::OpenAiResponses(_) => ProviderKind::OpenAiResponses,
            ProviderConfig::Anthropic(_) => ProviderKind::Anthropic,
            ProviderConfig::Google(_) => ProviderKind::Google,
            ProviderConfig::Databricks(_) => ProviderKind::Databricks,
        }
    }

    /// Load one provider's configuration from the environment
    pub fn from_env(kind: ProviderKind) -> Result<Self, ProviderError> {
        match kind {
            ProviderKind::OpenAi => Ok(ProviderConfig::OpenAi(OpenAiProviderConfig::from_env()?)),
            ProviderKind::OpenAiResponses => Ok(ProviderConfig::OpenAiResponses(
                OpenAiResponsesProviderConfig::from_env()?,
            )),
            ProviderKind::Anthropic => {
                Ok(ProviderConfig::Anthropic(AnthropicProviderConfig::from_env()?))
            }
            ProviderKind::Google => Ok(ProviderConfig::Google(GoogleProviderConfig::from_env()?)),
            ProviderKind::Databricks => Ok(ProviderConfig::Databricks(
                DatabricksProviderConfig::from_env()?,
            )),
        }
    }
}

/// Read a required environment variable, treating empty values as unset
fn require_env(key: &str) -> Result<String, ProviderError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ProviderError::Configuration(format!(
            "environment variable '{}' is required but not set",
            key
        ))),
    }
}

/// Read an optional environment variable, treating empty values as unset
fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Collect the per-tier model overrides for one provider prefix
fn tiers_from_env(prefix: &str) -> ModelTiers {
    ModelTiers {
        default: optional_env(&format!("{}_MODEL", prefix)),
        cheap: optional_env(&format!("{}_CHEAP_MODEL", prefix)),
        lite: optional_env(&format!("{}_LITE_MODEL", prefix)),
        reasoning: optional_env(&format!("{}_REASONING_MODEL", prefix)),
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub models: ModelTiers,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub system_suffix: Option<String>,
}

impl OpenAiProviderConfig {
    pub fn new(host: String, api_key: String) -> Self {
        Self {
            host,
            api_key,
            models: ModelTiers::default(),
            temperature: None,
            max_tokens: None,
            system_suffix: None,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self {
            host: optional_env("OPENAI_HOST").unwrap_or_else(|| OPENAI_HOST.to_string()),
            api_key: require_env("OPENAI_API_KEY")?,
            models: tiers_from_env("OPENAI"),
            temperature: None,
            max_tokens: None,
            system_suffix: optional_env("OPENAI_SYSTEM_SUFFIX"),
        })
    }
}

/// The responses endpoint shares credentials with the chat completions
/// endpoint unless overridden.
#[derive(Debug, Clone)]
pub struct OpenAiResponsesProviderConfig {
    pub host: String,
    pub api_key: String,
    pub models: ModelTiers,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub system_suffix: Option<String>,
}

impl OpenAiResponsesProviderConfig {
    pub fn new(host: String, api_key: String) -> Self {
        Self {
            host,
            api_key,
            models: ModelTiers::default(),
            temperature: None,
            max_tokens: None,
            system_suffix: None,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = match optional_env("OPENAI_RESPONSES_API_KEY") {
            Some(key) => key,
            None => require_env("OPENAI_API_KEY")?,
        };
        Ok(Self {
            host: optional_env("OPENAI_HOST").unwrap_or_else(|| OPENAI_HOST.to_string()),
            api_key,
            models: tiers_from_env("OPENAI_RESPONSES"),
            temperature: None,
            max_tokens: None,
            system_suffix: optional_env("OPENAI_RESPONSES_SYSTEM_SUFFIX"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub models: ModelTiers,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub system_suffix: Option<String>,
}

impl AnthropicProviderConfig {
    pub fn new(host: String, api_key: String) -> Self {
        Self {
            host,
            api_key,
            models: ModelTiers::default(),
            temperature: None,
            max_tokens: None,
            system_suffix: None,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self {
            host: optional_env("ANTHROPIC_HOST").unwrap_or_else(|| ANTHROPIC_HOST.to_string()),
            api_key: require_env("ANTHROPIC_API_KEY")?,
            models: tiers_from_env("ANTHROPIC"),
            temperature: None,
            max_tokens: None,
            system_suffix: optional_env("ANTHROPIC_SYSTEM_SUFFIX"),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GoogleProviderConfig {
    pub host: String,
    pub api_key: String,
    pub models: ModelTiers,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub system_suffix: Option<String>,
}

impl GoogleProviderConfig {
    pub fn new(host: String, api_key: String) -> Self {
        Self {
            host,
            api_key,
            models: ModelTiers::default(),
            temperature: None,
            max_tokens: None,
            system_suffix: None,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = match optional_env("GEMINI_API_KEY") {
            Some(key) => key,
            None => require_env("GOOGLE_API_KEY")?,
        };
        Ok(Self {
            host: optional_env("GEMINI_HOST").unwrap_or_else(|| GOOGLE_HOST.to_string()),
            api_key,
            models: tiers_from_env("GEMINI"),
            temperature: None,
            max_tokens: None,
            system_suffix: optional_env("GEMINI_SYSTEM_SUFFIX"),
        })
    }
}

/// A brokered deployment where the workspace host serves several models
/// behind per-model endpoints and a single bearer token.
#[derive(Debug, Clone)]
pub struct DatabricksProviderConfig {
    pub host: String,
    pub token: String,
    pub endpoints: ModelTiers,
    pub image_format: ImageFormat,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub system_suffix: Option<String>,
}

impl DatabricksProviderConfig {
    pub fn new(host: String, token: String) -> Self {
        Self {
            host,
            token,
            endpoints: ModelTiers::default(),
            image_format: ImageFormat::Anthropic,
            temperature: None,
            max_tokens: None,
            system_suffix: None,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self {
            host: require_env("DATABRICKS_HOST")?,
            token: require_env("DATABRICKS_TOKEN")?,
            endpoints: tiers_from_env("DATABRICKS"),
            image_format: ImageFormat::Anthropic,
            temperature: None,
            max_tokens: None,
            system_suffix: optional_env("DATABRICKS_SYSTEM_SUFFIX"),
        })
    }
}
