use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

/// The backend families this crate can talk to.
#[derive(EnumIter, Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[strum(serialize = "openai")]
    #[serde(rename = "openai")]
    OpenAi,
    #[strum(serialize = "openai-responses")]
    #[serde(rename = "openai-responses")]
    OpenAiResponses,
    #[strum(serialize = "anthropic")]
    #[serde(rename = "anthropic")]
    Anthropic,
    #[strum(serialize = "google")]
    #[serde(rename = "google")]
    Google,
    #[strum(serialize = "databricks")]
    #[serde(rename = "databricks")]
    Databricks,
}

/// Quality and cost bucket a request asks for, resolved to a concrete
/// model name per provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    #[default]
    Default,
    Cheap,
    Lite,
    Reasoning,
}

impl ModelTier {
    /// The tier a corrective retry escalates to. Bargain tiers step up to
    /// the default model; the rest stay where they are.
    pub fn escalated(self) -> ModelTier {
        match self {
            ModelTier::Cheap | ModelTier::Lite => ModelTier::Default,
            other => other,
        }
    }
}

/// Fallback model names for one provider, one per tier.
#[derive(Debug, Clone, Copy)]
pub struct TierDefaults {
    pub default: &'static str,
    pub cheap: &'static str,
    pub lite: &'static str,
    pub reasoning: &'static str,
}

impl TierDefaults {
    pub fn for_tier(&self, tier: ModelTier) -> &'static str {
        match tier {
            ModelTier::Default => self.default,
            ModelTier::Cheap => self.cheap,
            ModelTier::Lite => self.lite,
            ModelTier::Reasoning => self.reasoning,
        }
    }
}

/// Per-tier model overrides loaded from the environment.
#[derive(Debug, Clone, Default)]
pub struct ModelTiers {
    pub default: Option<String>,
    pub cheap: Option<String>,
    pub lite: Option<String>,
    pub reasoning: Option<String>,
}

impl ModelTiers {
    pub fn for_tier(&self, tier: ModelTier) -> Option<&str> {
        match tier {
            ModelTier::Default => self.default.as_deref(),
            ModelTier::Cheap => self.cheap.as_deref(),
            ModelTier::Lite => self.lite.as_deref(),
            ModelTier::Reasoning => self.reasoning.as_deref(),
        }
    }

    /// Resolve a tier to a concrete model name, preferring the override.
    pub fn resolve(&self, tier: ModelTier, fallbacks: &TierDefaults) -> String {
        self.for_tier(tier)
            .map(String::from)
            .unwrap_or_else(|| fallbacks.for_tier(tier).to_string())
    }
}

/// How strongly a request constrains function calling.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ToolChoice {
    /// The model must answer in text, not with a call
    None,
    /// The model should call one of the declared tools
    #[default]
    Any,
    /// The model must call this specific tool
    Tool(String),
}

impl ToolChoice {
    pub fn required_name(&self) -> Option<&str> {
        match self {
            ToolChoice::Tool(name) => Some(name),
            _ => None,
        }
    }
}

pub const REASONING_LOW_MAX: u32 = 4096;
pub const REASONING_MEDIUM_MAX: u32 = 16384;

/// Effort levels for backends that take a coarse reasoning setting
/// instead of a token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Bucket a token budget into an effort level. No budget means medium.
    pub fn from_budget(budget: Option<u32>) -> Self {
        match budget {
            None => ReasoningEffort::Medium,
            Some(tokens) if tokens <= REASONING_LOW_MAX => ReasoningEffort::Low,
            Some(tokens) if tokens <= REASONING_MEDIUM_MAX => ReasoningEffort::Medium,
            Some(_) => ReasoningEffort::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

/// Per-request settings passed through to an adapter.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub tier: ModelTier,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    pub tool_choice: ToolChoice,
    /// Token budget for extended thinking on backends that support it
    pub thinking_budget: Option<u32>,
    /// Suppress prompt cache markers for this request
    pub cache_disabled: bool,
    /// Route to a specific configured provider instead of the default
    pub service: Option<ProviderKind>,
}

impl CompletionOptions {
    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: i32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = tool_choice;
        self
    }

    /// Require a call to the named tool
    pub fn require_tool<S: Into<String>>(mut self, name: S) -> Self {
        self.tool_choice = ToolChoice::Tool(name.into());
        self
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_disabled = true;
        self
    }

    pub fn with_service(mut self, service: ProviderKind) -> Self {
        self.service = Some(service);
        self
    }
}

/// Token counts reported by a provider for one completion.
///
/// Providers disagree about what `input_tokens` includes; see
/// `accounting::normalize_usage` for the common shape the rest of the
/// crate works with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
            cache_creation_tokens: None,
            cache_read_tokens: None,
        }
    }

    pub fn with_cache(mut self, creation: Option<i32>, read: Option<i32>) -> Self {
        self.cache_creation_tokens = creation;
        self.cache_read_tokens = read;
        self
    }
}

/// Base trait for model backends (OpenAI, Anthropic, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which backend family this adapter speaks
    fn kind(&self) -> ProviderKind;

    /// Generate the next message for the conversation.
    ///
    /// `messages` holds the full conversation including the system prompt
    /// as a leading system item. Tool declarations and per-request settings
    /// arrive separately so histories can be replayed across backends.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_creation() {
        let usage = Usage::new(Some(1), Some(2), Some(3));
        assert_eq!(usage.input_tokens, Some(1));
        assert_eq!(usage.output_tokens, Some(2));
        assert_eq!(usage.total_tokens, Some(3));
        assert_eq!(usage.cache_creation_tokens, None);
        assert_eq!(usage.cache_read_tokens, None);
    }

    #[test]
    fn test_usage_serialization() -> anyhow::Result<()> {
        let usage = Usage::new(Some(100), Some(50), Some(150)).with_cache(Some(10), Some(20));
        let serialized = serde_json::to_value(&usage)?;
        assert_eq!(
            serialized,
            json!({
                "input_tokens": 100,
                "output_tokens": 50,
                "total_tokens": 150,
                "cache_creation_tokens": 10,
                "cache_read_tokens": 20,
            })
        );

        // Cache fields stay off the wire when the provider never reported them
        let serialized = serde_json::to_value(Usage::new(Some(1), Some(2), Some(3)))?;
        assert_eq!(
            serialized,
            json!({"input_tokens": 1, "output_tokens": 2, "total_tokens": 3})
        );
        Ok(())
    }

    #[test]
    fn test_tier_resolution() {
        let overrides = ModelTiers {
            cheap: Some("custom-mini".to_string()),
            ..Default::default()
        };
        let fallbacks = TierDefaults {
            default: "big",
            cheap: "small",
            lite: "tiny",
            reasoning: "thinker",
        };

        assert_eq!(overrides.resolve(ModelTier::Cheap, &fallbacks), "custom-mini");
        assert_eq!(overrides.resolve(ModelTier::Default, &fallbacks), "big");
        assert_eq!(overrides.resolve(ModelTier::Lite, &fallbacks), "tiny");
        assert_eq!(overrides.resolve(ModelTier::Reasoning, &fallbacks), "thinker");
    }

    #[test]
    fn test_tier_escalation() {
        assert_eq!(ModelTier::Cheap.escalated(), ModelTier::Default);
        assert_eq!(ModelTier::Lite.escalated(), ModelTier::Default);
        assert_eq!(ModelTier::Default.escalated(), ModelTier::Default);
        assert_eq!(ModelTier::Reasoning.escalated(), ModelTier::Reasoning);
    }

    #[test]
    fn test_reasoning_effort_buckets() {
        assert_eq!(ReasoningEffort::from_budget(None), ReasoningEffort::Medium);
        assert_eq!(ReasoningEffort::from_budget(Some(1024)), ReasoningEffort::Low);
        assert_eq!(ReasoningEffort::from_budget(Some(4096)), ReasoningEffort::Low);
        assert_eq!(ReasoningEffort::from_budget(Some(4097)), ReasoningEffort::Medium);
        assert_eq!(ReasoningEffort::from_budget(Some(16384)), ReasoningEffort::Medium);
        assert_eq!(ReasoningEffort::from_budget(Some(16385)), ReasoningEffort::High);
    }

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
        assert_eq!(ProviderKind::OpenAiResponses.to_string(), "openai-responses");
        assert_eq!(ProviderKind::Databricks.to_string(), "databricks");
    }
}
