use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::base::{CompletionOptions, Provider, ProviderKind, ReasoningEffort, TierDefaults, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_openai_context_length_error, messages_to_openai_spec, model_supports_reasoning,
    openai_response_to_message, openai_usage, parse_retry_after, split_system,
    tool_choice_to_openai_spec, tools_to_openai_spec, ImageFormat,
};
use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const OPENAI_HOST: &str = "https://api.openai.com";

pub const OPENAI_MODELS: TierDefaults = TierDefaults {
    default: "gpt-4.1",
    cheap: "gpt-4.1-mini",
    lite: "gpt-4.1-nano",
    reasoning: "o4-mini",
};

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited {
                retry_after: parse_retry_after(&response),
            }),
            status => {
                let message = response.text().await.unwrap_or_default();
                if let Ok(body) = serde_json::from_str::<Value>(&message) {
                    if let Some(error) = body.get("error") {
                        if let Some(err) = check_openai_context_length_error(error) {
                            return Err(err);
                        }
                    }
                }
                Err(ProviderError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage), ProviderError> {
        let (system, chat) = split_system(messages, self.config.system_suffix.as_deref())?;
        let model = self.config.models.resolve(options.tier, &OPENAI_MODELS);

        let mut messages_spec = vec![json!({"role": "system", "content": system})];
        messages_spec.extend(messages_to_openai_spec(&chat, &ImageFormat::OpenAi));

        let mut payload = json!({
            "model": model,
            "messages": messages_spec,
        });
        let body = payload.as_object_mut().unwrap();
        if !tools.is_empty() {
            body.insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
            body.insert(
                "tool_choice".to_string(),
                tool_choice_to_openai_spec(&options.tool_choice),
            );
        }
        if model_supports_reasoning(&model) {
            // reasoning models take an effort level and reject temperature
            body.insert(
                "reasoning_effort".to_string(),
                json!(ReasoningEffort::from_budget(options.thinking_budget).as_str()),
            );
        } else if let Some(temp) = options.temperature.or(self.config.temperature) {
            body.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = options.max_tokens.or(self.config.max_tokens) {
            body.insert("max_completion_tokens".to_string(), json!(tokens));
        }

        let response = self.post(payload).await?;

        // some compatible deployments return errors with a 200
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err);
            }
            return Err(ProviderError::InvalidResponse(format!(
                "OpenAI API error: {}",
                error
            )));
        }

        let message = openai_response_to_message(response.clone())?;
        let usage = openai_usage(&response)?;

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::base::ModelTier;
    use anyhow::Result;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn _setup_mock_server(response_body: Value) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig::new(mock_server.uri(), "test_api_key".to_string());
        let provider = OpenAiProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello! How can I assist you today?"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 15, "total_tokens": 27}
        });
        let (_server, provider) = _setup_mock_server(response_body).await;

        let messages = vec![
            Message::system().with_text("You are a helpful assistant."),
            Message::user().with_text("Hello?"),
        ];
        let (message, usage) = provider
            .complete(&messages, &[], &CompletionOptions::default())
            .await?;

        assert_eq!(message.text(), "Hello! How can I assist you today?");
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_request() -> Result<()> {
        let response_body = json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc123",
                        "type": "function",
                        "function": {
                            "name": "get_weather",
                            "arguments": "{\"location\":\"San Francisco, CA\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 20,
                "completion_tokens": 10,
                "total_tokens": 30,
                "prompt_tokens_details": {"cached_tokens": 16}
            }
        });
        let (_server, provider) = _setup_mock_server(response_body).await;

        let messages = vec![
            Message::system().with_text("You are a helpful assistant."),
            Message::user().with_text("What's the weather in San Francisco?"),
        ];
        let tool = Tool::new(
            "get_weather",
            "Get the current weather for a location",
            json!({
                "type": "object",
                "properties": {"location": {"type": "string"}},
                "required": ["location"]
            }),
        );
        let options = CompletionOptions::default().require_tool("get_weather");
        let (message, usage) = provider.complete(&messages, &[tool], &options).await?;

        let requests = message.tool_requests();
        assert_eq!(requests.len(), 1);
        let tool_call = requests[0].tool_call.as_ref().unwrap();
        assert_eq!(tool_call.name, "get_weather");
        assert_eq!(tool_call.arguments, json!({"location": "San Francisco, CA"}));
        assert_eq!(usage.cache_read_tokens, Some(16));
        Ok(())
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "2")
                    .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
            )
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig::new(mock_server.uri(), "test_api_key".to_string());
        let provider = OpenAiProvider::new(config).unwrap();

        let messages = vec![
            Message::system().with_text("You are a helpful assistant."),
            Message::user().with_text("Hello?"),
        ];
        let error = provider
            .complete(&messages, &[], &CompletionOptions::default())
            .await
            .unwrap_err();

        match error {
            ProviderError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(2)));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_context_length_error() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": "context_length_exceeded",
                    "message": "This model's maximum context length is 128000 tokens."
                }
            })))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig::new(mock_server.uri(), "test_api_key".to_string());
        let provider = OpenAiProvider::new(config).unwrap();

        let messages = vec![
            Message::system().with_text("You are a helpful assistant."),
            Message::user().with_text("Hello?"),
        ];
        let error = provider
            .complete(&messages, &[], &CompletionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(error, ProviderError::ContextLengthExceeded(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_tier_resolution_uses_overrides() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(wiremock::matchers::body_partial_json(
                json!({"model": "my-tuned-mini"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "ok"}}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = OpenAiProviderConfig::new(mock_server.uri(), "test_api_key".to_string());
        config.models.cheap = Some("my-tuned-mini".to_string());
        let provider = OpenAiProvider::new(config).unwrap();

        let messages = vec![
            Message::system().with_text("s"),
            Message::user().with_text("u"),
        ];
        let options = CompletionOptions::default().with_tier(ModelTier::Cheap);
        provider.complete(&messages, &[], &options).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_system_rejected() {
        let config = OpenAiProviderConfig::new("http://localhost:9".to_string(), "k".to_string());
        let provider = OpenAiProvider::new(config).unwrap();

        let messages = vec![Message::user().with_text("hello")];
        let error = provider
            .complete(&messages, &[], &CompletionOptions::default())
            .await
            .unwrap_err();

        // rejected before any request is made
        assert!(matches!(error, ProviderError::InvalidRequest(_)));
    }
}
