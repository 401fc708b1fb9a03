use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::base::{CompletionOptions, Provider, ProviderKind, TierDefaults, Usage};
use super::configs::DatabricksProviderConfig;
use super::utils::{
    check_brokered_context_length_error, check_openai_context_length_error,
    messages_to_openai_spec, openai_response_to_message, openai_usage, parse_retry_after,
    split_system, tool_choice_to_openai_spec, tools_to_openai_spec,
};
use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const DATABRICKS_ENDPOINTS: TierDefaults = TierDefaults {
    default: "databricks-claude-sonnet-4",
    cheap: "databricks-meta-llama-3-3-70b-instruct",
    lite: "databricks-gpt-oss-20b",
    reasoning: "databricks-claude-opus-4",
};

/// A workspace broker that forwards chat completion requests to whatever
/// model sits behind the named serving endpoint.
pub struct DatabricksProvider {
    client: Client,
    config: DatabricksProviderConfig,
}

impl DatabricksProvider {
    pub fn new(config: DatabricksProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, endpoint: &str, payload: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/serving-endpoints/{}/invocations",
            self.config.host.trim_end_matches('/'),
            endpoint
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.token))
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
                    if let Some(err) = check_brokered_context_length_error(&body) {
                        return Err(err);
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
impl Provider for DatabricksProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Databricks
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage), ProviderError> {
        let (system, chat) = split_system(messages, self.config.system_suffix.as_deref())?;
        let endpoint = self
            .config
            .endpoints
            .resolve(options.tier, &DATABRICKS_ENDPOINTS);

        let mut messages_array = vec![json!({ "role": "system", "content": system })];
        messages_array.extend(messages_to_openai_spec(&chat, &self.config.image_format));

        // the endpoint in the URL names the model; a "model" key in the
        // payload is rejected by the broker
        let mut payload = json!({ "messages": messages_array });

        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_openai_spec(tools)?);
            payload["tool_choice"] = tool_choice_to_openai_spec(&options.tool_choice);
        }
        if let Some(temp) = options.temperature.or(self.config.temperature) {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = options.max_tokens.or(self.config.max_tokens) {
            payload["max_tokens"] = json!(tokens);
        }

        // Remove null values
        let payload = serde_json::Value::Object(
            payload
                .as_object()
                .unwrap()
                .iter()
                .filter(|&(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );

        let response = self.post(&endpoint, payload).await?;

        // the broker wraps errors from the underlying model in a 200
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err);
            }
            if let Some(err) = check_brokered_context_length_error(error) {
                return Err(err);
            }
            return Err(ProviderError::InvalidResponse(format!(
                "Databricks API error: {}",
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
    use crate::models::message::MessageContent;
    use crate::providers::base::ModelTier;
    use anyhow::Result;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_with_token() -> Result<()> {
        let mock_server = MockServer::start().await;

        let mock_response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Hello!"
                }
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 25,
                "total_tokens": 35
            }
        });

        // the payload carries no "model" key
        let expected_request_body = json!({
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": "Hello"}
            ]
        });

        Mock::given(method("POST"))
            .and(path("/serving-endpoints/databricks-claude-sonnet-4/invocations"))
            .and(header("Authorization", "Bearer test_token"))
            .and(body_json(expected_request_body.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_response))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = DatabricksProviderConfig::new(mock_server.uri(), "test_token".to_string());
        let provider = DatabricksProvider::new(config)?;

        let messages = vec![
            Message::system().with_text("You are a helpful assistant."),
            Message::user().with_text("Hello"),
        ];
        let (reply_message, reply_usage) = provider
            .complete(&messages, &[], &CompletionOptions::default())
            .await?;

        if let MessageContent::Text(text) = &reply_message.content[0] {
            assert_eq!(text.text, "Hello!");
        } else {
            panic!("Expected Text content");
        }
        assert_eq!(reply_usage.total_tokens, Some(35));

        Ok(())
    }

    #[tokio::test]
    async fn test_tier_picks_endpoint() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/serving-endpoints/databricks-meta-llama-3-3-70b-instruct/invocations",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "ok"}}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = DatabricksProviderConfig::new(mock_server.uri(), "test_token".to_string());
        let provider = DatabricksProvider::new(config)?;

        let messages = vec![
            Message::system().with_text("You are a helpful assistant."),
            Message::user().with_text("Hello"),
        ];
        let options = CompletionOptions::default().with_tier(ModelTier::Cheap);
        provider.complete(&messages, &[], &options).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_brokered_context_length_error() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/serving-endpoints/databricks-claude-sonnet-4/invocations"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error_code": "BAD_REQUEST",
                "external_model_message": {
                    "type": "error",
                    "message": "Input is too long for requested model."
                }
            })))
            .mount(&mock_server)
            .await;

        let config = DatabricksProviderConfig::new(mock_server.uri(), "test_token".to_string());
        let provider = DatabricksProvider::new(config)?;

        let messages = vec![
            Message::system().with_text("You are a helpful assistant."),
            Message::user().with_text("Hello"),
        ];
        let error = provider
            .complete(&messages, &[], &CompletionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(error, ProviderError::ContextLengthExceeded(_)));
        Ok(())
    }
}
