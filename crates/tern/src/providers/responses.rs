use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::base::{CompletionOptions, Provider, ProviderKind, ReasoningEffort, TierDefaults, ToolChoice, Usage};
use super::configs::OpenAiResponsesProviderConfig;
use super::utils::{
    call_id, check_openai_context_length_error, model_supports_reasoning, parse_retry_after,
    parse_tool_call, split_system,
};
use crate::errors::ProviderError;
use crate::models::content::ImageSource;
use crate::models::message::{Message, MessageContent};
use crate::models::tool::Tool;

pub const OPENAI_RESPONSES_MODELS: TierDefaults = TierDefaults {
    default: "gpt-5",
    cheap: "gpt-5-mini",
    lite: "gpt-5-nano",
    reasoning: "gpt-5",
};

/// Adapter for the OpenAI responses endpoint, which replaces the chat
/// message list with a flat item list and moves function calls to
/// top-level items.
pub struct OpenAiResponsesProvider {
    client: Client,
    config: OpenAiResponsesProviderConfig,
}

impl OpenAiResponsesProvider {
    pub fn new(config: OpenAiResponsesProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn messages_to_input_items(messages: &[&Message]) -> Vec<Value> {
        let mut items = Vec::new();

        for message in messages {
            let mut parts: Vec<Value> = Vec::new();
            let mut standalone: Vec<Value> = Vec::new();
            let part_type = match message.role {
                crate::models::role::Role::Assistant => "output_text",
                _ => "input_text",
            };

            for content in &message.content {
                match content {
                    MessageContent::Text(text) => {
                        parts.push(json!({"type": part_type, "text": text.text}))
                    }
                    MessageContent::Image(image) => {
                        let url = match &image.source {
                            ImageSource::Data(data) => {
                                format!("data:{};base64,{}", image.mime_type, data)
                            }
                            ImageSource::Uri(uri) => uri.clone(),
                        };
                        parts.push(json!({"type": "input_image", "image_url": url}));
                    }
                    MessageContent::ToolRequest(request) => match &request.tool_call {
                        Ok(tool_call) => standalone.push(json!({
                            "type": "function_call",
                            "call_id": call_id(&request.id, &tool_call.name),
                            "name": tool_call.name,
                            "arguments": tool_call.arguments.to_string(),
                        })),
                        Err(e) => parts.push(json!({
                            "type": part_type,
                            "text": format!("The model produced an invalid tool call: {}", e),
                        })),
                    },
                    MessageContent::ToolResponse(response) => {
                        let output = match &response.tool_result {
                            Ok(contents) => contents
                                .iter()
                                .filter_map(|c| c.as_text())
                                .collect::<Vec<_>>()
                                .join("\n"),
                            Err(e) => {
                                format!("The tool call returned the following error:\n{}", e)
                            }
                        };
                        standalone.push(json!({
                            "type": "function_call_output",
                            "call_id": call_id(&response.id, &response.name),
                            "output": output,
                        }));
                    }
                    MessageContent::WebSearch(search) => {
                        parts.push(json!({"type": part_type, "text": search.text}))
                    }
                    MessageContent::ExecutableCode(code) => parts.push(json!({
                        "type": part_type,
                        "text": format!("```{}\n{}\n```", code.language, code.code),
                    })),
                    MessageContent::CodeExecutionResult(result) => {
                        parts.push(json!({"type": part_type, "text": result.output}))
                    }
                }
            }

            if !parts.is_empty() {
                items.push(json!({"role": message.role, "content": parts}));
            }
            items.extend(standalone);
        }

        items
    }

    fn tools_to_responses_spec(tools: &[Tool]) -> Result<Vec<Value>, ProviderError> {
        let mut tool_names = HashSet::new();
        let mut result = Vec::new();
        for tool in tools {
            if !tool_names.insert(&tool.name) {
                return Err(ProviderError::InvalidRequest(format!(
                    "Duplicate tool name: {}",
                    tool.name
                )));
            }
            result.push(json!({
                "type": "function",
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }));
        }
        Ok(result)
    }

    fn tool_choice_to_spec(choice: &ToolChoice) -> Value {
        match choice {
            ToolChoice::None => json!("none"),
            ToolChoice::Any => json!("required"),
            ToolChoice::Tool(name) => json!({"type": "function", "name": name}),
        }
    }

    fn response_to_message(response: &Value) -> Result<Message, ProviderError> {
        let output = response
            .get("output")
            .and_then(|o| o.as_array())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("response has no output items".to_string())
            })?;

        let mut message = Message::assistant();
        for item in output {
            match item.get("type").and_then(|t| t.as_str()) {
                Some("message") => {
                    let parts = item
                        .get("content")
                        .and_then(|c| c.as_array())
                        .map(|a| a.as_slice())
                        .unwrap_or(&[]);
                    for part in parts {
                        if part.get("type").and_then(|t| t.as_str()) != Some("output_text") {
                            continue;
                        }
                        let text = part.get("text").and_then(|t| t.as_str()).unwrap_or_default();
                        let citations: Vec<String> = part
                            .get("annotations")
                            .and_then(|a| a.as_array())
                            .map(|annotations| {
                                annotations
                                    .iter()
                                    .filter(|a| {
                                        a.get("type").and_then(|t| t.as_str())
                                            == Some("url_citation")
                                    })
                                    .filter_map(|a| a.get("url").and_then(|u| u.as_str()))
                                    .map(String::from)
                                    .collect()
                            })
                            .unwrap_or_default();

                        if citations.is_empty() {
                            if !text.is_empty() {
                                message = message.with_text(text);
                            }
                        } else {
                            message =
                                message.with_content(MessageContent::web_search(text, citations));
                        }
                    }
                }
                Some("function_call") => {
                    let id = item.get("call_id").and_then(|i| i.as_str()).map(String::from);
                    let name = item.get("name").and_then(|n| n.as_str()).unwrap_or_default();
                    let arguments = item
                        .get("arguments")
                        .and_then(|a| a.as_str())
                        .unwrap_or_default();
                    message = message.with_content(parse_tool_call(id, name, arguments));
                }
                // reasoning summaries and search bookkeeping are not part
                // of the conversation
                _ => {}
            }
        }

        Ok(message)
    }

    fn response_usage(data: &Value) -> Result<Usage, ProviderError> {
        let usage = data.get("usage").ok_or_else(|| {
            ProviderError::InvalidResponse("no usage data in response".to_string())
        })?;

        let input_tokens = usage
            .get("input_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);
        let output_tokens = usage
            .get("output_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);
        let total_tokens = usage
            .get("total_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });
        let cache_read_tokens = usage
            .get("input_tokens_details")
            .and_then(|details| details.get("cached_tokens"))
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        Ok(Usage::new(input_tokens, output_tokens, total_tokens).with_cache(None, cache_read_tokens))
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/v1/responses", self.config.host.trim_end_matches('/'));

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
impl Provider for OpenAiResponsesProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAiResponses
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage), ProviderError> {
        let (system, chat) = split_system(messages, self.config.system_suffix.as_deref())?;
        let model = self
            .config
            .models
            .resolve(options.tier, &OPENAI_RESPONSES_MODELS);

        let mut payload = json!({
            "model": model,
            "instructions": system,
            "input": Self::messages_to_input_items(&chat),
            // this layer never persists server-side conversation state
            "store": false,
        });
        let body = payload.as_object_mut().unwrap();
        if !tools.is_empty() {
            body.insert(
                "tools".to_string(),
                json!(Self::tools_to_responses_spec(tools)?),
            );
            body.insert(
                "tool_choice".to_string(),
                Self::tool_choice_to_spec(&options.tool_choice),
            );
        }
        if model_supports_reasoning(&model) {
            body.insert(
                "reasoning".to_string(),
                json!({"effort": ReasoningEffort::from_budget(options.thinking_budget).as_str()}),
            );
        } else if let Some(temp) = options.temperature.or(self.config.temperature) {
            body.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = options.max_tokens.or(self.config.max_tokens) {
            body.insert("max_output_tokens".to_string(), json!(tokens));
        }

        let response = self.post(payload).await?;

        if let Some(error) = response.get("error") {
            if !error.is_null() {
                if let Some(err) = check_openai_context_length_error(error) {
                    return Err(err);
                }
                return Err(ProviderError::InvalidResponse(format!(
                    "OpenAI API error: {}",
                    error
                )));
            }
        }

        let message = Self::response_to_message(&response)?;
        let usage = Self::response_usage(&response)?;

        Ok((message, usage))
    }
}
