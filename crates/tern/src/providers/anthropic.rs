use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::base::{CompletionOptions, Provider, ProviderKind, TierDefaults, ToolChoice, Usage};
use super::configs::AnthropicProviderConfig;
use super::utils::{
    call_id, convert_image, is_valid_function_name, parse_retry_after, split_system, ImageFormat,
};
use crate::errors::{ProviderError, ToolError};
use crate::models::content::Content;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

pub const ANTHROPIC_MODELS: TierDefaults = TierDefaults {
    default: "claude-sonnet-4-5",
    cheap: "claude-haiku-4-5",
    lite: "claude-haiku-4-5",
    reasoning: "claude-opus-4-1",
};

const DEFAULT_MAX_TOKENS: i32 = 8192;
/// The messages API allows at most four cache breakpoints per request
const MAX_CACHE_BREAKPOINTS: usize = 4;
/// Extended thinking rejects budgets below this
const MIN_THINKING_BUDGET: u32 = 1024;

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn messages_to_anthropic_spec(messages: &[&Message], cache_enabled: bool) -> Vec<Value> {
        let mut messages_spec = Vec::new();

        for message in messages {
            let mut blocks: Vec<Value> = Vec::new();

            for content in &message.content {
                match content {
                    MessageContent::Text(text) => {
                        blocks.push(json!({"type": "text", "text": text.text}))
                    }
                    MessageContent::Image(image) => {
                        blocks.push(convert_image(image, &ImageFormat::Anthropic))
                    }
                    MessageContent::ToolRequest(request) => match &request.tool_call {
                        Ok(tool_call) => blocks.push(json!({
                            "type": "tool_use",
                            "id": call_id(&request.id, &tool_call.name),
                            "name": tool_call.name,
                            "input": tool_call.arguments,
                        })),
                        Err(e) => blocks.push(json!({
                            "type": "text",
                            "text": format!("The model produced an invalid tool call: {}", e),
                        })),
                    },
                    MessageContent::ToolResponse(response) => {
                        let mut block = json!({
                            "type": "tool_result",
                            "tool_use_id": call_id(&response.id, &response.name),
                        });
                        match &response.tool_result {
                            Ok(contents) => {
                                let converted: Vec<Value> = contents
                                    .iter()
                                    .map(|c| match c {
                                        Content::Text(text) => {
                                            json!({"type": "text", "text": text.text})
                                        }
                                        Content::Image(image) => {
                                            convert_image(image, &ImageFormat::Anthropic)
                                        }
                                    })
                                    .collect();
                                block["content"] = json!(converted);
                            }
                            Err(e) => {
                                block["content"] = json!(format!(
                                    "The tool call returned the following error:\n{}",
                                    e
                                ));
                                block["is_error"] = json!(true);
                            }
                        }
                        blocks.push(block);
                    }
                    MessageContent::WebSearch(search) => {
                        blocks.push(json!({"type": "text", "text": search.text}))
                    }
                    MessageContent::ExecutableCode(code) => blocks.push(json!({
                        "type": "text",
                        "text": format!("```{}\n{}\n```", code.language, code.code),
                    })),
                    MessageContent::CodeExecutionResult(result) => {
                        blocks.push(json!({"type": "text", "text": result.output}))
                    }
                }
            }

            if blocks.is_empty() {
                continue;
            }

            if cache_enabled && message.cache {
                if let Some(last) = blocks.last_mut().and_then(|b| b.as_object_mut()) {
                    last.insert("cache_control".to_string(), json!({"type": "ephemeral"}));
                }
            }

            messages_spec.push(json!({"role": message.role, "content": blocks}));
        }

        messages_spec
    }

    /// Drop the oldest cache markers until at most `budget` remain. The most
    /// recent breakpoints are the ones worth keeping, since everything before
    /// a breakpoint is covered by it.
    fn trim_cache_breakpoints(messages_spec: &mut [Value], budget: usize) {
        let mut marked = Vec::new();
        for (m, message) in messages_spec.iter().enumerate() {
            if let Some(blocks) = message.get("content").and_then(|c| c.as_array()) {
                for (b, block) in blocks.iter().enumerate() {
                    if block.get("cache_control").is_some() {
                        marked.push((m, b));
                    }
                }
            }
        }

        let excess = marked.len().saturating_sub(budget);
        for (m, b) in marked.into_iter().take(excess) {
            if let Some(block) = messages_spec[m]
                .get_mut("content")
                .and_then(|c| c.get_mut(b))
                .and_then(|b| b.as_object_mut())
            {
                block.remove("cache_control");
            }
        }
    }

    fn tools_to_anthropic_spec(tools: &[Tool]) -> Result<Vec<Value>, ProviderError> {
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
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.input_schema,
            }));
        }
        Ok(result)
    }

    fn tool_choice_to_spec(choice: &ToolChoice) -> Value {
        match choice {
            ToolChoice::None => json!({"type": "none"}),
            ToolChoice::Any => json!({"type": "any"}),
            ToolChoice::Tool(name) => json!({"type": "tool", "name": name}),
        }
    }

    fn response_to_message(response: &Value) -> Result<Message, ProviderError> {
        let content = response
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("response has no content blocks".to_string())
            })?;

        let mut message = Message::assistant();
        for block in content {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        if !text.is_empty() {
                            message = message.with_text(text);
                        }
                    }
                }
                Some("tool_use") => {
                    let id = block.get("id").and_then(|i| i.as_str()).map(String::from);
                    let name = block.get("name").and_then(|n| n.as_str()).unwrap_or_default();
                    let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                    let tool_call = if is_valid_function_name(name) {
                        Ok(ToolCall::new(name, input))
                    } else {
                        Err(ToolError::NotFound(format!(
                            "The provided function name '{}' had invalid characters, it must match this regex: [a-zA-Z0-9_-]+",
                            name
                        )))
                    };
                    message = message.with_content(MessageContent::tool_request(id, tool_call));
                }
                Some("web_search_tool_result") => {
                    let results = block
                        .get("content")
                        .and_then(|c| c.as_array())
                        .map(|a| a.as_slice())
                        .unwrap_or(&[]);
                    let mut titles = Vec::new();
                    let mut citations = Vec::new();
                    for result in results {
                        if let Some(title) = result.get("title").and_then(|t| t.as_str()) {
                            titles.push(title.to_string());
                        }
                        if let Some(url) = result.get("url").and_then(|u| u.as_str()) {
                            citations.push(url.to_string());
                        }
                    }
                    message = message
                        .with_content(MessageContent::web_search(titles.join("\n"), citations));
                }
                // thinking blocks and server-side search bookkeeping stay out
                // of the conversation
                _ => {}
            }
        }

        Ok(message)
    }

    fn get_usage(data: &Value) -> Result<Usage, ProviderError> {
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
        let cache_creation_tokens = usage
            .get("cache_creation_input_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);
        let cache_read_tokens = usage
            .get("cache_read_input_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let mut total_tokens = None;
        for part in [
            input_tokens,
            output_tokens,
            cache_creation_tokens,
            cache_read_tokens,
        ]
        .into_iter()
        .flatten()
        {
            *total_tokens.get_or_insert(0) += part;
        }

        Ok(Usage::new(input_tokens, output_tokens, total_tokens)
            .with_cache(cache_creation_tokens, cache_read_tokens))
    }

    /// The reset header carries an RFC3339 timestamp; a reset in the past
    /// yields no hint and the retry loop falls back to plain backoff
    fn parse_ratelimit_reset(response: &reqwest::Response) -> Option<Duration> {
        let value = response
            .headers()
            .get("anthropic-ratelimit-requests-reset")?
            .to_str()
            .ok()?;
        let reset = chrono::DateTime::parse_from_rfc3339(value.trim()).ok()?;
        reset.signed_duration_since(chrono::Utc::now()).to_std().ok()
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = Self::parse_ratelimit_reset(&response)
                    .or_else(|| parse_retry_after(&response));
                Err(ProviderError::RateLimited { retry_after })
            }
            StatusCode::BAD_REQUEST => {
                let message = response.text().await.unwrap_or_default();
                if message.to_lowercase().contains("prompt is too long") {
                    return Err(ProviderError::ContextLengthExceeded(message));
                }
                Err(ProviderError::Api {
                    status: StatusCode::BAD_REQUEST.as_u16(),
                    message,
                })
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(ProviderError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage), ProviderError> {
        let (system, chat) = split_system(messages, self.config.system_suffix.as_deref())?;
        let model = self.config.models.resolve(options.tier, &ANTHROPIC_MODELS);

        let cache_enabled = !options.cache_disabled;
        let system_cached = cache_enabled
            && messages
                .iter()
                .any(|m| m.role == Role::System && m.cache);

        let mut messages_spec = Self::messages_to_anthropic_spec(&chat, cache_enabled);
        let budget = MAX_CACHE_BREAKPOINTS - usize::from(system_cached);
        Self::trim_cache_breakpoints(&mut messages_spec, budget);

        let system_spec = if system_cached {
            json!([{"type": "text", "text": system, "cache_control": {"type": "ephemeral"}}])
        } else {
            json!(system)
        };

        let thinking_budget = options
            .thinking_budget
            .map(|budget| budget.max(MIN_THINKING_BUDGET) as i32);
        let mut max_tokens = options
            .max_tokens
            .or(self.config.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS);
        if let Some(budget) = thinking_budget {
            // the token budget must leave room for output past the thinking
            if max_tokens <= budget {
                max_tokens = budget + DEFAULT_MAX_TOKENS;
            }
        }

        let mut payload = json!({
            "model": model,
            "max_tokens": max_tokens,
            "system": system_spec,
            "messages": messages_spec,
        });
        let body = payload.as_object_mut().unwrap();
        if !tools.is_empty() {
            body.insert(
                "tools".to_string(),
                json!(Self::tools_to_anthropic_spec(tools)?),
            );
            body.insert(
                "tool_choice".to_string(),
                Self::tool_choice_to_spec(&options.tool_choice),
            );
        }
        if let Some(budget) = thinking_budget {
            // extended thinking fixes sampling settings server-side
            body.insert(
                "thinking".to_string(),
                json!({"type": "enabled", "budget_tokens": budget}),
            );
        } else if let Some(temp) = options.temperature.or(self.config.temperature) {
            body.insert("temperature".to_string(), json!(temp));
        }

        let response = self.post(payload).await?;

        let message = Self::response_to_message(&response)?;
        let usage = Self::get_usage(&response)?;

        Ok((message, usage))
    }
}
