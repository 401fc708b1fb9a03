use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::base::{CompletionOptions, Provider, ProviderKind, TierDefaults, ToolChoice, Usage};
use super::configs::GoogleProviderConfig;
use super::utils::{is_valid_function_name, parse_retry_after, split_system};
use crate::errors::{ProviderError, ToolError};
use crate::models::content::{ImageContent, ImageSource};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

pub const GOOGLE_HOST: &str = "https://generativelanguage.googleapis.com";

pub const GOOGLE_MODELS: TierDefaults = TierDefaults {
    default: "gemini-2.5-pro",
    cheap: "gemini-2.5-flash",
    lite: "gemini-2.5-flash-lite",
    reasoning: "gemini-2.5-pro",
};

pub struct GoogleProvider {
    client: Client,
    config: GoogleProviderConfig,
}

impl GoogleProvider {
    pub fn new(config: GoogleProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    /// This backend never assigns call ids. Requests go out as bare
    /// functionCall parts and results pair back by function name.
    fn messages_to_google_spec(messages: &[&Message]) -> Vec<Value> {
        let mut contents = Vec::new();

        for message in messages {
            let role = match message.role {
                Role::Assistant => "model",
                _ => "user",
            };
            let mut parts: Vec<Value> = Vec::new();

            for content in &message.content {
                match content {
                    MessageContent::Text(text) => {
                        if !text.text.is_empty() {
                            parts.push(json!({"text": text.text}));
                        }
                    }
                    MessageContent::Image(image) => match &image.source {
                        ImageSource::Data(data) => parts.push(json!({
                            "inlineData": {"mimeType": image.mime_type, "data": data}
                        })),
                        ImageSource::Uri(uri) => parts.push(json!({
                            "fileData": {"mimeType": image.mime_type, "fileUri": uri}
                        })),
                    },
                    MessageContent::ToolRequest(request) => match &request.tool_call {
                        Ok(tool_call) => parts.push(json!({
                            "functionCall": {"name": tool_call.name, "args": tool_call.arguments}
                        })),
                        Err(e) => parts.push(json!({
                            "text": format!("The model produced an invalid tool call: {}", e)
                        })),
                    },
                    MessageContent::ToolResponse(response) => match &response.tool_result {
                        Ok(result) => {
                            let text = result
                                .iter()
                                .filter_map(|c| c.as_text())
                                .collect::<Vec<_>>()
                                .join("\n");
                            parts.push(json!({
                                "functionResponse": {
                                    "name": response.name,
                                    "response": {"result": text},
                                }
                            }));
                            for image in result.iter().filter_map(|c| c.as_image()) {
                                if let Some(data) = image.data() {
                                    parts.push(json!({
                                        "inlineData": {"mimeType": image.mime_type, "data": data}
                                    }));
                                }
                            }
                        }
                        Err(e) => parts.push(json!({
                            "functionResponse": {
                                "name": response.name,
                                "response": {"error": e.to_string()},
                            }
                        })),
                    },
                    MessageContent::WebSearch(search) => {
                        parts.push(json!({"text": search.text}))
                    }
                    MessageContent::ExecutableCode(code) => parts.push(json!({
                        "executableCode": {"language": code.language, "code": code.code}
                    })),
                    MessageContent::CodeExecutionResult(result) => parts.push(json!({
                        "codeExecutionResult": {"outcome": result.outcome, "output": result.output}
                    })),
                }
            }

            if parts.is_empty() {
                continue;
            }

            contents.push(json!({"role": role, "parts": parts}));
        }

        contents
    }

    /// Strip schema keys the generateContent API rejects
    fn sanitize_schema(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut cleaned = serde_json::Map::new();
                for (key, inner) in map {
                    if key == "$schema" || key == "additionalProperties" {
                        continue;
                    }
                    cleaned.insert(key.clone(), Self::sanitize_schema(inner));
                }
                Value::Object(cleaned)
            }
            Value::Array(items) => Value::Array(items.iter().map(Self::sanitize_schema).collect()),
            other => other.clone(),
        }
    }

    fn tools_to_google_spec(tools: &[Tool]) -> Result<Vec<Value>, ProviderError> {
        let mut tool_names = HashSet::new();
        let mut declarations = Vec::new();
        for tool in tools {
            if !tool_names.insert(&tool.name) {
                return Err(ProviderError::InvalidRequest(format!(
                    "Duplicate tool name: {}",
                    tool.name
                )));
            }
            declarations.push(json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": Self::sanitize_schema(&tool.input_schema),
            }));
        }
        Ok(declarations)
    }

    fn tool_config_to_spec(choice: &ToolChoice) -> Value {
        let config = match choice {
            ToolChoice::None => json!({"mode": "NONE"}),
            ToolChoice::Any => json!({"mode": "AUTO"}),
            ToolChoice::Tool(name) => json!({"mode": "ANY", "allowedFunctionNames": [name]}),
        };
        json!({"functionCallingConfig": config})
    }

    fn response_to_message(response: &Value) -> Result<Message, ProviderError> {
        let candidate = response
            .get("candidates")
            .and_then(|c| c.get(0))
            .ok_or_else(|| {
                ProviderError::InvalidResponse("no candidates in response".to_string())
            })?;
        // blocked prompts come back as a candidate with no content
        let parts = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
            .map(|a| a.as_slice())
            .unwrap_or(&[]);

        let mut message = Message::assistant();
        for part in parts {
            if part
                .get("thought")
                .and_then(|t| t.as_bool())
                .unwrap_or(false)
            {
                continue;
            }

            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                if !text.is_empty() {
                    message = message.with_text(text);
                }
            } else if let Some(call) = part.get("functionCall") {
                let name = call.get("name").and_then(|n| n.as_str()).unwrap_or_default();
                let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
                let tool_call = if is_valid_function_name(name) {
                    Ok(ToolCall::new(name, args))
                } else {
                    Err(ToolError::NotFound(format!(
                        "The provided function name '{}' had invalid characters, it must match this regex: [a-zA-Z0-9_-]+",
                        name
                    )))
                };
                message = message.with_content(MessageContent::tool_request(None, tool_call));
            } else if let Some(code) = part.get("executableCode") {
                message = message.with_content(MessageContent::executable_code(
                    code.get("language")
                        .and_then(|l| l.as_str())
                        .unwrap_or("PYTHON"),
                    code.get("code").and_then(|c| c.as_str()).unwrap_or_default(),
                ));
            } else if let Some(result) = part.get("codeExecutionResult") {
                message = message.with_content(MessageContent::code_execution_result(
                    result
                        .get("outcome")
                        .and_then(|o| o.as_str())
                        .unwrap_or_default(),
                    result
                        .get("output")
                        .and_then(|o| o.as_str())
                        .unwrap_or_default(),
                ));
            } else if let Some(inline) = part.get("inlineData") {
                let mime_type = inline
                    .get("mimeType")
                    .and_then(|m| m.as_str())
                    .unwrap_or("image/png");
                let data = inline
                    .get("data")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default();
                // files produced by code execution ride along as inline
                // images right after the result part
                if let Some(MessageContent::CodeExecutionResult(result)) =
                    message.content.last_mut()
                {
                    result.output_files.push(ImageContent {
                        mime_type: mime_type.to_string(),
                        source: ImageSource::Data(data.to_string()),
                    });
                } else {
                    message = message.with_content(MessageContent::image(data, mime_type));
                }
            }
        }

        if let Some(grounding) = candidate.get("groundingMetadata") {
            let queries = grounding
                .get("webSearchQueries")
                .and_then(|q| q.as_array())
                .map(|queries| {
                    queries
                        .iter()
                        .filter_map(|q| q.as_str())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .unwrap_or_default();
            let citations: Vec<String> = grounding
                .get("groundingChunks")
                .and_then(|c| c.as_array())
                .map(|chunks| {
                    chunks
                        .iter()
                        .filter_map(|chunk| {
                            chunk
                                .pointer("/web/uri")
                                .and_then(|u| u.as_str())
                                .map(String::from)
                        })
                        .collect()
                })
                .unwrap_or_default();
            message = message.with_content(MessageContent::web_search(queries, citations));
        }

        Ok(message)
    }

    fn get_usage(data: &Value) -> Result<Usage, ProviderError> {
        let usage = data.get("usageMetadata").ok_or_else(|| {
            ProviderError::InvalidResponse("no usage data in response".to_string())
        })?;

        let input_tokens = usage
            .get("promptTokenCount")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);
        // thought tokens are billed as output but reported separately
        let candidate_tokens = usage
            .get("candidatesTokenCount")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let thought_tokens = usage
            .get("thoughtsTokenCount")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        let output_tokens = if usage.get("candidatesTokenCount").is_some()
            || usage.get("thoughtsTokenCount").is_some()
        {
            Some((candidate_tokens + thought_tokens) as i32)
        } else {
            None
        };
        let total_tokens = usage
            .get("totalTokenCount")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });
        let cache_read_tokens = usage
            .get("cachedContentTokenCount")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        Ok(Usage::new(input_tokens, output_tokens, total_tokens)
            .with_cache(None, cache_read_tokens))
    }

    /// A RESOURCE_EXHAUSTED error may carry a RetryInfo detail with the
    /// delay to wait before the next request
    fn parse_retry_info(error: &Value) -> Option<Duration> {
        let details = error.get("details")?.as_array()?;
        for detail in details {
            if detail.get("@type").and_then(|t| t.as_str())
                != Some("type.googleapis.com/google.rpc.RetryInfo")
            {
                continue;
            }
            let delay = detail.get("retryDelay")?.as_str()?;
            let seconds: f64 = delay.trim().trim_end_matches('s').parse().ok()?;
            if seconds.is_finite() && seconds >= 0.0 {
                return Some(Duration::from_secs_f64(seconds));
            }
        }
        None
    }

    async fn post(&self, model: &str, payload: Value) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.host.trim_end_matches('/'),
            model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::TOO_MANY_REQUESTS => {
                let header_hint = parse_retry_after(&response);
                let body: Value = response.json().await.unwrap_or_default();
                let retry_after = body
                    .get("error")
                    .and_then(Self::parse_retry_info)
                    .or(header_hint);
                Err(ProviderError::RateLimited { retry_after })
            }
            StatusCode::BAD_REQUEST => {
                let message = response.text().await.unwrap_or_default();
                if message.contains("exceeds the maximum number of tokens") {
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
impl Provider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage), ProviderError> {
        let (system, chat) = split_system(messages, self.config.system_suffix.as_deref())?;
        let model = self.config.models.resolve(options.tier, &GOOGLE_MODELS);

        let mut payload = json!({
            "systemInstruction": {"parts": [{"text": system}]},
            "contents": Self::messages_to_google_spec(&chat),
        });
        let body = payload.as_object_mut().unwrap();

        if !tools.is_empty() {
            body.insert(
                "tools".to_string(),
                json!([{"functionDeclarations": Self::tools_to_google_spec(tools)?}]),
            );
            body.insert(
                "toolConfig".to_string(),
                Self::tool_config_to_spec(&options.tool_choice),
            );
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(temp) = options.temperature.or(self.config.temperature) {
            generation_config.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tokens) = options.max_tokens.or(self.config.max_tokens) {
            generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }
        if let Some(budget) = options.thinking_budget {
            generation_config.insert(
                "thinkingConfig".to_string(),
                json!({"thinkingBudget": budget}),
            );
        }
        if !generation_config.is_empty() {
            body.insert(
                "generationConfig".to_string(),
                Value::Object(generation_config),
            );
        }

        let response = self.post(&model, payload).await?;

        let message = Self::response_to_message(&response)?;
        let usage = Self::get_usage(&response)?;

        Ok((message, usage))
    }
}
