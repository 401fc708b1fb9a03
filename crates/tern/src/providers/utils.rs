use std::collections::HashSet;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};

use crate::errors::{ProviderError, ToolError};
use crate::models::content::{ImageContent, ImageSource};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};
use crate::providers::base::Usage;

/// Convert an internal image into the representation a backend family uses
#[derive(Debug, Clone, PartialEq)]
pub enum ImageFormat {
    OpenAi,
    Anthropic,
}

lazy_static! {
    static ref SANITIZE_PATTERN: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME_PATTERN: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Replace characters backends reject in function names with underscores
pub fn sanitize_function_name(name: &str) -> String {
    SANITIZE_PATTERN.replace_all(name, "_").to_string()
}

pub fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME_PATTERN.is_match(name)
}

/// Pull the system prompt out of a conversation, leaving the rest in order.
///
/// Every backend call needs exactly one system prompt. Multiple system
/// items are merged; a conversation without one is a caller bug reported
/// before any network work happens.
pub fn split_system<'a>(
    messages: &'a [Message],
    suffix: Option<&str>,
) -> Result<(String, Vec<&'a Message>), ProviderError> {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut rest = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                for content in &message.content {
                    if let Some(text) = content.as_text() {
                        system_parts.push(text);
                    }
                }
            }
            _ => rest.push(message),
        }
    }

    if system_parts.is_empty() {
        return Err(ProviderError::InvalidRequest(
            "conversation has no system prompt".to_string(),
        ));
    }

    let mut system = system_parts.join("\n\n");
    if let Some(suffix) = suffix {
        if !suffix.is_empty() {
            system.push('\n');
            system.push_str(suffix);
        }
    }

    Ok((system, rest))
}

/// Wire id for a call, falling back to the function name for backends
/// that never assigned one
pub fn call_id(id: &Option<String>, name: &str) -> String {
    id.clone()
        .unwrap_or_else(|| format!("call_{}", sanitize_function_name(name)))
}

pub fn convert_image(image: &ImageContent, image_format: &ImageFormat) -> Value {
    match image_format {
        ImageFormat::OpenAi => {
            let url = match &image.source {
                ImageSource::Data(data) => format!("data:{};base64,{}", image.mime_type, data),
                ImageSource::Uri(uri) => uri.clone(),
            };
            json!({"type": "image_url", "image_url": {"url": url}})
        }
        ImageFormat::Anthropic => match &image.source {
            ImageSource::Data(data) => json!({
                "type": "image",
                "source": {"type": "base64", "media_type": image.mime_type, "data": data}
            }),
            ImageSource::Uri(uri) => json!({
                "type": "image",
                "source": {"type": "url", "url": uri}
            }),
        },
    }
}

/// Convert internal messages to the OpenAI chat shape shared by the chat
/// completions endpoint and the brokered deployments.
///
/// Richer parts some backends produce (web search, sandboxed code) degrade
/// to text so a history recorded on one provider can be replayed on another.
pub fn messages_to_openai_spec(messages: &[&Message], image_format: &ImageFormat) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = json!({ "role": message.role });
        let mut text_parts: Vec<String> = Vec::new();
        let mut image_parts: Vec<Value> = Vec::new();
        let mut output = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => text_parts.push(text.text.clone()),
                MessageContent::Image(image) => {
                    image_parts.push(convert_image(image, image_format))
                }
                MessageContent::ToolRequest(request) => match &request.tool_call {
                    Ok(tool_call) => {
                        let sanitized_name = sanitize_function_name(&tool_call.name);
                        let tool_calls = converted
                            .as_object_mut()
                            .unwrap()
                            .entry("tool_calls")
                            .or_insert(json!([]));
                        tool_calls.as_array_mut().unwrap().push(json!({
                            "id": call_id(&request.id, &tool_call.name),
                            "type": "function",
                            "function": {
                                "name": sanitized_name,
                                "arguments": tool_call.arguments.to_string(),
                            }
                        }));
                    }
                    // a call that failed to parse is replayed as plain text
                    // so the transcript stays well formed on every wire
                    Err(e) => text_parts.push(format!("The model produced an invalid tool call: {}", e)),
                },
                MessageContent::ToolResponse(response) => match &response.tool_result {
                    Ok(contents) => {
                        let text = contents
                            .iter()
                            .filter_map(|c| c.as_text())
                            .collect::<Vec<_>>()
                            .join("\n");
                        let images: Vec<&ImageContent> =
                            contents.iter().filter_map(|c| c.as_image()).collect();

                        // images cannot ride inside a tool result on this
                        // wire; they are resent as a follow-up user message
                        let mut body = text;
                        if !images.is_empty() {
                            if !body.is_empty() {
                                body.push('\n');
                            }
                            body.push_str(
                                "This tool result included an image that is uploaded in the next message.",
                            );
                        }
                        output.push(json!({
                            "role": "tool",
                            "content": body,
                            "tool_call_id": call_id(&response.id, &response.name)
                        }));
                        for image in images {
                            output.push(json!({
                                "role": "user",
                                "content": [convert_image(image, image_format)]
                            }));
                        }
                    }
                    Err(e) => {
                        output.push(json!({
                            "role": "tool",
                            "content": format!("The tool call returned the following error:\n{}", e),
                            "tool_call_id": call_id(&response.id, &response.name)
                        }));
                    }
                },
                MessageContent::WebSearch(search) => text_parts.push(search.text.clone()),
                MessageContent::ExecutableCode(code) => {
                    text_parts.push(format!("```{}\n{}\n```", code.language, code.code))
                }
                MessageContent::CodeExecutionResult(result) => {
                    text_parts.push(result.output.clone())
                }
            }
        }

        if !image_parts.is_empty() {
            let mut parts: Vec<Value> = Vec::new();
            if !text_parts.is_empty() {
                parts.push(json!({"type": "text", "text": text_parts.join("\n")}));
            }
            parts.extend(image_parts);
            converted["content"] = json!(parts);
        } else if !text_parts.is_empty() {
            converted["content"] = json!(text_parts.join("\n"));
        }

        if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
            messages_spec.push(converted);
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert internal tool declarations to the OpenAI function schema
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>, ProviderError> {
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
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }
    Ok(result)
}

pub fn tool_choice_to_openai_spec(choice: &crate::providers::base::ToolChoice) -> Value {
    use crate::providers::base::ToolChoice;
    match choice {
        ToolChoice::None => json!("none"),
        ToolChoice::Any => json!("required"),
        ToolChoice::Tool(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

/// Build a tool request from wire-level name and argument text, keeping
/// parse problems inside the request instead of failing the whole message
pub fn parse_tool_call(id: Option<String>, function_name: &str, arguments: &str) -> MessageContent {
    if !is_valid_function_name(function_name) {
        let error = ToolError::NotFound(format!(
            "The provided function name '{}' had invalid characters, it must match this regex: [a-zA-Z0-9_-]+",
            function_name
        ));
        return MessageContent::tool_request(id, Err(error));
    }

    if arguments.is_empty() {
        return MessageContent::tool_request(id, Ok(ToolCall::new(function_name, json!({}))));
    }

    match serde_json::from_str::<Value>(arguments) {
        Ok(params) => MessageContent::tool_request(id, Ok(ToolCall::new(function_name, params))),
        Err(e) => {
            let error = ToolError::InvalidParameters(format!(
                "Could not interpret tool use parameters for id {}: {}",
                id.as_deref().unwrap_or("unknown"),
                e
            ));
            MessageContent::tool_request(id, Err(error))
        }
    }
}

/// Convert an OpenAI chat completions response to an internal message
pub fn openai_response_to_message(response: Value) -> Result<Message, ProviderError> {
    let original = response["choices"][0]["message"].clone();
    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            message = message.with_text(text);
        }
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|tc| tc.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().map(String::from);
            let function_name = tool_call["function"]["name"].as_str().unwrap_or_default();
            let arguments = tool_call["function"]["arguments"].as_str().unwrap_or_default();
            message = message.with_content(parse_tool_call(id, function_name, arguments));
        }
    }

    Ok(message)
}

/// Extract token usage from an OpenAI-shaped response body
pub fn openai_usage(data: &Value) -> Result<Usage, ProviderError> {
    let usage = data
        .get("usage")
        .ok_or_else(|| ProviderError::InvalidResponse("no usage data in response".to_string()))?;

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);
    let output_tokens = usage
        .get("completion_tokens")
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
        .get("prompt_tokens_details")
        .and_then(|details| details.get("cached_tokens"))
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    Ok(Usage::new(input_tokens, output_tokens, total_tokens).with_cache(None, cache_read_tokens))
}

/// Detect the OpenAI context window error from an error payload
pub fn check_openai_context_length_error(error: &Value) -> Option<ProviderError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("exceeds context limit")
            .to_string();
        Some(ProviderError::ContextLengthExceeded(message))
    } else {
        None
    }
}

/// Brokered endpoints wrap the underlying model's errors; detect the
/// context window case from the inner message
pub fn check_brokered_context_length_error(payload: &Value) -> Option<ProviderError> {
    let message = payload
        .get("message")
        .or_else(|| {
            payload
                .get("external_model_message")
                .and_then(|m| m.get("message"))
        })
        .and_then(|m| m.as_str())?;

    let lowered = message.to_lowercase();
    if lowered.contains("prompt is too long")
        || lowered.contains("input is too long")
        || lowered.contains("context length")
    {
        Some(ProviderError::ContextLengthExceeded(message.to_string()))
    } else {
        None
    }
}

/// Parse a retry-after header given in integer seconds
pub fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Whether a model takes a reasoning effort setting instead of temperature
pub fn model_supports_reasoning(model: &str) -> bool {
    model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4") || model.starts_with("gpt-5")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::Content;
    use crate::providers::base::ToolChoice;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "role": "assistant",
            "message": {
                "tool_calls": [{
                    "id": "1",
                    "function": {
                        "name": "example_fn",
                        "arguments": "{\"param\": \"value\"}"
                    }
                }]
            }
        }],
        "usage": {
            "prompt_tokens": 100,
            "completion_tokens": 25,
            "total_tokens": 125
        }
    }"#;

    #[test]
    fn test_split_system_merges_and_errors() {
        let messages = vec![
            Message::system().with_text("You are an agent."),
            Message::system().with_text("Extra instructions."),
            Message::user().with_text("hello"),
        ];

        let (system, rest) = split_system(&messages, None).unwrap();
        assert_eq!(system, "You are an agent.\n\nExtra instructions.");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].role, Role::User);

        let (system, _) = split_system(&messages, Some("Always answer in French.")).unwrap();
        assert!(system.ends_with("\nAlways answer in French."));

        let no_system = vec![Message::user().with_text("hello")];
        let err = split_system(&no_system, None).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn test_messages_to_openai_spec_basic() {
        let user = Message::user().with_text("Hello");
        let assistant = Message::assistant().with_text("Hi there");
        let spec = messages_to_openai_spec(&[&user, &assistant], &ImageFormat::OpenAi);

        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(spec[1]["content"], "Hi there");
    }

    #[test]
    fn test_messages_to_openai_spec_tool_flow() {
        let request = Message::assistant().with_tool_request(
            Some("call_1".to_string()),
            Ok(ToolCall::new("read_file", json!({"filePath": "src/main.rs"}))),
        );
        let response = Message::user().with_tool_response(
            Some("call_1".to_string()),
            "read_file",
            Ok(vec![Content::text("fn main() {}")]),
        );

        let spec = messages_to_openai_spec(&[&request, &response], &ImageFormat::OpenAi);

        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0]["role"], "assistant");
        assert_eq!(spec[0]["tool_calls"][0]["id"], "call_1");
        assert_eq!(spec[0]["tool_calls"][0]["function"]["name"], "read_file");
        assert_eq!(spec[1]["role"], "tool");
        assert_eq!(spec[1]["tool_call_id"], "call_1");
        assert_eq!(spec[1]["content"], "fn main() {}");
    }

    #[test]
    fn test_messages_to_openai_spec_id_fallback() {
        // histories recorded on a backend without call ids pair by name
        let request = Message::assistant()
            .with_tool_request(None, Ok(ToolCall::new("get_weather", json!({"city": "Berlin"}))));
        let response = Message::user().with_tool_response(
            None,
            "get_weather",
            Ok(vec![Content::text("22C and sunny")]),
        );

        let spec = messages_to_openai_spec(&[&request, &response], &ImageFormat::OpenAi);

        assert_eq!(spec[0]["tool_calls"][0]["id"], "call_get_weather");
        assert_eq!(spec[1]["tool_call_id"], "call_get_weather");
    }

    #[test]
    fn test_messages_to_openai_spec_tool_result_image() {
        let response = Message::user().with_tool_response(
            Some("call_1".to_string()),
            "screenshot",
            Ok(vec![Content::image("aGVsbG8=", "image/png")]),
        );

        let spec = messages_to_openai_spec(&[&response], &ImageFormat::OpenAi);

        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0]["role"], "tool");
        assert!(spec[0]["content"]
            .as_str()
            .unwrap()
            .contains("uploaded in the next message"));
        assert_eq!(spec[1]["role"], "user");
        assert_eq!(
            spec[1]["content"][0]["image_url"]["url"],
            "data:image/png;base64,aGVsbG8="
        );
    }

    #[test]
    fn test_messages_to_openai_spec_multimodal_user() {
        let message = Message::user()
            .with_text("what is in this image?")
            .with_image("aGVsbG8=", "image/jpeg");

        let spec = messages_to_openai_spec(&[&message], &ImageFormat::OpenAi);

        assert_eq!(spec.len(), 1);
        let parts = spec[0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
    }

    #[test]
    fn test_messages_to_openai_spec_skips_empty() {
        let empty = Message::assistant();
        let spec = messages_to_openai_spec(&[&empty], &ImageFormat::OpenAi);
        assert!(spec.is_empty());
    }

    #[test]
    fn test_convert_image_anthropic() {
        let image = ImageContent {
            mime_type: "image/png".to_string(),
            source: ImageSource::Data("aGVsbG8=".to_string()),
        };
        let converted = convert_image(&image, &ImageFormat::Anthropic);
        assert_eq!(converted["source"]["type"], "base64");
        assert_eq!(converted["source"]["media_type"], "image/png");

        let image = ImageContent {
            mime_type: "image/png".to_string(),
            source: ImageSource::Uri("https://example.com/cat.png".to_string()),
        };
        let converted = convert_image(&image, &ImageFormat::Anthropic);
        assert_eq!(converted["source"]["type"], "url");
        assert_eq!(converted["source"]["url"], "https://example.com/cat.png");
    }

    #[test]
    fn test_tools_to_openai_spec() {
        let tool = Tool::new(
            "test_tool",
            "Test tool",
            json!({
                "type": "object",
                "properties": {"input": {"type": "string", "description": "Test parameter"}},
                "required": ["input"]
            }),
        );
        let spec = tools_to_openai_spec(&[tool]).unwrap();
        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "test_tool");
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() {
        let tool1 = Tool::new("test_tool", "Test tool", json!({"type": "object"}));
        let tool2 = Tool::new("test_tool", "Another tool", json!({"type": "object"}));
        let result = tools_to_openai_spec(&[tool1, tool2]);
        assert!(matches!(result, Err(ProviderError::InvalidRequest(_))));
    }

    #[test]
    fn test_tools_to_openai_spec_empty() {
        let spec = tools_to_openai_spec(&[]).unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn test_tool_choice_to_openai_spec() {
        assert_eq!(tool_choice_to_openai_spec(&ToolChoice::None), json!("none"));
        assert_eq!(tool_choice_to_openai_spec(&ToolChoice::Any), json!("required"));
        assert_eq!(
            tool_choice_to_openai_spec(&ToolChoice::Tool("update_file".to_string())),
            json!({"type": "function", "function": {"name": "update_file"}})
        );
    }

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("hello-world"), "hello-world");
        assert_eq!(sanitize_function_name("hello world"), "hello_world");
        assert_eq!(sanitize_function_name("hello@world"), "hello_world");
    }

    #[test]
    fn test_is_valid_function_name() {
        assert!(is_valid_function_name("hello-world"));
        assert!(is_valid_function_name("hello_world_2"));
        assert!(!is_valid_function_name("hello world"));
        assert!(!is_valid_function_name("hello@world"));
        assert!(!is_valid_function_name(""));
    }

    #[test]
    fn test_parse_text_response() -> anyhow::Result<()> {
        let response = json!({
            "choices": [{"role": "assistant", "message": {"content": "Hello from the assistant!"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 15, "total_tokens": 27}
        });

        let message = openai_response_to_message(response)?;
        assert_eq!(message.text(), "Hello from the assistant!");
        assert_eq!(message.role, Role::Assistant);
        Ok(())
    }

    #[test]
    fn test_parse_valid_tool_call_response() -> anyhow::Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let message = openai_response_to_message(response)?;

        let requests = message.tool_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id.as_deref(), Some("1"));
        let tool_call = requests[0].tool_call.as_ref().unwrap();
        assert_eq!(tool_call.name, "example_fn");
        assert_eq!(tool_call.arguments, json!({"param": "value"}));
        Ok(())
    }

    #[test]
    fn test_parse_invalid_function_name() -> anyhow::Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["name"] =
            json!("invalid fn");

        let message = openai_response_to_message(response)?;

        let error = message.tool_requests()[0].tool_call.clone().unwrap_err();
        assert!(matches!(error, ToolError::NotFound(_)));
        assert!(error.to_string().contains("invalid characters"));
        Ok(())
    }

    #[test]
    fn test_parse_invalid_json_arguments() -> anyhow::Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!("invalid json {");

        let message = openai_response_to_message(response)?;

        let error = message.tool_requests()[0].tool_call.clone().unwrap_err();
        assert!(matches!(error, ToolError::InvalidParameters(_)));
        Ok(())
    }

    #[test]
    fn test_parse_empty_arguments() -> anyhow::Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] = json!("");

        let message = openai_response_to_message(response)?;

        let tool_call = message.tool_requests()[0].tool_call.clone().unwrap();
        assert_eq!(tool_call.arguments, json!({}));
        Ok(())
    }

    #[test]
    fn test_openai_usage() -> anyhow::Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let usage = openai_usage(&response)?;
        assert_eq!(usage.input_tokens, Some(100));
        assert_eq!(usage.output_tokens, Some(25));
        assert_eq!(usage.total_tokens, Some(125));
        assert_eq!(usage.cache_read_tokens, None);

        let with_cache = json!({
            "usage": {
                "prompt_tokens": 100,
                "completion_tokens": 25,
                "prompt_tokens_details": {"cached_tokens": 60}
            }
        });
        let usage = openai_usage(&with_cache)?;
        assert_eq!(usage.cache_read_tokens, Some(60));
        // total falls back to the sum when the field is missing
        assert_eq!(usage.total_tokens, Some(125));

        assert!(openai_usage(&json!({})).is_err());
        Ok(())
    }

    #[test]
    fn test_check_openai_context_length_error() {
        let error = json!({
            "code": "context_length_exceeded",
            "message": "This model's maximum context length is 128000 tokens."
        });
        let checked = check_openai_context_length_error(&error).unwrap();
        assert!(matches!(checked, ProviderError::ContextLengthExceeded(_)));

        let other = json!({"code": "rate_limit_exceeded", "message": "Too many requests"});
        assert!(check_openai_context_length_error(&other).is_none());

        assert!(check_openai_context_length_error(&json!({})).is_none());
    }

    #[test]
    fn test_check_brokered_context_length_error() {
        let error = json!({
            "error_code": "BAD_REQUEST",
            "message": "Bad request: prompt is too long: 1049570 tokens > 200000 maximum"
        });
        let checked = check_brokered_context_length_error(&error).unwrap();
        assert!(matches!(checked, ProviderError::ContextLengthExceeded(_)));

        let wrapped = json!({
            "error_code": "BAD_REQUEST",
            "external_model_message": {"message": "Input is too long for requested model."}
        });
        assert!(check_brokered_context_length_error(&wrapped).is_some());

        let other = json!({"error_code": "BAD_REQUEST", "message": "malformed payload"});
        assert!(check_brokered_context_length_error(&other).is_none());
    }

    #[test]
    fn test_model_supports_reasoning() {
        assert!(model_supports_reasoning("o4-mini"));
        assert!(model_supports_reasoning("gpt-5-mini"));
        assert!(!model_supports_reasoning("gpt-4.1"));
    }
}
