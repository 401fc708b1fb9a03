use chrono::Utc;

use super::content::{Content, ImageContent, ImageSource, TextContent};
use super::role::Role;
use super::tool::ToolCall;
use crate::errors::ToolResult;

/// A request from the model to use a tool.
///
/// The id is optional because one backend family never assigns call ids;
/// adapters that need one on the wire fall back to the function name.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub tool_call: ToolResult<ToolCall>,
}

/// The result of running a tool, paired back to the request by id when one
/// exists and by function name otherwise.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub tool_result: ToolResult<Vec<Content>>,
}

/// Text produced with web grounding, along with the URLs it cites.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchContent {
    pub text: String,
    pub citations: Vec<String>,
}

/// Code the model ran in a backend-side sandbox.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutableCodeContent {
    pub language: String,
    pub code: String,
}

/// The outcome of backend-side code execution.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExecutionResultContent {
    pub outcome: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_files: Vec<ImageContent>,
}

/// Content parts of a message, which can be text, images, tool calls and
/// tool results, or the richer parts some backends produce.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text(TextContent),
    Image(ImageContent),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
    WebSearch(WebSearchContent),
    ExecutableCode(ExecutableCodeContent),
    CodeExecutionResult(CodeExecutionResultContent),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn image<S: Into<String>, T: Into<String>>(data: S, mime_type: T) -> Self {
        MessageContent::Image(ImageContent {
            mime_type: mime_type.into(),
            source: ImageSource::Data(data.into()),
        })
    }

    pub fn image_uri<S: Into<String>, T: Into<String>>(uri: S, mime_type: T) -> Self {
        MessageContent::Image(ImageContent {
            mime_type: mime_type.into(),
            source: ImageSource::Uri(uri.into()),
        })
    }

    pub fn tool_request(id: Option<String>, tool_call: ToolResult<ToolCall>) -> Self {
        MessageContent::ToolRequest(ToolRequest { id, tool_call })
    }

    pub fn tool_response<S: Into<String>>(
        id: Option<String>,
        name: S,
        tool_result: ToolResult<Vec<Content>>,
    ) -> Self {
        MessageContent::ToolResponse(ToolResponse {
            id,
            name: name.into(),
            tool_result,
        })
    }

    pub fn web_search<S: Into<String>>(text: S, citations: Vec<String>) -> Self {
        MessageContent::WebSearch(WebSearchContent {
            text: text.into(),
            citations,
        })
    }

    pub fn executable_code<L: Into<String>, C: Into<String>>(language: L, code: C) -> Self {
        MessageContent::ExecutableCode(ExecutableCodeContent {
            language: language.into(),
            code: code.into(),
        })
    }

    pub fn code_execution_result<O: Into<String>, T: Into<String>>(outcome: O, output: T) -> Self {
        MessageContent::CodeExecutionResult(CodeExecutionResultContent {
            outcome: outcome.into(),
            output: output.into(),
            output_files: Vec::new(),
        })
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref tool_request) = self {
            Some(tool_request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

impl From<Content> for MessageContent {
    fn from(content: Content) -> Self {
        match content {
            Content::Text(text) => MessageContent::Text(text),
            Content::Image(image) => MessageContent::Image(image),
        }
    }
}

/// A message to or from the model, made up of content parts.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub role: Role,
    pub created: i64,
    /// Marks the prefix ending here as worth caching on backends that
    /// support prompt caching; others ignore it.
    #[serde(default)]
    pub cache: bool,
    pub content: Vec<MessageContent>,
}

impl Message {
    pub fn new(role: Role) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            cache: false,
            content: Vec::new(),
        }
    }

    /// Create a new system message carrying the prompt and instructions
    pub fn system() -> Self {
        Message::new(Role::System)
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message::new(Role::Assistant)
    }

    /// Add content to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Mark this message as a cache breakpoint
    pub fn cached(mut self) -> Self {
        self.cache = true;
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add base64 image content to the message
    pub fn with_image<S: Into<String>, T: Into<String>>(self, data: S, mime_type: T) -> Self {
        self.with_content(MessageContent::image(data, mime_type))
    }

    /// Add an image reference by URI to the message
    pub fn with_image_uri<S: Into<String>, T: Into<String>>(self, uri: S, mime_type: T) -> Self {
        self.with_content(MessageContent::image_uri(uri, mime_type))
    }

    /// Add a tool request to the message
    pub fn with_tool_request(self, id: Option<String>, tool_call: ToolResult<ToolCall>) -> Self {
        self.with_content(MessageContent::tool_request(id, tool_call))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<S: Into<String>>(
        self,
        id: Option<String>,
        name: S,
        result: ToolResult<Vec<Content>>,
    ) -> Self {
        self.with_content(MessageContent::tool_response(id, name, result))
    }

    /// Get the concatenated text content of the message, separated by newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Retrieve all tool requests in the message
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content
            .iter()
            .filter_map(|c| c.as_tool_request())
            .collect()
    }
}
