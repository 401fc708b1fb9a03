use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
}

/// Where the bytes of an image live. Backends that cannot fetch a URI
/// themselves only get base64 data inlined into the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageSource {
    Data(String),
    Uri(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageContent {
    pub mime_type: String,
    #[serde(flatten)]
    pub source: ImageSource,
}

impl ImageContent {
    pub fn data(&self) -> Option<&str> {
        match &self.source {
            ImageSource::Data(data) => Some(data),
            ImageSource::Uri(_) => None,
        }
    }

    pub fn uri(&self) -> Option<&str> {
        match &self.source {
            ImageSource::Data(_) => None,
            ImageSource::Uri(uri) => Some(uri),
        }
    }
}

/// Content passed back to the model in tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Content {
    Text(TextContent),
    Image(ImageContent),
}

impl Content {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Content::Text(TextContent { text: text.into() })
    }

    pub fn image<S: Into<String>, T: Into<String>>(data: S, mime_type: T) -> Self {
        Content::Image(ImageContent {
            mime_type: mime_type.into(),
            source: ImageSource::Data(data.into()),
        })
    }

    pub fn image_uri<S: Into<String>, T: Into<String>>(uri: S, mime_type: T) -> Self {
        Content::Image(ImageContent {
            mime_type: mime_type.into(),
            source: ImageSource::Uri(uri.into()),
        })
    }

    pub fn image_bytes<T: Into<String>>(bytes: &[u8], mime_type: T) -> Self {
        Content::Image(ImageContent {
            mime_type: mime_type.into(),
            source: ImageSource::Data(STANDARD.encode(bytes)),
        })
    }

    /// Get the text of the content if it is a text variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    /// Get the image content if it is an image variant
    pub fn as_image(&self) -> Option<&ImageContent> {
        match self {
            Content::Image(image) => Some(image),
            _ => None,
        }
    }
}
