//! LLM request/response types
//!
//! These types model an OpenAI-compatible chat completion closely enough for
//! timetable extraction: one system prompt, user messages that carry either
//! text or a mix of text and images, and a single text answer.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (rendered from a Handlebars template)
    pub system_prompt: String,

    /// User messages (one per pipeline attempt)
    pub messages: Vec<Message>,

    /// Max tokens for response (from config)
    pub max_tokens: u32,

    /// Model override; the client's configured model is used when `None`
    pub model: Option<String>,

    /// Ask the provider for a JSON object response
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, message: Message, max_tokens: u32) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: vec![message],
            max_tokens,
            model: None,
            json_mode: false,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    /// Create a user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        debug!("Message::user: called");
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create a user message with multiple content blocks
    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        debug!(block_count = %blocks.len(), "Message::user_blocks: called");
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }
}

/// Message role
///
/// Every message the pipeline sends is a user message; attempts are
/// independent single-turn calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
        }
    }
}

/// Message content - either plain text or structured blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Get text content if this is a text message
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Blocks(_) => None,
        }
    }
}

/// A content block in a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    /// Image passed by URL, usually a `data:` URL carrying base64 content
    #[serde(rename = "image_url")]
    Image { url: String },
}

impl ContentBlock {
    /// Create a text content block
    pub fn text(text: impl Into<String>) -> Self {
        debug!("ContentBlock::text: called");
        ContentBlock::Text { text: text.into() }
    }

    /// Create an image block from base64 data or an existing data URL
    ///
    /// Bare base64 payloads are assumed to be JPEG.
    pub fn image(data: impl Into<String>) -> Self {
        let data = data.into();
        let url = if data.starts_with("data:") || data.starts_with("http://") || data.starts_with("https://") {
            debug!("ContentBlock::image: using url as given");
            data
        } else {
            debug!("ContentBlock::image: wrapping bare base64 in data url");
            format!("data:image/jpeg;base64,{}", data)
        };
        ContentBlock::Image { url }
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Text content (if any)
    pub content: Option<String>,

    /// Why the model stopped
    pub stop_reason: StopReason,

    /// Token usage
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// A plain text response, as produced by scripted clients in tests
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        }
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ContentFilter,
}

impl StopReason {
    /// Parse from an OpenAI-style `finish_reason`
    pub fn from_openai(s: Option<&str>) -> Self {
        debug!(?s, "StopReason::from_openai: called");
        match s {
            Some("length") => StopReason::MaxTokens,
            Some("content_filter") => StopReason::ContentFilter,
            _ => StopReason::EndTurn,
        }
    }
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_block_wraps_bare_base64() {
        let block = ContentBlock::image("aGVsbG8=");
        assert_eq!(
            block,
            ContentBlock::Image {
                url: "data:image/jpeg;base64,aGVsbG8=".to_string()
            }
        );
    }

    #[test]
    fn test_image_block_keeps_data_url() {
        let url = "data:image/png;base64,aGVsbG8=";
        assert_eq!(ContentBlock::image(url), ContentBlock::Image { url: url.to_string() });
    }

    #[test]
    fn test_stop_reason_from_openai() {
        assert_eq!(StopReason::from_openai(Some("stop")), StopReason::EndTurn);
        assert_eq!(StopReason::from_openai(Some("length")), StopReason::MaxTokens);
        assert_eq!(StopReason::from_openai(Some("content_filter")), StopReason::ContentFilter);
        assert_eq!(StopReason::from_openai(None), StopReason::EndTurn);
    }

    #[test]
    fn test_message_user_text() {
        let msg = Message::user("hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.role.as_str(), "user");
        assert_eq!(msg.content.as_text(), Some("hello"));
    }
}
