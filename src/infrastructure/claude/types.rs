//! Request and response types for the Claude Messages API
use serde::{Deserialize, Serialize};

/// Message request sent to `/v1/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    /// Concrete model id (e.g. "claude-haiku-4-5")
    pub model: String,

    /// Conversation turns, oldest first
    pub messages: Vec<Message>,

    /// Output token cap
    pub max_tokens: u32,

    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl MessageRequest {
    /// Single user turn with an optional system prompt.
    pub fn simple(
        model: impl Into<String>,
        system: Option<String>,
        prompt: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            max_tokens,
            system,
            temperature: None,
        }
    }
}

/// A single conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// "user" or "assistant"
    pub role: String,
    /// Turn text
    pub content: String,
}

impl Message {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Content block in a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text
    #[serde(rename = "text")]
    Text {
        /// The text
        text: String,
    },
    /// A tool call
    #[serde(rename = "tool_use")]
    ToolUse {
        /// Tool call id
        id: String,
        /// Tool name
        name: String,
        /// Tool arguments
        input: serde_json::Value,
    },
    /// Block types this client ignores
    #[serde(other)]
    Other,
}

/// Token usage reported with every response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens billed
    pub input_tokens: u64,
    /// Completion tokens billed
    pub output_tokens: u64,
}

/// Response from `/v1/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message id
    pub id: String,
    /// Model that answered
    pub model: String,
    /// Response content blocks
    pub content: Vec<ContentBlock>,
    /// Why generation stopped
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Billed token counts
    #[serde(default)]
    pub usage: Usage,
}

impl MessageResponse {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}
