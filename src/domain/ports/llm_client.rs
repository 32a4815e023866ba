use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::LlmError;

/// Model alias the fix tiers ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelAlias {
    /// Cheap model for single-file fixes.
    Haiku,
    /// Stronger model for multi-file fixes.
    Sonnet,
    /// Strongest model.
    Opus,
}

impl ModelAlias {
    /// Lowercase alias name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Haiku => "haiku",
            Self::Sonnet => "sonnet",
            Self::Opus => "opus",
        }
    }
}

/// A system + user prompt pair sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model alias to use.
    pub model: ModelAlias,
    /// System prompt.
    pub system: String,
    /// User prompt.
    pub prompt: String,
    /// Output token cap.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Text answer plus token accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Concatenated text blocks.
    pub text: String,
    /// Concrete model id that answered.
    pub model: String,
    /// Prompt tokens billed.
    pub input_tokens: u64,
    /// Completion tokens billed.
    pub output_tokens: u64,
}

/// Port for the external language model.
///
/// The fix tiers depend on this trait only; the Claude HTTP client in
/// `infrastructure::claude` is the production implementation.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one prompt and return the model's text.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;
}
