//! Domain errors for the autofix engine.

use thiserror::Error;

use super::ports::LlmError;

/// Domain-level errors raised while wiring and running the fix engine.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The rule table failed to load
    #[error("Classifier rules are invalid: {0}")]
    InvalidRules(String),

    /// The LLM port failed
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// A value failed validation
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Result alias for [`DomainError`].
pub type DomainResult<T> = Result<T, DomainError>;
