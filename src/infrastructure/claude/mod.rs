//! Claude Messages API adapter for the `LlmClient` port.

/// HTTP client with rate limiting and retries
pub mod client;
/// API error mapping
pub mod errors;
/// Token bucket limiter
pub mod rate_limiter;
/// Exponential backoff
pub mod retry;
/// Wire types for `/v1/messages`
pub mod types;

pub use client::{ClaudeClient, ClaudeClientConfig};
pub use errors::ClaudeApiError;
pub use rate_limiter::TokenBucketRateLimiter;
pub use retry::RetryPolicy;
pub use types::{ContentBlock, Message, MessageRequest, MessageResponse, Usage};
