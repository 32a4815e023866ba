use super::errors::ClaudeApiError;
use super::rate_limiter::TokenBucketRateLimiter;
use super::retry::RetryPolicy;
use super::types::{MessageRequest, MessageResponse};
use async_trait::async_trait;
use reqwest::{header, Client as ReqwestClient, Response};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::models::{ClaudeConfig, ModelsConfig};
use crate::domain::ports::{Completion, CompletionRequest, LlmClient, LlmError, ModelAlias};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Configuration for the Claude HTTP client
#[derive(Debug, Clone)]
pub struct ClaudeClientConfig {
    /// Anthropic API key
    pub api_key: String,
    /// API base URL, without the `/v1` path
    pub base_url: String,
    /// Requests per second allowed by the token bucket
    pub rate_limit_rps: f64,
    /// Retries for transient failures
    pub max_retries: u32,
    /// First retry delay
    pub initial_backoff_ms: u64,
    /// Upper bound on the retry delay
    pub max_backoff_ms: u64,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Concrete model ids for each alias
    pub models: ModelsConfig,
}

impl ClaudeClientConfig {
    /// Build from the `claude` config section; fails when no API key is
    /// configured or present in the environment.
    pub fn from_settings(settings: &ClaudeConfig) -> Result<Self, LlmError> {
        let api_key = settings.resolve_api_key().ok_or_else(|| {
            LlmError::NotConfigured(
                "set claude.api_key or the ANTHROPIC_API_KEY environment variable".to_string(),
            )
        })?;
        Ok(Self {
            api_key,
            base_url: settings.base_url.clone(),
            rate_limit_rps: settings.rate_limit_rps,
            max_retries: settings.max_retries,
            initial_backoff_ms: settings.initial_backoff_ms,
            max_backoff_ms: settings.max_backoff_ms,
            timeout_secs: settings.timeout_secs,
            models: settings.models.clone(),
        })
    }
}

/// HTTP client for the Claude Messages API
///
/// Pools connections, throttles with a token bucket and retries transient
/// failures with exponential backoff.
pub struct ClaudeClient {
    http_client: ReqwestClient,
    base_url: String,
    rate_limiter: TokenBucketRateLimiter,
    retry_policy: RetryPolicy,
    models: ModelsConfig,
}

impl ClaudeClient {
    /// Build the HTTP client.
    pub fn new(config: ClaudeClientConfig) -> Result<Self, ClaudeApiError> {
        info!(
            "Initializing Claude API client: base_url={}, rate_limit={} rps, timeout={}s, api_key={}",
            config.base_url,
            config.rate_limit_rps,
            config.timeout_secs,
            redact_key(&config.api_key)
        );

        let mut headers = header::HeaderMap::new();
        headers.insert(
            "x-api-key",
            header::HeaderValue::from_str(&config.api_key)
                .map_err(|e| ClaudeApiError::InvalidRequest(format!("Invalid API key: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .timeout(Duration::from_secs(config.timeout_secs))
            .tcp_nodelay(true)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter: TokenBucketRateLimiter::new(config.rate_limit_rps),
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
            models: config.models,
        })
    }

    /// Concrete model id for an alias.
    pub fn model_id(&self, alias: ModelAlias) -> &str {
        match alias {
            ModelAlias::Haiku => &self.models.haiku,
            ModelAlias::Sonnet => &self.models.sonnet,
            ModelAlias::Opus => &self.models.opus,
        }
    }

    /// Send a message request, rate limited and retried.
    #[instrument(skip(self, request), fields(model = %request.model, max_tokens = request.max_tokens))]
    pub async fn send_message(
        &self,
        request: MessageRequest,
    ) -> Result<MessageResponse, ClaudeApiError> {
        self.rate_limiter.acquire().await;

        let result = self
            .retry_policy
            .execute(|| self.execute_message_request(&request))
            .await;

        match &result {
            Ok(response) => info!(
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "Message request succeeded"
            ),
            Err(err) => warn!(error = %err, "Message request failed"),
        }
        result
    }

    async fn execute_message_request(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ClaudeApiError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClaudeApiError::Timeout
                } else {
                    ClaudeApiError::NetworkError(e)
                }
            })?;

        Self::handle_response(response).await
    }

    async fn handle_response(response: Response) -> Result<MessageResponse, ClaudeApiError> {
        let status = response.status();
        debug!("Response status: {}", status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            warn!("API error ({}): {}", status, body);
            return Err(ClaudeApiError::from_status(status, body));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl LlmClient for ClaudeClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let system = (!request.system.is_empty()).then_some(request.system);
        let mut message = MessageRequest::simple(
            self.model_id(request.model),
            system,
            request.prompt,
            request.max_tokens,
        );
        message.temperature = Some(request.temperature);

        let response = self.send_message(message).await?;
        let text = response.text();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(Completion {
            text,
            model: response.model,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}

fn redact_key(key: &str) -> String {
    match key.get(..8) {
        Some(prefix) if key.len() > 12 => format!("{prefix}...[REDACTED]"),
        _ => "[REDACTED]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClaudeClientConfig {
        ClaudeClientConfig {
            api_key: "test-api-key".to_string(),
            base_url: "https://api.test.com/".to_string(),
            rate_limit_rps: 5.0,
            max_retries: 2,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60000,
            timeout_secs: 120,
            models: ModelsConfig::default(),
        }
    }

    #[test]
    fn test_client_creation() {
        let client = ClaudeClient::new(config()).unwrap();
        assert_eq!(client.base_url, "https://api.test.com");
        assert_eq!(client.model_id(ModelAlias::Haiku), "claude-haiku-4-5");
    }

    #[test]
    fn test_invalid_header_value_is_rejected() {
        let mut cfg = config();
        cfg.api_key = "bad\nkey".to_string();
        assert!(matches!(
            ClaudeClient::new(cfg),
            Err(ClaudeApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_config_requires_api_key() {
        temp_env::with_var("ANTHROPIC_API_KEY", None::<&str>, || {
            let err = ClaudeClientConfig::from_settings(&ClaudeConfig::default()).unwrap_err();
            assert!(matches!(err, LlmError::NotConfigured(_)));
        });
        temp_env::with_var("ANTHROPIC_API_KEY", Some("sk-env"), || {
            let cfg = ClaudeClientConfig::from_settings(&ClaudeConfig::default()).unwrap();
            assert_eq!(cfg.api_key, "sk-env");
        });
    }

    #[test]
    fn test_api_key_redaction() {
        assert_eq!(redact_key("sk-ant-api03-verylongkey"), "sk-ant-a...[REDACTED]");
        assert_eq!(redact_key("short"), "[REDACTED]");
    }
}
