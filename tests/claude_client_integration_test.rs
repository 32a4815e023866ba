//! Claude HTTP client against a wiremock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use autofix::domain::models::ModelsConfig;
use autofix::domain::ports::{CompletionRequest, LlmClient, LlmError, ModelAlias};
use autofix::infrastructure::claude::{
    ClaudeApiError, ClaudeClient, ClaudeClientConfig, MessageRequest,
};

fn client_for(server: &MockServer, max_retries: u32) -> ClaudeClient {
    ClaudeClient::new(ClaudeClientConfig {
        api_key: "test-api-key".to_string(),
        base_url: server.uri(),
        rate_limit_rps: 100.0,
        max_retries,
        initial_backoff_ms: 10,
        max_backoff_ms: 100,
        timeout_secs: 10,
        models: ModelsConfig::default(),
    })
    .unwrap()
}

fn message_body(text: &str, model: &str) -> serde_json::Value {
    json!({
        "id": "msg_test123",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "model": model,
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 120, "output_tokens": 30}
    })
}

#[tokio::test]
async fn test_send_message_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-api-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(message_body("Hello!", "claude-haiku-4-5")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let response = client
        .send_message(MessageRequest::simple("claude-haiku-4-5", None, "Hi", 64))
        .await
        .unwrap();

    assert_eq!(response.id, "msg_test123");
    assert_eq!(response.text(), "Hello!");
    assert_eq!(response.usage.input_tokens, 120);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(message_body("ok", "claude-sonnet-4-5")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let response = client
        .send_message(MessageRequest::simple("claude-sonnet-4-5", None, "Hi", 64))
        .await
        .unwrap();

    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn test_invalid_key_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let err = client
        .send_message(MessageRequest::simple("claude-haiku-4-5", None, "Hi", 64))
        .await
        .unwrap_err();

    assert!(matches!(err, ClaudeApiError::InvalidApiKey));
}

#[tokio::test]
async fn test_complete_resolves_alias_and_reports_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({
            "model": "claude-sonnet-4-5",
            "system": "fix things",
            "max_tokens": 8192
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(message_body("{\"files\": []}", "claude-sonnet-4-5-20250929")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let completion = client
        .complete(CompletionRequest {
            model: ModelAlias::Sonnet,
            system: "fix things".to_string(),
            prompt: "error text".to_string(),
            max_tokens: 8192,
            temperature: 0.0,
        })
        .await
        .unwrap();

    assert_eq!(completion.text, "{\"files\": []}");
    assert_eq!(completion.model, "claude-sonnet-4-5-20250929");
    assert_eq!(completion.input_tokens, 120);
    assert_eq!(completion.output_tokens, 30);
}

#[tokio::test]
async fn test_blank_answer_is_an_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(message_body("  \n", "claude-haiku-4-5")),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let err = client
        .complete(CompletionRequest {
            model: ModelAlias::Haiku,
            system: String::new(),
            prompt: "error text".to_string(),
            max_tokens: 2048,
            temperature: 0.0,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, LlmError::EmptyResponse));
}
