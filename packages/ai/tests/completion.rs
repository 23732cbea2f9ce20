// ABOUTME: HTTP-level tests for the completion client against a mock Anthropic API
// ABOUTME: Covers headers, quota fallback, error mapping and JSON structure checks

use draftly_ai::{CompletionClient, CompletionError, Usage};
use draftly_config::AiSettings;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRIMARY: &str = "primary-model";
const FALLBACK: &str = "fallback-model";

fn settings(server: &MockServer) -> AiSettings {
    AiSettings {
        api_key: Some("test-key".to_string()),
        api_url: format!("{}/v1/messages", server.uri()),
        primary_model: PRIMARY.to_string(),
        fallback_model: FALLBACK.to_string(),
        max_tokens: 1024,
    }
}

fn message_body(model: &str, text: &str) -> Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 10, "output_tokens": 20 }
    })
}

#[tokio::test]
async fn test_complete_sends_anthropic_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": PRIMARY,
            "max_tokens": 1024,
            "system": "be terse",
            "messages": [{ "role": "user", "content": "build it" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_body(PRIMARY, r#"{"a":1}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let client = CompletionClient::new(settings(&server));
    let completion = client.complete("build it", Some("be terse")).await.unwrap();

    assert_eq!(completion.text, r#"{"a":1}"#);
    assert_eq!(completion.model, PRIMARY);
    assert_eq!(
        completion.usage,
        Usage {
            input_tokens: 10,
            output_tokens: 20
        }
    );
}

#[tokio::test]
async fn test_rate_limited_primary_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "model": PRIMARY })))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "model": FALLBACK })))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_body(FALLBACK, "{}")))
        .expect(1)
        .mount(&server)
        .await;

    let client = CompletionClient::new(settings(&server));
    let completion = client.complete("build it", None).await.unwrap();

    assert_eq!(completion.model, FALLBACK);
}

#[tokio::test]
async fn test_quota_message_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "model": PRIMARY })))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("You exceeded your current quota"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "model": FALLBACK })))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_body(FALLBACK, "{}")))
        .mount(&server)
        .await;

    let client = CompletionClient::new(settings(&server));

    assert_eq!(client.complete("x", None).await.unwrap().model, FALLBACK);
}

#[tokio::test]
async fn test_server_error_does_not_fall_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "model": PRIMARY })))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "model": FALLBACK })))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_body(FALLBACK, "{}")))
        .expect(0)
        .mount(&server)
        .await;

    let client = CompletionClient::new(settings(&server));
    let err = client.complete("x", None).await.unwrap_err();

    match err {
        CompletionError::ApiError { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "internal error");
        }
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_response_without_braces_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(message_body(PRIMARY, "Sorry, I can't help with that.")),
        )
        .mount(&server)
        .await;

    let client = CompletionClient::new(settings(&server));
    let err = client.complete("x", None).await.unwrap_err();

    assert!(matches!(err, CompletionError::NoJsonStructure));
}

#[tokio::test]
async fn test_missing_api_key_fails_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut settings = settings(&server);
    settings.api_key = None;
    let client = CompletionClient::new(settings);

    assert!(matches!(
        client.complete("x", None).await,
        Err(CompletionError::NoApiKey)
    ));
}
