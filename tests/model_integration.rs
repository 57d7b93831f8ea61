use agent_clients::model::{Message, ModelClient, ModelError};
use agent_clients::{ModelConfig, RetryConfig};
use serde_json::{Map, json};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_wait: Duration::from_millis(1),
        max_wait: Duration::from_millis(5),
    }
}

fn config_for(server: &MockServer, model: &str) -> ModelConfig {
    ModelConfig::new(model)
        .unwrap()
        .with_api_base_url(server.uri())
        .with_api_key_env("AGENT_CLIENTS_TEST_UNSET_KEY")
        .with_retry(fast_retry(10))
}

fn completion_body() -> serde_json::Value {
    json!({
        "id": "chatcmpl-xyz",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "finish_reason": "stop",
            "message": {"role": "assistant", "content": "All good."}
        }],
        "usage": {"prompt_tokens": 1000, "completion_tokens": 100, "total_tokens": 1100}
    })
}

#[tokio::test]
async fn test_query_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = ModelClient::new(config_for(&server, "gpt-4o")).unwrap();
    let result = client
        .query(&[Message::user("hi")], Map::new())
        .await
        .unwrap();

    assert_eq!(result.content, "All good.");
    assert_eq!(result.extra.response["id"], "chatcmpl-xyz");
    assert_eq!(client.n_calls(), 1);
    assert!((client.cost() - 0.0035).abs() < 1e-12);
}

#[tokio::test]
async fn test_transient_server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = ModelClient::new(config_for(&server, "gpt-4o")).unwrap();
    let result = client.query(&[Message::user("hi")], Map::new()).await;

    assert!(result.is_ok());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_authentication_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided.", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ModelClient::new(config_for(&server, "gpt-4o")).unwrap();
    let err = client
        .query(&[Message::user("hi")], Map::new())
        .await
        .unwrap_err();

    match err {
        ModelError::Authentication(message) => {
            assert!(message.contains("Incorrect API key"));
            // Credential guidance names the configured key variable.
            assert!(message.contains("AGENT_CLIENTS_TEST_UNSET_KEY"));
        }
        other => panic!("expected Authentication, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_model_not_found_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"message": "The model 'gpt-nonexistent' does not exist"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ModelClient::new(config_for(&server, "gpt-nonexistent")).unwrap();
    let err = client
        .query(&[Message::user("hi")], Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::NotFound(_)));
}

#[tokio::test]
async fn test_api_key_sent_as_bearer_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(1)
        .mount(&server)
        .await;

    // A test-unique variable name, so parallel tests in this file never
    // observe the mutation.
    unsafe {
        std::env::set_var("AGENT_CLIENTS_TEST_BEARER_KEY", "test-key-123");
    }
    let config = config_for(&server, "gpt-4o").with_api_key_env("AGENT_CLIENTS_TEST_BEARER_KEY");
    let client = ModelClient::new(config).unwrap();
    let result = client.query(&[Message::user("hi")], Map::new()).await;
    unsafe {
        std::env::remove_var("AGENT_CLIENTS_TEST_BEARER_KEY");
    }
    assert!(result.is_ok());
}
