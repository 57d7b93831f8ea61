use agent_clients::retrieval::client::{CRA_BASE_URL_ENV, CRA_REPOSITORY_ID_ENV};
use agent_clients::{RetrievalClient, RetrievalError};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_retrieve_returns_context_snippets() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/context/retrieve"))
        .and(body_json(json!({
            "query": "find auth logic",
            "max_refined_query_loop": 2,
            "repository_id": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "contexts": [{
                    "relative_path": "auth.py",
                    "content": "def check_password(user, password): ...",
                    "start_line_number": 10,
                    "end_line_number": 20
                }],
                "total_contexts": 1
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RetrievalClient::new()
        .with_base_url(server.uri())
        .with_repository_id(1);
    let result = client.retrieve("find auth logic", 2).await.unwrap();

    assert_eq!(result.total_contexts, 1);
    assert_eq!(result.contexts.len(), 1);
    let snippet = &result.contexts[0];
    assert_eq!(snippet.relative_path, "auth.py");
    assert_eq!(snippet.start_line, 10);
    assert_eq!(snippet.end_line, 20);
    assert!(snippet.content.contains("check_password"));
}

#[tokio::test]
async fn test_remote_error_message_is_extracted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/context/retrieve"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "retrieval agent crashed"})),
        )
        .mount(&server)
        .await;

    let client = RetrievalClient::new()
        .with_base_url(server.uri())
        .with_repository_id(1);
    let err = client.retrieve("anything", 3).await.unwrap_err();

    match err {
        RetrievalError::Remote { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "retrieval agent crashed");
        }
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_envelope_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/context/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let client = RetrievalClient::new()
        .with_base_url(server.uri())
        .with_repository_id(1);
    let err = client.retrieve("anything", 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::MalformedResponse(_)));
}

// All environment-dependent scenarios live in a single test so parallel
// tests in this file never race on the same variables.
#[tokio::test]
async fn test_settings_resolved_lazily_from_environment() {
    unsafe {
        std::env::remove_var(CRA_BASE_URL_ENV);
        std::env::remove_var(CRA_REPOSITORY_ID_ENV);
    }
    let client = RetrievalClient::new();

    // Missing base URL fails before any network call (there is no server).
    let err = client.retrieve("query", 3).await.unwrap_err();
    match err {
        RetrievalError::ConfigurationMissing(var) => assert_eq!(var, CRA_BASE_URL_ENV),
        other => panic!("expected ConfigurationMissing, got {other:?}"),
    }

    // Base URL present but repository id missing: still no network call.
    let client_with_url = RetrievalClient::new().with_base_url("http://127.0.0.1:9");
    let err = client_with_url.retrieve("query", 3).await.unwrap_err();
    match err {
        RetrievalError::ConfigurationMissing(var) => assert_eq!(var, CRA_REPOSITORY_ID_ENV),
        other => panic!("expected ConfigurationMissing, got {other:?}"),
    }

    // A non-numeric repository id is rejected, also before any network call.
    unsafe {
        std::env::set_var(CRA_REPOSITORY_ID_ENV, "not-a-number");
    }
    let err = client_with_url.retrieve("query", 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidConfiguration { .. }));

    // Late configuration takes effect: the same client instance succeeds
    // once the environment is populated.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/context/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"contexts": [], "total_contexts": 0}
        })))
        .mount(&server)
        .await;
    unsafe {
        std::env::set_var(CRA_BASE_URL_ENV, server.uri());
        std::env::set_var(CRA_REPOSITORY_ID_ENV, "7");
    }

    let result = client.retrieve("query", 3).await.unwrap();
    assert_eq!(result.total_contexts, 0);

    unsafe {
        std::env::remove_var(CRA_BASE_URL_ENV);
        std::env::remove_var(CRA_REPOSITORY_ID_ENV);
    }
}
