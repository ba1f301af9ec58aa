//! HTTP description client against a mock chat-completion server

use optica::describe::{DescriptionClient, DescriptionConfig, DescriptionError, HttpDescriptionClient};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn client_for(server: &MockServer) -> HttpDescriptionClient {
    let config = DescriptionConfig::new(server.uri())
        .with_api_key("test-key")
        .with_timeout(Some(Duration::from_secs(5)));
    HttpDescriptionClient::new(config).unwrap()
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            {
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }
        ]
    })
}

#[tokio::test]
async fn test_posts_chat_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "test-key"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "temperature": 1.0,
            "model": "MeghanaM4/Optica",
            "stream": false,
            "max_tokens": 50
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("A cup rests on a chair.")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let text = client.describe(r#"["cup","chair"]"#).await.unwrap();
    assert_eq!(text, "A cup rests on a chair.");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], r#"["cup","chair"]"#);
}

#[tokio::test]
async fn test_missing_choices_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "overloaded" })))
        .mount(&server)
        .await;

    let err = client_for(&server).describe(r#"["cup"]"#).await.unwrap_err();
    assert!(matches!(err, DescriptionError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_null_content_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": null } }]
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).describe(r#"["cup"]"#).await.unwrap_err();
    assert!(matches!(err, DescriptionError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_error_status_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .mount(&server)
        .await;

    let err = client_for(&server).describe(r#"["cup"]"#).await.unwrap_err();
    assert_eq!(
        err,
        DescriptionError::Status {
            status: 401,
            body: "invalid key".into()
        }
    );
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = DescriptionConfig::new(server.uri())
        .with_api_key("test-key")
        .with_timeout(Some(Duration::from_secs(1)));
    let client = HttpDescriptionClient::new(config).unwrap();

    let err = client.describe(r#"["cup"]"#).await.unwrap_err();
    assert!(matches!(err, DescriptionError::Transport(_)));
}
