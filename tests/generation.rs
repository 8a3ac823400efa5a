//! Gemini client integration tests
//!
//! Runs the client against an in-process HTTP server standing in for the
//! `generateContent` endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use secrecy::SecretString;
use serde_json::Value;
use speechbot::config::GenerationConfig;
use speechbot::{GeminiClient, GenerationError, TextGenerator};

const OK_BODY: &str =
    r#"{"candidates":[{"content":{"parts":[{"text":"Hi there"}],"role":"model"}}]}"#;

#[derive(Clone)]
struct FakeGemini {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
    seen: Arc<Mutex<Vec<(Uri, String)>>>,
}

async fn respond(State(server): State<FakeGemini>, uri: Uri, body: String) -> (StatusCode, String) {
    server.seen.lock().unwrap().push((uri, body));
    if !server.delay.is_zero() {
        tokio::time::sleep(server.delay).await;
    }
    (server.status, server.body.to_string())
}

/// Start a server answering every request with `status` and `body`
async fn serve(
    status: StatusCode,
    body: &'static str,
    delay: Duration,
) -> (GenerationConfig, FakeGemini) {
    let server = FakeGemini {
        status,
        body,
        delay,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new().fallback(respond).with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = GenerationConfig {
        base_url: format!("http://{addr}/v1beta/models"),
        model: "gemini-1.5-flash".to_string(),
    };
    (config, server)
}

fn client(config: &GenerationConfig) -> GeminiClient {
    GeminiClient::new(SecretString::from("test-key"), config).unwrap()
}

async fn generate_with(status: StatusCode, body: &'static str) -> Result<String, GenerationError> {
    let (config, _server) = serve(status, body, Duration::ZERO).await;
    client(&config).generate("hello").await
}

#[tokio::test]
async fn test_successful_reply() {
    let (config, server) = serve(StatusCode::OK, OK_BODY, Duration::ZERO).await;

    let reply = client(&config).generate("hello").await;
    assert_eq!(reply, Ok("Hi there".to_string()));

    let seen = server.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (uri, body) = &seen[0];
    assert_eq!(uri.path(), "/v1beta/models/gemini-1.5-flash:generateContent");
    assert_eq!(uri.query(), Some("key=test-key"));

    let json: Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
}

#[tokio::test]
async fn test_rejected_credentials() {
    let body = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
    assert_eq!(
        generate_with(StatusCode::UNAUTHORIZED, body).await,
        Err(GenerationError::Authentication)
    );
    assert_eq!(
        generate_with(StatusCode::FORBIDDEN, body).await,
        Err(GenerationError::Authentication)
    );
}

#[tokio::test]
async fn test_provider_throttling() {
    assert_eq!(
        generate_with(StatusCode::TOO_MANY_REQUESTS, "{}").await,
        Err(GenerationError::RateLimitExceeded)
    );
}

#[tokio::test]
async fn test_server_error_carries_message() {
    let body = r#"{"error":{"code":500,"message":"Internal error encountered."}}"#;
    assert_eq!(
        generate_with(StatusCode::INTERNAL_SERVER_ERROR, body).await,
        Err(GenerationError::Provider {
            message: "Internal error encountered.".to_string(),
            status: 500,
        })
    );
}

#[tokio::test]
async fn test_error_field_with_ok_status() {
    let body = r#"{"error":{"message":"quota exhausted"}}"#;
    assert_eq!(
        generate_with(StatusCode::OK, body).await,
        Err(GenerationError::Provider {
            message: "quota exhausted".to_string(),
            status: 200,
        })
    );
}

#[tokio::test]
async fn test_blocked_reply_has_no_content() {
    let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
    assert_eq!(
        generate_with(StatusCode::OK, body).await,
        Err(GenerationError::NoContent)
    );
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let (config, _server) = serve(StatusCode::OK, OK_BODY, Duration::from_secs(5)).await;
    let client = GeminiClient::with_timeout(
        SecretString::from("test-key"),
        &config,
        Duration::from_millis(100),
    )
    .unwrap();

    assert_eq!(client.generate("hello").await, Err(GenerationError::Timeout));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = GenerationConfig {
        base_url: format!("http://{addr}/v1beta/models"),
        model: "gemini-1.5-flash".to_string(),
    };

    match client(&config).generate("hello").await {
        Err(GenerationError::Network(message)) => assert!(!message.contains("test-key")),
        other => panic!("expected network error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_prompt_sends_nothing() {
    let (config, server) = serve(StatusCode::OK, OK_BODY, Duration::ZERO).await;

    assert_eq!(
        client(&config).generate("").await,
        Err(GenerationError::EmptyPrompt)
    );
    assert!(server.seen.lock().unwrap().is_empty());
}
