//! Integration test: ChatCompletionClient against a stub backend served by axum on a local port.

use axum::{
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use linebridge::config::BackendSettings;
use linebridge::llm::{
    BackendRequest, BackendResult, ChatBackend, ChatCompletionClient, ChatMessage,
    MALFORMED_RESPONSE_STATUS,
};
use linebridge::relay::reply_text;
use std::net::SocketAddr;
use std::time::Duration;

const TOKEN: &str = "test-token";

async fn completions(headers: HeaderMap, Json(body): Json<serde_json::Value>) -> (StatusCode, String) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if auth != format!("Bearer {}", TOKEN) {
        return (StatusCode::UNAUTHORIZED, "bad token".to_string());
    }
    if body["temperature"] != 0.8 || body["top_p"] != 0.9 {
        return (StatusCode::BAD_REQUEST, format!("unexpected sampling: {}", body));
    }
    (
        StatusCode::OK,
        r#"{"choices":[{"message":{"content":"X"}}]}"#.to_string(),
    )
}

async fn start_stub() -> SocketAddr {
    let app = Router::new()
        .route("/ok", post(completions))
        .route(
            "/fail",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route("/garbage", post(|| async { (StatusCode::OK, "<html>oops</html>") }))
        .route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn client(endpoint: String, timeout: Duration) -> ChatCompletionClient {
    ChatCompletionClient::new(&BackendSettings {
        endpoint,
        api_token: TOKEN.to_string(),
        model: "internlm3-latest".to_string(),
        timeout,
    })
    .expect("build client")
}

fn request() -> BackendRequest {
    BackendRequest {
        model: "internlm3-latest".to_string(),
        messages: vec![ChatMessage::user("hello")],
        temperature: 0.8,
        top_p: 0.9,
    }
}

#[tokio::test]
async fn success_returns_first_choice_content() {
    let addr = start_stub().await;
    let c = client(format!("http://{}/ok", addr), Duration::from_secs(5));
    assert_eq!(c.invoke(&request()).await, BackendResult::Success("X".into()));
}

#[tokio::test]
async fn non_200_is_application_error_with_raw_body() {
    let addr = start_stub().await;
    let c = client(format!("http://{}/fail", addr), Duration::from_secs(5));
    let result = c.invoke(&request()).await;
    assert_eq!(
        result,
        BackendResult::ApplicationError {
            status: 500,
            body: "boom".into()
        }
    );
    let text = reply_text(&result);
    assert!(text.contains("500"));
    assert!(text.contains("boom"));
}

#[tokio::test]
async fn malformed_200_is_application_error() {
    let addr = start_stub().await;
    let c = client(format!("http://{}/garbage", addr), Duration::from_secs(5));
    assert_eq!(
        c.invoke(&request()).await,
        BackendResult::ApplicationError {
            status: MALFORMED_RESPONSE_STATUS,
            body: "<html>oops</html>".into()
        }
    );
}

#[tokio::test]
async fn timeout_is_transport_error() {
    let addr = start_stub().await;
    let c = client(format!("http://{}/slow", addr), Duration::from_millis(300));
    assert!(matches!(
        c.invoke(&request()).await,
        BackendResult::TransportError(_)
    ));
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    drop(listener);
    let c = client(format!("http://{}/ok", addr), Duration::from_secs(2));
    let result = c.invoke(&request()).await;
    assert!(matches!(result, BackendResult::TransportError(_)));
    assert!(!reply_text(&result).is_empty());
}
