//! Integration test: run the gateway on a free port with LINE and the backend replaced by an axum
//! stub, POST signed webhooks, and check the replies that reach the stub's Reply API.
//! The gateway task is left running when each test ends.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use hmac::{Hmac, Mac};
use linebridge::config::{Config, ExtractionStrategyKind, RelaySettings};
use linebridge::gateway::{self, HEALTH_TEXT};
use serde_json::{json, Value};
use sha2::Sha256;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SECRET: &str = "channel-secret";

#[derive(Clone, Default)]
struct Recorded {
    replies: Arc<Mutex<Vec<Value>>>,
    completions: Arc<Mutex<Vec<Value>>>,
}

async fn reply_api(State(rec): State<Recorded>, Json(body): Json<Value>) -> StatusCode {
    rec.replies.lock().unwrap().push(body);
    StatusCode::OK
}

async fn content_api(Path(id): Path<String>) -> (StatusCode, Vec<u8>) {
    if id == "missing" {
        return (StatusCode::NOT_FOUND, b"{}".to_vec());
    }
    (StatusCode::OK, b"\xff\xd8\xff\xe0 fake jpeg".to_vec())
}

async fn completions_api(State(rec): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    let answer = match &body["messages"][0]["content"] {
        Value::String(s) => format!("echo: {}", s),
        Value::Array(parts) => format!("saw {} parts", parts.len()),
        _ => "?".to_string(),
    };
    rec.completions.lock().unwrap().push(body);
    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": answer } }] }))
}

async fn start_stub(rec: Recorded) -> SocketAddr {
    let app = Router::new()
        .route("/v2/bot/message/reply", post(reply_api))
        .route("/v2/bot/message/:id/content", get(content_api))
        .route("/chat/completions", post(completions_api))
        .with_state(rec);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).expect("hmac key");
    mac.update(body);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Start the gateway pointed at the stub; returns its base URL once `GET /` answers.
async fn start_gateway(stub: SocketAddr, strategy: ExtractionStrategyKind) -> String {
    let port = free_port();
    let mut config = Config::default();
    config.gateway.bind = "127.0.0.1".to_string();
    config.gateway.port = port;
    config.channels.line.api_base = format!("http://{}", stub);
    config.channels.line.data_api_base = format!("http://{}", stub);
    config.backend.endpoint = format!("http://{}/chat/completions", stub);
    config.vision.strategy = strategy;
    let settings = RelaySettings::with_secrets(
        &config,
        SECRET.to_string(),
        "access-token".to_string(),
        "backend-token".to_string(),
    )
    .expect("settings");
    tokio::spawn(async move {
        let _ = gateway::run_gateway(config, settings).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(resp) = client.get(format!("{}/", base)).send().await {
            if resp.status().is_success() {
                assert_eq!(resp.text().await.expect("health body"), HEALTH_TEXT);
                return base;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway on {} did not come up within 5s", base);
}

async fn wait_for_replies(rec: &Recorded, n: usize) -> Vec<Value> {
    for _ in 0..100 {
        {
            let replies = rec.replies.lock().unwrap();
            if replies.len() >= n {
                return replies.clone();
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("expected {} replies within 5s", n);
}

async fn post_webhook(base: &str, body: &Value, signature: Option<String>) -> reqwest::Response {
    let raw = serde_json::to_vec(body).expect("serialize webhook");
    let mut req = reqwest::Client::new()
        .post(format!("{}/callback", base))
        .header("content-type", "application/json")
        .body(raw.clone());
    if let Some(sig) = signature.or_else(|| Some(sign(&raw))).filter(|s| !s.is_empty()) {
        req = req.header("X-Line-Signature", sig);
    }
    req.send().await.expect("post webhook")
}

#[tokio::test]
async fn text_and_image_events_each_get_one_reply() {
    let rec = Recorded::default();
    let stub = start_stub(rec.clone()).await;
    let base = start_gateway(stub, ExtractionStrategyKind::RemoteDescribe).await;

    let body = json!({
        "destination": "U123",
        "events": [
            { "type": "message", "replyToken": "tok-text",
              "message": { "type": "text", "id": "1", "text": "你好" } },
            { "type": "message", "replyToken": "tok-image",
              "message": { "type": "image", "id": "2" } },
            { "type": "follow", "replyToken": "tok-follow" }
        ]
    });
    let resp = post_webhook(&base, &body, None).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let replies = wait_for_replies(&rec, 2).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(rec.replies.lock().unwrap().len(), 2);

    let text_for = |token: &str| -> String {
        let reply = replies
            .iter()
            .find(|r| r["replyToken"] == token)
            .unwrap_or_else(|| panic!("no reply for {}", token));
        assert_eq!(reply["messages"][0]["type"], "text");
        reply["messages"][0]["text"].as_str().unwrap_or("").to_string()
    };
    assert_eq!(text_for("tok-text"), "echo: 你好");
    assert_eq!(text_for("tok-image"), "saw 2 parts");

    let completions = rec.completions.lock().unwrap();
    let image_req = completions
        .iter()
        .find(|c| c["messages"][0]["content"].is_array())
        .expect("multimodal request");
    let url = image_req["messages"][0]["content"][1]["image_url"]["url"]
        .as_str()
        .unwrap();
    assert!(url.starts_with("data:image/jpeg;base64,"));
    assert_eq!(image_req["model"], "internlm3-latest");
}

#[tokio::test]
async fn missing_image_content_still_replies_once() {
    let rec = Recorded::default();
    let stub = start_stub(rec.clone()).await;
    let base = start_gateway(stub, ExtractionStrategyKind::RemoteDescribe).await;

    let body = json!({
        "events": [
            { "type": "message", "replyToken": "tok",
              "message": { "type": "image", "id": "missing" } }
        ]
    });
    assert_eq!(post_webhook(&base, &body, None).await.status(), 200);
    let replies = wait_for_replies(&rec, 1).await;
    assert_eq!(replies[0]["replyToken"], "tok");
    assert_eq!(
        replies[0]["messages"][0]["text"],
        linebridge::relay::ACQUISITION_FAILURE_REPLY
    );
    assert!(rec.completions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bad_or_missing_signature_is_rejected() {
    let rec = Recorded::default();
    let stub = start_stub(rec.clone()).await;
    let base = start_gateway(stub, ExtractionStrategyKind::LocalOcr).await;

    let body = json!({
        "events": [
            { "type": "message", "replyToken": "tok",
              "message": { "type": "text", "id": "1", "text": "hi" } }
        ]
    });
    let resp = post_webhook(&base, &body, Some(sign(b"something else"))).await;
    assert_eq!(resp.status(), 400);
    let resp = post_webhook(&base, &body, Some(String::new())).await;
    assert_eq!(resp.status(), 400);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(rec.replies.lock().unwrap().is_empty());
    assert!(rec.completions.lock().unwrap().is_empty());
}
