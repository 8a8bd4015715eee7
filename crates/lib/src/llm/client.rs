//! HTTP client for the chat-completion backend.

use crate::config::BackendSettings;
use crate::llm::chat::BackendRequest;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

/// Status carried by [`BackendResult::ApplicationError`] when the backend answered 200 with a
/// body that has no `choices[0].message.content` string.
pub const MALFORMED_RESPONSE_STATUS: u16 = 0;

/// Outcome of one backend call. Produced once per request and never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendResult {
    Success(String),
    /// Non-200 status, or a malformed 200 body ([`MALFORMED_RESPONSE_STATUS`]). `body` is verbatim.
    ApplicationError { status: u16, body: String },
    /// Connection, DNS, timeout, or body read failure.
    TransportError(String),
}

/// Anything that can answer a [`BackendRequest`].
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn invoke(&self, request: &BackendRequest) -> BackendResult;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Option<Vec<CompletionChoice>>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Extract `choices[0].message.content` from a 200 body.
fn parse_completion(body: String) -> BackendResult {
    let content = serde_json::from_str::<CompletionResponse>(&body)
        .ok()
        .and_then(|r| r.choices)
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content);
    match content {
        Some(text) => BackendResult::Success(text),
        None => {
            log::warn!("backend: 200 response without choices[0].message.content");
            BackendResult::ApplicationError {
                status: MALFORMED_RESPONSE_STATUS,
                body,
            }
        }
    }
}

/// Client for an OpenAI-compatible `chat/completions` endpoint with bearer auth.
#[derive(Clone)]
pub struct ChatCompletionClient {
    endpoint: String,
    api_token: String,
    client: reqwest::Client,
}

impl ChatCompletionClient {
    /// Build a client whose every request is bounded by `settings.timeout`.
    pub fn new(settings: &BackendSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            endpoint: settings.endpoint.clone(),
            api_token: settings.api_token.clone(),
            client,
        })
    }

    /// POST the request once and classify the outcome.
    pub async fn complete(&self, request: &BackendRequest) -> BackendResult {
        if log::log_enabled!(log::Level::Debug) {
            match serde_json::to_string(request) {
                Ok(payload) => log::debug!("backend: payload {}", payload),
                Err(e) => log::debug!("backend: payload not serializable: {}", e),
            }
        }
        let res = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                log::warn!("backend: request failed: {}", e);
                return BackendResult::TransportError(e.to_string());
            }
        };
        let status = res.status();
        let body = match res.text().await {
            Ok(b) => b,
            Err(e) => {
                log::warn!("backend: reading response body failed: {}", e);
                return BackendResult::TransportError(e.to_string());
            }
        };
        if status != StatusCode::OK {
            log::warn!("backend: status {}: {}", status, body);
            return BackendResult::ApplicationError {
                status: status.as_u16(),
                body,
            };
        }
        parse_completion(body)
    }
}

#[async_trait]
impl ChatBackend for ChatCompletionClient {
    async fn invoke(&self, request: &BackendRequest) -> BackendResult {
        self.complete(request).await
    }
}
