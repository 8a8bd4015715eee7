//! LINE channel: webhook signature verification and parsing, Reply API, and message content API.

use crate::channels::inbound::InboundEvent;
use crate::channels::sink::{ContentSource, ContentStream, PlatformError, ReplySink};
use crate::config::LineSettings;
use async_trait::async_trait;
use base64::Engine;
use futures_util::{StreamExt, TryStreamExt};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

/// Maximum characters in one LINE text message.
pub const LINE_TEXT_LIMIT: usize = 5000;

/// Webhook body rejected before any processing.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing X-Line-Signature header")]
    Missing,
    #[error("signature does not match body")]
    Mismatch,
    #[error("malformed webhook body: {0}")]
    Body(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookEvent {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    message: Option<WebhookMessage>,
}

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    text: Option<String>,
}

/// Check `signature` (base64 HMAC-SHA256 of the raw body keyed by the channel secret).
pub fn verify_signature(
    body: &[u8],
    signature: Option<&str>,
    channel_secret: &str,
) -> Result<(), SignatureError> {
    let signature = signature
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(SignatureError::Missing)?;
    let expected = base64::engine::general_purpose::STANDARD
        .decode(signature.as_bytes())
        .map_err(|_| SignatureError::Mismatch)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes())
        .map_err(|_| SignatureError::Mismatch)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Verify the webhook signature, then parse the body into inbound events.
/// Only `message` events carrying text or image messages with a reply token are returned.
pub fn verify_and_parse(
    body: &[u8],
    signature: Option<&str>,
    channel_secret: &str,
) -> Result<Vec<InboundEvent>, SignatureError> {
    verify_signature(body, signature, channel_secret)?;
    let webhook: WebhookBody = serde_json::from_slice(body)?;
    let events = webhook
        .events
        .into_iter()
        .filter_map(|ev| {
            if ev.typ != "message" {
                log::debug!("line: ignoring {} event", ev.typ);
                return None;
            }
            let reply_token = ev.reply_token.filter(|t| !t.is_empty())?;
            let msg = ev.message?;
            match msg.typ.as_str() {
                "text" => Some(InboundEvent::text(reply_token, msg.text.unwrap_or_default())),
                "image" => Some(InboundEvent::image(reply_token, msg.id)),
                other => {
                    log::debug!("line: ignoring {} message", other);
                    None
                }
            }
        })
        .collect();
    Ok(events)
}

/// Cut `text` to at most `limit` characters.
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// LINE Messaging API client: replies via the Reply API and streams message content.
pub struct LineChannel {
    access_token: String,
    api_base: String,
    data_api_base: String,
    client: reqwest::Client,
}

impl LineChannel {
    pub fn new(settings: &LineSettings) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .build()?;
        Ok(Self {
            access_token: settings.channel_access_token.clone(),
            api_base: settings.api_base.clone(),
            data_api_base: settings.data_api_base.clone(),
            client,
        })
    }

    /// POST /v2/bot/message/reply with a single text message.
    pub async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), PlatformError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let text = truncate_chars(text, LINE_TEXT_LIMIT);
        let body = serde_json::json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": text }],
        });
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(PlatformError::Api { status, body });
        }
        Ok(())
    }

    /// GET /v2/bot/message/{id}/content on the data API host, streamed.
    pub async fn content(&self, message_id: &str) -> Result<ContentStream, PlatformError> {
        let url = format!("{}/v2/bot/message/{}/content", self.data_api_base, message_id);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(PlatformError::Api { status, body });
        }
        Ok(res.bytes_stream().map_err(PlatformError::Request).boxed())
    }
}

#[async_trait]
impl ReplySink for LineChannel {
    async fn send(&self, reply_token: &str, text: &str) -> Result<(), PlatformError> {
        self.reply_text(reply_token, text).await
    }
}

#[async_trait]
impl ContentSource for LineChannel {
    async fn fetch_content(&self, content_id: &str) -> Result<ContentStream, PlatformError> {
        self.content(content_id).await
    }
}
