//! Platform collaborators used by the relay: reply delivery and content retrieval.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

/// Failure talking to the messaging platform (reply delivery or content fetch).
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("platform api error: {status} {body}")]
    Api { status: u16, body: String },
}

/// Chunked content body as returned by [`ContentSource::fetch_content`].
pub type ContentStream = BoxStream<'static, Result<Bytes, PlatformError>>;

/// Sends a finished reply for an inbound event.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, reply_token: &str, text: &str) -> Result<(), PlatformError>;
}

/// Resolves a content id (e.g. an image message id) to a byte stream.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_content(&self, content_id: &str) -> Result<ContentStream, PlatformError>;
}
