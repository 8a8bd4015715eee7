//! Chat-completion backend: request types and the HTTP client.
//!
//! Targets OpenAI-compatible `chat/completions` endpoints (InternLM by default). One attempt per
//! call; failures come back as a typed [`BackendResult`], never as a panic or a bare error string.

mod chat;
mod client;

pub use chat::{
    BackendRequest, ChatMessage, ContentPart, ImageUrl, MessageContent, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_P,
};
pub use client::{BackendResult, ChatBackend, ChatCompletionClient, MALFORMED_RESPONSE_STATUS};
