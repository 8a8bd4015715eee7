//! Inbound event from the channel: delivered to the relay for one reply.

/// A verified user message to be answered once, through its reply token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub reply_token: String,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Text(TextPayload),
    Image(ImageHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPayload {
    pub text: String,
}

/// Reference to image content held by the platform. Carries no bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    pub content_id: String,
}

impl InboundEvent {
    pub fn text(reply_token: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            reply_token: reply_token.into(),
            payload: EventPayload::Text(TextPayload { text: text.into() }),
        }
    }

    pub fn image(reply_token: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            reply_token: reply_token.into(),
            payload: EventPayload::Image(ImageHandle {
                content_id: content_id.into(),
            }),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Text(_) => EventKind::Text,
            EventPayload::Image(_) => EventKind::Image,
        }
    }
}
