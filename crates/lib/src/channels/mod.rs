//! Messaging platform channel (LINE).
//!
//! Inbound webhook payloads are verified and parsed into [`InboundEvent`]s; the relay answers
//! through the [`ReplySink`] and reads image bytes through the [`ContentSource`].

mod inbound;
mod line;
mod sink;

pub use inbound::{EventKind, EventPayload, ImageHandle, InboundEvent, TextPayload};
pub use line::{verify_and_parse, verify_signature, LineChannel, SignatureError, LINE_TEXT_LIMIT};
pub use sink::{ContentSource, ContentStream, PlatformError, ReplySink};
