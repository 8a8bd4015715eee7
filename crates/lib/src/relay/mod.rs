//! The relay pipeline: one inbound event in, exactly one reply out.
//!
//! Text events go straight to the backend. Image events are acquired into a scoped temp file,
//! run through the deployed extraction strategy, and then either answered directly (no text
//! recognized) or sent to the backend. Every failure becomes a reply string.

mod acquire;
mod dispatch;
mod reply;
mod request;

pub use acquire::{acquire, AcquisitionError, ScopedImage};
pub use dispatch::{DispatchOutcome, Dispatcher, Route};
pub use reply::{
    reply_text, ACQUISITION_FAILURE_REPLY, EMPTY_REPLY_FALLBACK, ERROR_BODY_EXCERPT_CHARS,
    EXTRACTION_FAILURE_REPLY,
};
pub use request::{build_request, RequestInput, RECOGNIZED_TEXT_LABEL};
