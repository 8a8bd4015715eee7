//! Turning an acquired image into backend input.
//!
//! Exactly one [`ExtractionStrategy`] is deployed: local OCR (text goes to the backend as a
//! plain prompt) or remote description (the image itself goes to a multimodal model).

mod ocr;
mod strategy;

pub use ocr::OcrEngine;
pub use strategy::{
    ContentKind, ExtractedContent, ExtractionError, ExtractionStrategy, NO_TEXT_RECOGNIZED,
};
