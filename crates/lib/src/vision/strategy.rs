//! Image text extraction: local OCR or an inline image for a multimodal backend.

use crate::config::{ExtractionStrategyKind, VisionSettings};
use crate::relay::ScopedImage;
use crate::vision::ocr::OcrEngine;
use base64::Engine;
use std::time::Duration;

/// Reply sent when local OCR finds no text in the image. Terminal: the backend is not called.
pub const NO_TEXT_RECOGNIZED: &str = "圖片中沒有辨識到文字。";

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("failed to start recognizer {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("recognizer timed out after {0:?}")]
    Timeout(Duration),
    #[error("recognizer exited with {code:?}: {stderr}")]
    Recognizer { code: Option<i32>, stderr: String },
    #[error("reading image failed: {0}")]
    Read(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// OCR text to be sent as a plain prompt.
    PlainText,
    /// Prompt plus inline image for a multimodal model.
    MultimodalText,
    /// OCR found nothing; `text` is [`NO_TEXT_RECOGNIZED`].
    NoText,
}

/// What an image turned into. Built per event and consumed once by the request builder.
/// Only the constructors below create one, so `image_data_ref` is set exactly when the kind is
/// [`ContentKind::MultimodalText`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    kind: ContentKind,
    text: String,
    image_data_ref: Option<String>,
}

impl ExtractedContent {
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::PlainText,
            text: text.into(),
            image_data_ref: None,
        }
    }

    pub fn multimodal(prompt: impl Into<String>, image_data_ref: String) -> Self {
        Self {
            kind: ContentKind::MultimodalText,
            text: prompt.into(),
            image_data_ref: Some(image_data_ref),
        }
    }

    pub fn no_text() -> Self {
        Self {
            kind: ContentKind::NoText,
            text: NO_TEXT_RECOGNIZED.to_string(),
            image_data_ref: None,
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// `data:image/jpeg;base64,...` reference, for [`ContentKind::MultimodalText`] only.
    pub fn image_data_ref(&self) -> Option<&str> {
        self.image_data_ref.as_deref()
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// True when this content is itself the final reply.
    pub fn is_terminal(&self) -> bool {
        self.kind == ContentKind::NoText
    }
}

/// Inline data reference for JPEG bytes.
pub fn jpeg_data_ref(bytes: &[u8]) -> String {
    let mut out = String::from(DATA_URL_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(bytes, &mut out);
    out
}

/// The deployed image strategy. Chosen once from configuration.
#[derive(Debug, Clone)]
pub enum ExtractionStrategy {
    LocalOcr(OcrEngine),
    RemoteDescribe { prompt: String },
}

impl ExtractionStrategy {
    pub fn from_settings(settings: &VisionSettings) -> Self {
        match settings.strategy {
            ExtractionStrategyKind::LocalOcr => ExtractionStrategy::LocalOcr(OcrEngine::new(
                settings.ocr_command.clone(),
                settings.ocr_languages.clone(),
                settings.ocr_timeout,
            )),
            ExtractionStrategyKind::RemoteDescribe => ExtractionStrategy::RemoteDescribe {
                prompt: settings.describe_prompt.clone(),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtractionStrategy::LocalOcr(_) => "localOcr",
            ExtractionStrategy::RemoteDescribe { .. } => "remoteDescribe",
        }
    }

    pub async fn extract(&self, image: &ScopedImage) -> Result<ExtractedContent, ExtractionError> {
        match self {
            ExtractionStrategy::LocalOcr(engine) => {
                let lines = engine.recognize(image.path()).await?;
                if lines.is_empty() {
                    Ok(ExtractedContent::no_text())
                } else {
                    Ok(ExtractedContent::plain_text(lines.join("\n")))
                }
            }
            ExtractionStrategy::RemoteDescribe { prompt } => {
                let bytes = image.read().await?;
                Ok(ExtractedContent::multimodal(
                    prompt.clone(),
                    jpeg_data_ref(&bytes),
                ))
            }
        }
    }
}
