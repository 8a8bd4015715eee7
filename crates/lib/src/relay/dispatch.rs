//! Event dispatch: route by event kind, run the pipeline, send exactly one reply.

use crate::channels::{ContentSource, EventPayload, ImageHandle, InboundEvent, ReplySink};
use crate::config::RelaySettings;
use crate::llm::{BackendResult, ChatBackend};
use crate::relay::acquire::acquire;
use crate::relay::reply::{reply_text, ACQUISITION_FAILURE_REPLY, EXTRACTION_FAILURE_REPLY};
use crate::relay::request::{build_request, RequestInput};
use crate::vision::ExtractionStrategy;
use std::path::PathBuf;
use std::sync::Arc;

/// Which branch produced the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Answered,
    ApplicationError,
    TransportError,
    /// OCR found no text; the sentinel was sent without calling the backend.
    NoText,
    AcquisitionFailed,
    ExtractionFailed,
}

impl From<&BackendResult> for Route {
    fn from(result: &BackendResult) -> Self {
        match result {
            BackendResult::Success(_) => Route::Answered,
            BackendResult::ApplicationError { .. } => Route::ApplicationError,
            BackendResult::TransportError(_) => Route::TransportError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub route: Route,
    /// False when the reply send itself failed (logged, not retried).
    pub delivered: bool,
}

/// Runs the relay for one event at a time; cheap to share across tasks behind an `Arc`.
pub struct Dispatcher {
    settings: Arc<RelaySettings>,
    strategy: ExtractionStrategy,
    backend: Arc<dyn ChatBackend>,
    sink: Arc<dyn ReplySink>,
    content: Arc<dyn ContentSource>,
    temp_dir: Option<PathBuf>,
}

impl Dispatcher {
    /// The extraction strategy is taken from `settings.vision`.
    pub fn new(
        settings: Arc<RelaySettings>,
        backend: Arc<dyn ChatBackend>,
        sink: Arc<dyn ReplySink>,
        content: Arc<dyn ContentSource>,
    ) -> Self {
        let strategy = ExtractionStrategy::from_settings(&settings.vision);
        Self {
            settings,
            strategy,
            backend,
            sink,
            content,
            temp_dir: None,
        }
    }

    /// Put downloaded images in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn strategy(&self) -> &ExtractionStrategy {
        &self.strategy
    }

    /// Handle one event to completion. Sends exactly one reply, whatever happens upstream.
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        let kind = event.kind();
        let (route, text) = match &event.payload {
            EventPayload::Text(payload) => {
                self.answer(RequestInput::Text(payload), &self.settings.backend.model)
                    .await
            }
            EventPayload::Image(handle) => self.answer_image(handle).await,
        };
        log::info!("relay: {:?} event handled via {:?}", kind, route);
        let delivered = match self.sink.send(&event.reply_token, &text).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("relay: reply delivery failed: {}", e);
                false
            }
        };
        DispatchOutcome { route, delivered }
    }

    async fn answer(&self, input: RequestInput<'_>, model: &str) -> (Route, String) {
        let request = build_request(input, model);
        let result = self.backend.invoke(&request).await;
        (Route::from(&result), reply_text(&result))
    }

    async fn answer_image(&self, handle: &ImageHandle) -> (Route, String) {
        let image = match acquire(self.content.as_ref(), handle, self.temp_dir.as_deref()).await {
            Ok(image) => image,
            Err(e) => {
                log::warn!("relay: image acquisition failed: {}", e);
                return (Route::AcquisitionFailed, ACQUISITION_FAILURE_REPLY.to_string());
            }
        };
        let extracted = self.strategy.extract(&image).await;
        // The temp file is not needed past extraction.
        drop(image);
        let extracted = match extracted {
            Ok(content) => content,
            Err(e) => {
                log::warn!("relay: {} extraction failed: {}", self.strategy.name(), e);
                return (Route::ExtractionFailed, EXTRACTION_FAILURE_REPLY.to_string());
            }
        };
        if extracted.is_terminal() {
            return (Route::NoText, extracted.into_text());
        }
        self.answer(RequestInput::Extracted(&extracted), &self.settings.vision.model)
            .await
    }
}
