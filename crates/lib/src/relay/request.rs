//! Backend request construction. Sampling parameters are fixed; the model is a deployment constant.

use crate::channels::TextPayload;
use crate::llm::{
    BackendRequest, ChatMessage, ContentPart, ImageUrl, MessageContent, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_P,
};
use crate::vision::{ContentKind, ExtractedContent};

/// Prefix put in front of OCR output when it is sent to the backend.
pub const RECOGNIZED_TEXT_LABEL: &str = "辨識到的文字：";

/// What a request is built from.
#[derive(Debug, Clone, Copy)]
pub enum RequestInput<'a> {
    Text(&'a TextPayload),
    Extracted(&'a ExtractedContent),
}

fn extracted_content(content: &ExtractedContent) -> MessageContent {
    match (content.kind(), content.image_data_ref()) {
        (ContentKind::PlainText, _) => {
            MessageContent::Text(format!("{}\n{}", RECOGNIZED_TEXT_LABEL, content.text()))
        }
        (ContentKind::MultimodalText, Some(url)) => MessageContent::Parts(vec![
            ContentPart::Text {
                text: content.text().to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: url.to_string(),
                },
            },
        ]),
        // NoText, and multimodal without an image (not produced by the constructors).
        _ => MessageContent::Text(content.text().to_string()),
    }
}

/// Build a single-message `user` request for `model`.
pub fn build_request(input: RequestInput<'_>, model: &str) -> BackendRequest {
    let content = match input {
        RequestInput::Text(payload) => MessageContent::Text(payload.text.clone()),
        RequestInput::Extracted(extracted) => extracted_content(extracted),
    };
    BackendRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::user(content)],
        temperature: DEFAULT_TEMPERATURE,
        top_p: DEFAULT_TOP_P,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::NO_TEXT_RECOGNIZED;

    fn only_message(req: &BackendRequest) -> &ChatMessage {
        assert_eq!(req.messages.len(), 1);
        let msg = &req.messages[0];
        assert_eq!(msg.role, "user");
        msg
    }

    #[test]
    fn text_is_sent_verbatim() {
        for text in ["hello", "", "  spaced  ", "多行\n訊息", "辨識到的文字：not ocr"] {
            let payload = TextPayload {
                text: text.to_string(),
            };
            let req = build_request(RequestInput::Text(&payload), "internlm3-latest");
            assert_eq!(req.model, "internlm3-latest");
            assert_eq!(only_message(&req).content.as_text(), Some(text));
            assert_eq!(req.temperature, 0.8);
            assert_eq!(req.top_p, 0.9);
        }
    }

    #[test]
    fn ocr_text_gets_label() {
        let content = ExtractedContent::plain_text("line 1\nline 2");
        let req = build_request(RequestInput::Extracted(&content), "m");
        assert_eq!(
            only_message(&req).content.as_text(),
            Some("辨識到的文字：\nline 1\nline 2")
        );
    }

    #[test]
    fn no_text_sentinel_passes_through() {
        let content = ExtractedContent::no_text();
        let req = build_request(RequestInput::Extracted(&content), "m");
        assert_eq!(only_message(&req).content.as_text(), Some(NO_TEXT_RECOGNIZED));
    }

    #[test]
    fn multimodal_is_text_then_image() {
        let content = ExtractedContent::multimodal(
            "describe this image",
            "data:image/jpeg;base64,/9j/".to_string(),
        );
        let req = build_request(RequestInput::Extracted(&content), "internvl");
        match &only_message(&req).content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(
                    parts[0],
                    ContentPart::Text {
                        text: "describe this image".into()
                    }
                );
                match &parts[1] {
                    ContentPart::ImageUrl { image_url } => {
                        assert_eq!(Some(image_url.url.as_str()), content.image_data_ref())
                    }
                    other => panic!("expected image part, got {:?}", other),
                }
            }
            other => panic!("expected parts, got {:?}", other),
        }
    }
}
