//! Mapping results to the reply text the user sees. Always non-empty.

use crate::llm::{BackendResult, MALFORMED_RESPONSE_STATUS};

/// Longest part of an error body quoted back to the user.
pub const ERROR_BODY_EXCERPT_CHARS: usize = 500;

/// Sent when the backend answered with empty content.
pub const EMPTY_REPLY_FALLBACK: &str = "（模型沒有回傳任何內容）";

/// Sent when the image could not be downloaded from the platform.
pub const ACQUISITION_FAILURE_REPLY: &str = "❌ 無法取得圖片內容，請稍後再試一次。";

/// Sent when the image was downloaded but text extraction failed.
pub const EXTRACTION_FAILURE_REPLY: &str = "❌ 圖片文字辨識失敗，請稍後再試一次。";

fn excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(ERROR_BODY_EXCERPT_CHARS) {
        Some((i, _)) => format!("{}…", &body[..i]),
        None => body.to_string(),
    }
}

/// The reply for a backend result.
pub fn reply_text(result: &BackendResult) -> String {
    match result {
        BackendResult::Success(text) if text.trim().is_empty() => EMPTY_REPLY_FALLBACK.to_string(),
        BackendResult::Success(text) => text.clone(),
        BackendResult::ApplicationError { status, body } if *status == MALFORMED_RESPONSE_STATUS => {
            format!("⚠️ 模型回應格式錯誤：{}", excerpt(body))
        }
        BackendResult::ApplicationError { status, body } => {
            format!("⚠️ 模型錯誤（{}）：{}", status, excerpt(body))
        }
        BackendResult::TransportError(message) => {
            format!("❌ 呼叫模型時發生錯誤：{}", message)
        }
    }
}
