//! Local OCR through a tesseract-compatible command line:
//! `<command> <image> stdout -l <languages>`. No shell is involved.

use crate::vision::strategy::ExtractionError;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct OcrEngine {
    command: String,
    languages: String,
    timeout: Duration,
}

impl OcrEngine {
    pub fn new(command: impl Into<String>, languages: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            languages: languages.into(),
            timeout,
        }
    }

    /// Recognize text in the image at `path`. Returns non-empty lines in reading order;
    /// an empty vec means no text regions were found.
    pub async fn recognize(&self, path: &Path) -> Result<Vec<String>, ExtractionError> {
        let run = Command::new(&self.command)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout))?
            .map_err(|e| ExtractionError::Spawn {
                command: self.command.clone(),
                source: e,
            })?;
        if !output.status.success() {
            return Err(ExtractionError::Recognizer {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let lines = recognized_lines(&String::from_utf8_lossy(&output.stdout));
        log::debug!("ocr: {} line(s) recognized", lines.len());
        Ok(lines)
    }
}

/// Split recognizer output into trimmed, non-empty lines (drops blank lines and page breaks).
fn recognized_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
