use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::TARGET_OCR_REQUEST;

#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine ran but found nothing readable. This is the one extraction
    /// failure that is not fail-open: with no text there is nothing to verify.
    #[error("No text could be extracted from the image")]
    Empty,
    #[error("OCR engine failed: {0}")]
    Engine(String),
}

/// Optical character recognition over an uploaded image buffer, delegated to
/// the tesseract binary. The buffer is spooled to a temp file that is removed
/// when recognition finishes.
pub struct OcrEngine {
    command: String,
    timeout: Duration,
}

impl OcrEngine {
    pub fn new(command: String, timeout: Duration) -> Self {
        OcrEngine { command, timeout }
    }

    pub async fn recognize(&self, image: &[u8]) -> Result<String, OcrError> {
        let file = NamedTempFile::new().map_err(|e| OcrError::Engine(e.to_string()))?;
        tokio::fs::write(file.path(), image)
            .await
            .map_err(|e| OcrError::Engine(e.to_string()))?;

        debug!(
            target: TARGET_OCR_REQUEST,
            "Running {} over {} byte image", self.command, image.len()
        );

        let invocation = Command::new(&self.command)
            .arg(file.path())
            .arg("stdout")
            .output();

        let output = match timeout(self.timeout, invocation).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(OcrError::Engine(e.to_string())),
            Err(_) => {
                warn!(target: TARGET_OCR_REQUEST, "OCR timed out after {:?}", self.timeout);
                return Err(OcrError::Engine("OCR engine timed out".to_string()));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(stderr.trim().to_string()));
        }

        let cleaned = clean_text(&String::from_utf8_lossy(&output.stdout));
        if cleaned.is_empty() {
            return Err(OcrError::Empty);
        }

        debug!(
            target: TARGET_OCR_REQUEST,
            "Recognized {} chars of text", cleaned.len()
        );
        Ok(cleaned)
    }
}

/// Collapses whitespace runs to single spaces and trims the ends.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
