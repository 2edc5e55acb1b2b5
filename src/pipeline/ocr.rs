//! OCR: turn an image into text the diagram prompt can describe.
//!
//! Three engines sit behind [`OcrEngine`]:
//!
//! * [`TesseractOcr`] runs the `tesseract` CLI on a PNG copy of the image.
//! * [`VisionOcr`] asks a vision-capable LLM to transcribe and describe it,
//!   which copes far better with boxes-and-arrows diagrams.
//! * [`NoOcr`] for runs where neither is wanted.
//!
//! No engine fails: the result is always text or a placeholder.

use crate::error::{DegradedKind, Outcome};
use crate::pipeline::encode;
use crate::pipeline::llm::LlmAgent;
use crate::prompts::VISION_OCR_PROMPT;
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Placeholder when no OCR backend is installed.
pub const OCR_UNAVAILABLE: &str = "[OCR not available: Tesseract or Pillow is not installed]";

fn ocr_failed(kind: DegradedKind, reason: impl std::fmt::Display) -> Outcome<String> {
    Outcome::degraded(kind, format!("[OCR not available: {reason}]"))
}

/// Recognise text in an image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &[u8]) -> Outcome<String>;
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// OCR through the `tesseract` command-line tool.
#[derive(Debug)]
pub struct TesseractOcr {
    binary: PathBuf,
    installed: OnceCell<bool>,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            installed: OnceCell::new(),
        }
    }

    /// Probe `tesseract --version` once per engine.
    async fn is_installed(&self) -> bool {
        *self
            .installed
            .get_or_init(|| async {
                match Command::new(&self.binary).arg("--version").output().await {
                    Ok(out) => out.status.success(),
                    Err(e) => {
                        debug!("tesseract probe failed for {}: {}", self.binary.display(), e);
                        false
                    }
                }
            })
            .await
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &[u8]) -> Outcome<String> {
        if !self.is_installed().await {
            return Outcome::degraded(DegradedKind::Unavailable, OCR_UNAVAILABLE);
        }

        let decoded = match image::load_from_memory(image) {
            Ok(img) => img,
            Err(e) => return ocr_failed(DegradedKind::Corrupt, e),
        };
        let png = match encode::to_png(&decoded) {
            Ok(p) => p,
            Err(e) => return ocr_failed(DegradedKind::Corrupt, e),
        };

        // Removed when `tmp` drops.
        let mut tmp = match tempfile::Builder::new().suffix(".png").tempfile() {
            Ok(t) => t,
            Err(e) => return ocr_failed(DegradedKind::Unavailable, e),
        };
        if let Err(e) = tmp.write_all(&png).and_then(|_| tmp.flush()) {
            return ocr_failed(DegradedKind::Unavailable, e);
        }

        let output = match Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Outcome::degraded(DegradedKind::Unavailable, OCR_UNAVAILABLE)
            }
            Err(e) => return ocr_failed(DegradedKind::Unavailable, e),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("tesseract exited with {}: {}", output.status, stderr.trim());
            return ocr_failed(
                DegradedKind::Backend,
                format!("tesseract exited with {}", output.status),
            );
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("tesseract recognised {} chars", text.len());
        Outcome::Ok(text)
    }
}

// ── Vision LLM ───────────────────────────────────────────────────────────

/// OCR by a vision-capable LLM.
#[derive(Debug, Clone)]
pub struct VisionOcr {
    agent: LlmAgent,
}

impl VisionOcr {
    pub fn new(agent: LlmAgent) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    async fn recognize(&self, image: &[u8]) -> Outcome<String> {
        let data = match encode::encode_image(image) {
            Ok(d) => d,
            Err(e) => return ocr_failed(DegradedKind::Corrupt, e),
        };
        match self.agent.describe_image(VISION_OCR_PROMPT, data).await {
            Ok(text) => Outcome::Ok(text),
            Err(e) => {
                warn!("Vision OCR failed: {}", e);
                ocr_failed(DegradedKind::Backend, e)
            }
        }
    }
}

// ── Disabled ─────────────────────────────────────────────────────────────

/// Engine that never recognises anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOcr;

#[async_trait]
impl OcrEngine for NoOcr {
    async fn recognize(&self, _image: &[u8]) -> Outcome<String> {
        Outcome::degraded(DegradedKind::Unavailable, OCR_UNAVAILABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_gives_not_installed_sentinel() {
        let ocr = TesseractOcr::new("/nonexistent/bin/tesseract-xyz");
        let out = ocr.recognize(b"anything").await;
        assert_eq!(out.text(), OCR_UNAVAILABLE);
        assert_eq!(out.degradation().map(|d| d.kind), Some(DegradedKind::Unavailable));
    }

    #[tokio::test]
    async fn no_ocr_is_unavailable() {
        assert_eq!(NoOcr.recognize(&[1, 2, 3]).await.text(), OCR_UNAVAILABLE);
    }

    #[test]
    fn failure_placeholder_carries_reason() {
        let out = ocr_failed(DegradedKind::Corrupt, "bad header");
        assert_eq!(out.text(), "[OCR not available: bad header]");
    }
}
