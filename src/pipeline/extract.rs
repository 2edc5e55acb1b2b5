//! Text and image extraction, dispatched on the file extension.
//!
//! Extraction never fails: a file we cannot read produces an
//! [`Outcome::Degraded`] text whose placeholder ends up in front of the
//! agent or the user, and an empty image list.
//!
//! | Extension          | Text                              | Images                 |
//! |--------------------|-----------------------------------|------------------------|
//! | `md`, `txt`        | lossy UTF-8                       | none                   |
//! | `docx`             | paragraphs joined by `\n`         | embedded image parts   |
//! | `pdf`              | non-empty pages joined by `\n`    | image objects as PNG   |
//! | `png` `jpg` `jpeg` | empty                             | the file itself        |
//! | anything else      | lossy UTF-8 unless binary         | none                   |

use crate::error::{DegradedKind, Outcome};
use crate::model::ExtractedDocument;
use crate::pipeline::{docx, pdf};
use serde::Serialize;
use tracing::{debug, warn};

pub const UNSUPPORTED_SENTINEL: &str = "[Unsupported file type or unreadable content]";
pub const DOCX_SENTINEL: &str = "[Could not extract text from DOCX]";
pub const PDF_SENTINEL: &str = "[Could not extract text from PDF]";

/// Source format, decided by extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Markdown,
    Text,
    Docx,
    Pdf,
    Image,
    Other,
}

impl SourceKind {
    pub fn from_name(name: &str) -> Self {
        match extension(name).as_str() {
            "md" => SourceKind::Markdown,
            "txt" => SourceKind::Text,
            "docx" => SourceKind::Docx,
            "pdf" => SourceKind::Pdf,
            "png" | "jpg" | "jpeg" => SourceKind::Image,
            _ => SourceKind::Other,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, SourceKind::Image)
    }
}

/// Lower-cased text after the final `.`; the whole name when there is none.
pub fn extension(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_lowercase()
}

/// Text and images in one pass.
pub async fn extract(bytes: &[u8], name: &str) -> ExtractedDocument {
    let text = extract_text(bytes, name).await;
    let images = extract_images(bytes, name).await;
    debug!(
        "Extracted {}: {} chars, {} images",
        name,
        text.text().len(),
        images.len()
    );
    ExtractedDocument { text, images }
}

/// Text content of a source file.
pub async fn extract_text(bytes: &[u8], name: &str) -> Outcome<String> {
    match SourceKind::from_name(name) {
        SourceKind::Markdown | SourceKind::Text => Outcome::Ok(decode_lossy(bytes)),
        SourceKind::Image => Outcome::Ok(String::new()),
        SourceKind::Docx => {
            let owned = bytes.to_vec();
            let joined = tokio::task::spawn_blocking(move || docx::read_text(&owned)).await;
            match joined {
                Ok(Ok(text)) => Outcome::Ok(text),
                Ok(Err(e)) => {
                    warn!("DOCX text extraction failed for {}: {}", name, e);
                    Outcome::degraded(DegradedKind::Corrupt, DOCX_SENTINEL)
                }
                Err(e) => {
                    warn!("DOCX task failed for {}: {}", name, e);
                    Outcome::degraded(DegradedKind::Corrupt, DOCX_SENTINEL)
                }
            }
        }
        SourceKind::Pdf => match pdf::read_text(bytes.to_vec()).await {
            Ok(text) => Outcome::Ok(text),
            Err(pdf::PdfError::Unavailable(reason)) => {
                warn!("PDF text extraction unavailable: {}", reason);
                Outcome::degraded(
                    DegradedKind::Unavailable,
                    format!("[PDF text extraction not available: {reason}]"),
                )
            }
            Err(e) => {
                warn!("PDF text extraction failed for {}: {}", name, e);
                Outcome::degraded(DegradedKind::Corrupt, PDF_SENTINEL)
            }
        },
        SourceKind::Other => {
            if bytes.contains(&0) {
                Outcome::degraded(DegradedKind::Unsupported, UNSUPPORTED_SENTINEL)
            } else {
                Outcome::Ok(decode_lossy(bytes))
            }
        }
    }
}

/// Images embedded in a source file; empty on any failure.
pub async fn extract_images(bytes: &[u8], name: &str) -> Vec<Vec<u8>> {
    match SourceKind::from_name(name) {
        SourceKind::Image => vec![bytes.to_vec()],
        SourceKind::Docx => {
            let owned = bytes.to_vec();
            match tokio::task::spawn_blocking(move || docx::read_images(&owned)).await {
                Ok(Ok(images)) => images,
                Ok(Err(e)) => {
                    warn!("DOCX image extraction failed for {}: {}", name, e);
                    Vec::new()
                }
                Err(e) => {
                    warn!("DOCX image task failed for {}: {}", name, e);
                    Vec::new()
                }
            }
        }
        SourceKind::Pdf => pdf::read_images(bytes.to_vec()).await.unwrap_or_else(|e| {
            warn!("PDF image extraction failed for {}: {}", name, e);
            Vec::new()
        }),
        SourceKind::Markdown | SourceKind::Text | SourceKind::Other => Vec::new(),
    }
}

fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_after_last_dot_lowercased() {
        assert_eq!(extension("Design.V2.DOCX"), "docx");
        assert_eq!(extension("README"), "readme");
        assert_eq!(SourceKind::from_name("a.JPEG"), SourceKind::Image);
        assert_eq!(SourceKind::from_name("notes"), SourceKind::Other);
    }

    #[tokio::test]
    async fn markdown_is_decoded_lossily() {
        let text = extract_text(b"# Title\n\xFFbody", "notes.md").await;
        assert!(text.is_ok());
        assert_eq!(text.text(), "# Title\n\u{FFFD}body");
    }

    #[tokio::test]
    async fn image_has_no_text_and_is_its_own_image() {
        let bytes = [0x89, b'P', b'N', b'G', 0];
        let doc = extract(&bytes, "shot.PNG").await;
        assert_eq!(doc.text(), "");
        assert_eq!(doc.images, vec![bytes.to_vec()]);
    }

    #[tokio::test]
    async fn corrupt_docx_degrades() {
        let doc = extract(b"not a zip", "notes.docx").await;
        assert_eq!(doc.text(), DOCX_SENTINEL);
        assert_eq!(
            doc.text.degradation().map(|d| d.kind),
            Some(DegradedKind::Corrupt)
        );
        assert!(doc.images.is_empty());
    }

    #[tokio::test]
    async fn corrupt_pdf_degrades() {
        let doc = extract(b"not a pdf", "notes.pdf").await;
        assert!(!doc.text.is_ok());
        let t = doc.text();
        assert!(
            t == PDF_SENTINEL || t.starts_with("[PDF text extraction not available:"),
            "got: {t}"
        );
        assert!(doc.images.is_empty());
    }

    #[tokio::test]
    async fn unknown_binary_is_unsupported() {
        let text = extract_text(&[0x00, 0x01, 0x02], "blob.bin").await;
        assert_eq!(text.text(), UNSUPPORTED_SENTINEL);
    }

    #[tokio::test]
    async fn unknown_text_is_decoded() {
        let text = extract_text(b"key = value", "settings.toml").await;
        assert_eq!(text.text(), "key = value");
    }
}
