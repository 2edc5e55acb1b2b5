//! Data model shared by the pipeline stages and the sessions.

use crate::config::DiagramKind;
use crate::error::Outcome;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Status values offered by the drafting and review forms.
pub const STATUS_CHOICES: [&str; 4] = ["Draft", "Accepted", "Rejected", "Implemented"];

/// Text and embedded images pulled out of one source file.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub text: Outcome<String>,
    /// Raw image blobs in document order.
    pub images: Vec<Vec<u8>>,
}

impl ExtractedDocument {
    /// Extracted text, or the placeholder explaining why there is none.
    pub fn text(&self) -> &str {
        self.text.text()
    }
}

/// Diagram references found in extracted text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramLinks {
    pub image_urls: Vec<String>,
    pub drawio_urls: Vec<String>,
    pub mermaid_urls: Vec<String>,
    pub mermaid_blocks: Vec<String>,
}

impl DiagramLinks {
    pub fn is_empty(&self) -> bool {
        self.image_urls.is_empty()
            && self.drawio_urls.is_empty()
            && self.mermaid_urls.is_empty()
            && self.mermaid_blocks.is_empty()
    }
}

/// The five-field RFC header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub author: String,
    pub date: String,
    pub status: String,
    pub reviewers: String,
    pub topic: String,
}

impl Metadata {
    /// Fields in header order.
    pub fn fields(&self) -> [&str; 5] {
        [
            &self.author,
            &self.date,
            &self.status,
            &self.reviewers,
            &self.topic,
        ]
    }

    pub(crate) fn from_fields(fields: [String; 5]) -> Self {
        let [author, date, status, reviewers, topic] = fields;
        Self {
            author,
            date,
            status,
            reviewers,
            topic,
        }
    }

    /// Copy with every value cut to its first line and trimmed.
    ///
    /// The header grammar is line-oriented, so a value spanning lines
    /// could not be read back.
    pub fn sanitized(&self) -> Self {
        let fields = self.fields().map(|v| {
            let first = v.split(['\r', '\n']).next().unwrap_or("");
            if first.len() != v.len() {
                warn!("Metadata value truncated to its first line: {:?}", first);
            }
            first.trim().to_string()
        });
        Self::from_fields(fields)
    }
}

/// Where a diagram came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "index", rename_all = "snake_case")]
pub enum DiagramSource {
    /// Generated from the OCR text of image `n` (0-indexed).
    Image(usize),
    /// Harvested from the source text (mermaid block or link).
    External,
}

/// One Mermaid diagram destined for section 7 of the RFC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramSpec {
    pub kind: DiagramKind,
    pub code: String,
    pub source: DiagramSource,
}

/// A generated RFC document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfcDocument {
    pub markdown: String,
}

/// A source file: its name (for the extension) and its bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// File name without its last extension.
    pub fn stem(&self) -> &str {
        file_stem(&self.name)
    }
}

/// `"a/b/design.docx"` → `"a/b/design"`; names without a dot are returned whole.
pub(crate) fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_keeps_first_line() {
        let m = Metadata {
            author: " Jane \nDoe".into(),
            date: "2024-01-01".into(),
            status: "Draft\r\nextra".into(),
            reviewers: "Bob".into(),
            topic: "X".into(),
        };
        let s = m.sanitized();
        assert_eq!(s.author, "Jane");
        assert_eq!(s.status, "Draft");
        assert_eq!(s.topic, "X");
    }

    #[test]
    fn stem_strips_last_extension() {
        assert_eq!(SourceFile::new("design.v2.docx", vec![]).stem(), "design.v2");
        assert_eq!(SourceFile::new("README", vec![]).stem(), "README");
        assert_eq!(SourceFile::new(".hidden", vec![]).stem(), ".hidden");
    }

    #[test]
    fn empty_links() {
        assert!(DiagramLinks::default().is_empty());
    }
}
