//! Error types for the edgequake-rfc library.
//!
//! Two distinct shapes reflect two distinct failure modes:
//!
//! * [`RfcError`] (**fatal**): the requested action cannot proceed at all
//!   (source file missing, object store unreachable, session driven out of
//!   order). Returned as `Err(RfcError)` from the outer surfaces only.
//!
//! * [`Outcome`] (**non-fatal**): a best-effort step (OCR, PDF parsing, an AI
//!   call, an image download) fell back to a placeholder. The placeholder text
//!   is carried alongside a [`DegradedKind`] so callers can branch on the kind
//!   instead of sniffing sentinel strings, while the pipeline still has some
//!   text to put in front of a human.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-rfc library.
#[derive(Debug, Error)]
pub enum RfcError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Source file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a path, an HTTP/HTTPS URL or an `s3://` location.
    #[error("Invalid input '{input}': not a file path, an HTTP/HTTPS URL or s3://bucket/key")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Storage errors ────────────────────────────────────────────────────
    /// The bucket does not exist in the object store.
    #[error("Bucket '{bucket}' does not exist")]
    BucketNotFound { bucket: String },

    /// The key does not exist in the bucket.
    #[error("Object '{key}' not found in bucket '{bucket}'")]
    ObjectNotFound { bucket: String, key: String },

    /// The bucket or key is not a plain relative name.
    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// The object store backend failed.
    #[error("Object store error on '{bucket}/{key}': {detail}")]
    Storage {
        bucket: String,
        key: String,
        detail: String,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// A session operation was called from a stage that does not allow it.
    #[error("Cannot {action} while the session is in stage '{stage}'")]
    InvalidTransition { action: &'static str, stage: String },

    /// An image or diagram index was out of range.
    #[error("Index {index} is out of range ({len} available)")]
    IndexOutOfRange { index: usize, len: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a best-effort step fell back to a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedKind {
    /// A capability (OCR binary, pdfium library) is not installed.
    Unavailable,
    /// The input type is not something we can read.
    Unsupported,
    /// The input claimed a known format but could not be parsed.
    Corrupt,
    /// The AI backend returned an error.
    Backend,
    /// A network fetch failed.
    Network,
    /// There was nothing to work from (blank OCR text, no description).
    MissingInput,
}

impl fmt::Display for DegradedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DegradedKind::Unavailable => "unavailable",
            DegradedKind::Unsupported => "unsupported",
            DegradedKind::Corrupt => "corrupt",
            DegradedKind::Backend => "backend",
            DegradedKind::Network => "network",
            DegradedKind::MissingInput => "missing_input",
        };
        f.write_str(s)
    }
}

/// A fallback result: the kind of failure plus the placeholder text that
/// stands in for the real value in the generated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degraded {
    pub kind: DegradedKind,
    pub placeholder: String,
}

impl Degraded {
    pub fn new(kind: DegradedKind, placeholder: impl Into<String>) -> Self {
        Self {
            kind,
            placeholder: placeholder.into(),
        }
    }
}

impl fmt::Display for Degraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.placeholder, self.kind)
    }
}

/// Result of a best-effort step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    Ok(T),
    Degraded(Degraded),
}

impl<T> Outcome<T> {
    pub fn degraded(kind: DegradedKind, placeholder: impl Into<String>) -> Self {
        Outcome::Degraded(Degraded::new(kind, placeholder))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    /// The degradation, if any.
    pub fn degradation(&self) -> Option<&Degraded> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Degraded(d) => Some(d),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(v) => Some(v),
            Outcome::Degraded(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(v) => Outcome::Ok(f(v)),
            Outcome::Degraded(d) => Outcome::Degraded(d),
        }
    }
}

impl Outcome<String> {
    /// The real text, or the placeholder when degraded.
    pub fn text(&self) -> &str {
        match self {
            Outcome::Ok(s) => s,
            Outcome::Degraded(d) => &d.placeholder,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Outcome::Ok(s) => s,
            Outcome::Degraded(d) => d.placeholder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display() {
        let e = RfcError::InvalidTransition {
            action: "draft",
            stage: "new".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("draft"), "got: {msg}");
        assert!(msg.contains("'new'"), "got: {msg}");
    }

    #[test]
    fn object_not_found_display() {
        let e = RfcError::ObjectNotFound {
            bucket: "rfcs".into(),
            key: "a.md".into(),
        };
        assert!(e.to_string().contains("rfcs"));
        assert!(e.to_string().contains("a.md"));
    }

    #[test]
    fn degraded_text_is_placeholder() {
        let o: Outcome<String> = Outcome::degraded(DegradedKind::Corrupt, "[Could not extract text from PDF]");
        assert!(!o.is_ok());
        assert_eq!(o.text(), "[Could not extract text from PDF]");
        assert_eq!(o.degradation().map(|d| d.kind), Some(DegradedKind::Corrupt));
    }

    #[test]
    fn ok_text_passes_through() {
        let o = Outcome::Ok("hello".to_string());
        assert!(o.is_ok());
        assert_eq!(o.clone().into_text(), "hello");
        assert_eq!(o.map(|s| s.len()).ok(), Some(5));
    }

    #[test]
    fn outcome_serialises_with_status_tag() {
        let o: Outcome<String> = Outcome::degraded(DegradedKind::Network, "x");
        let json = serde_json::to_string(&o).unwrap();
        assert!(json.contains("\"status\":\"degraded\""), "got: {json}");
        assert!(json.contains("\"kind\":\"network\""), "got: {json}");
    }
}
