//! # edgequake-rfc
//!
//! Draft RFC-style design documents from DOCX, PDF, Markdown or image
//! sources with an AI agent, and review existing RFCs.
//!
//! ## Why this crate?
//!
//! Design notes arrive as Word files with whiteboard photos, PDFs with
//! embedded diagrams, or Markdown with links to draw.io and mermaid.live.
//! Turning them into a consistent RFC is mostly mechanical: pull out the
//! text, read the pictures, redraw the diagrams as Mermaid, and lay it all
//! out in the same 13 sections with the same header. This crate does the
//! mechanical part and leaves the writing to the agent.
//!
//! ## Pipeline Overview
//!
//! ```text
//! source (path / URL / s3://bucket/key)
//!  │
//!  ├─ 1. Input     resolve to named bytes
//!  ├─ 2. Extract   text + embedded images (docx, pdfium, lossy UTF-8)
//!  ├─ 3. Harvest   image / draw.io / mermaid.live links, inline ```mermaid
//!  ├─ 4. OCR       image → text (tesseract or a vision model)
//!  ├─ 5. Diagrams  text → Mermaid via the agent
//!  └─ 6. Draft     13-section RFC prompt → Markdown
//!
//! review: load .md ─▶ parse header ─▶ rewrite header ─▶ comments ─▶ upload
//! ```
//!
//! Steps that can fail on bad input (unreadable files, missing OCR, agent
//! errors) return an [`Outcome`] whose placeholder text flows into the
//! document instead of aborting the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_rfc::{draft_rfc, DraftOptions, Metadata, RfcConfig, Toolkit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let toolkit = Toolkit::from_config(RfcConfig::default())?;
//!     let options = DraftOptions {
//!         metadata: Metadata { author: "Jane".into(), ..Default::default() },
//!         ..Default::default()
//!     };
//!     let output = draft_rfc("design.docx", &toolkit, &options, None).await?;
//!     std::fs::write(&output.file_name, &output.markdown)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `rfc-agent` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-rfc = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AgentConfig, Credentials, DiagramKind, RfcConfig, RfcConfigBuilder};
pub use convert::{
    draft_rfc, draft_rfc_sync, draft_rfc_to_file, inspect, write_atomic, DraftOptions, DraftOutput,
    DraftStats, InspectReport,
};
pub use error::{Degraded, DegradedKind, Outcome, RfcError};
pub use fetch::{HttpFetch, OfflineFetcher, ReqwestFetcher};
pub use model::{
    DiagramLinks, DiagramSource, DiagramSpec, ExtractedDocument, Metadata, RfcDocument, SourceFile,
    STATUS_CHOICES,
};
pub use pipeline::llm::{AgentClient, AgentError, LlmAgent};
pub use pipeline::ocr::{NoOcr, OcrEngine, TesseractOcr, VisionOcr};
pub use progress::{DraftProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{
    apply_comment, CommentPlacement, DraftSession, ReviewSession, ReviewStage, Stage, Toolkit,
};
pub use storage::{FsObjectStore, ObjectStore};
