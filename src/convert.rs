//! One-shot entry points.
//!
//! ## Why a one-shot API next to the sessions?
//!
//! A [`DraftSession`] lets a front end stop between steps so the user can
//! fix OCR text or diagram code. Scripts and the CLI want the whole run in
//! one call: resolve the source, extract, generate every image diagram,
//! draft, and optionally regenerate once with a custom prompt or reference
//! file. [`draft_rfc`] does exactly that on top of the same session.

use crate::config::DiagramKind;
use crate::error::{Degraded, Outcome, RfcError};
use crate::model::{DiagramLinks, DiagramSpec, Metadata, SourceFile};
use crate::pipeline::extract::{self, SourceKind};
use crate::pipeline::{harvest, input, metadata};
use crate::session::{DraftSession, Toolkit};
use crate::storage::ObjectStore;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Per-run inputs for [`draft_rfc`].
#[derive(Debug, Clone, Default)]
pub struct DraftOptions {
    pub metadata: Metadata,
    /// Falls back to the configured default kind.
    pub diagram_kind: Option<DiagramKind>,
    /// When set (or when `context` is set) the first draft is regenerated once.
    pub custom_prompt: Option<String>,
    /// Reference file whose text (or OCR) is added to the regeneration.
    pub context: Option<SourceFile>,
}

/// Counters for one [`draft_rfc`] run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DraftStats {
    pub text_chars: usize,
    pub images: usize,
    pub external_diagrams: usize,
    /// Image diagrams that ended in a placeholder.
    pub degraded_diagrams: usize,
    pub regenerated: bool,
    pub duration_ms: u64,
}

/// Result of [`draft_rfc`].
#[derive(Debug, Clone, Serialize)]
pub struct DraftOutput {
    /// `<stem>_RFC.md`.
    pub file_name: String,
    pub markdown: String,
    pub diagrams: Vec<DiagramSpec>,
    /// Set when the agent did not produce a draft and `markdown` is its
    /// error placeholder.
    pub draft_degraded: Option<Degraded>,
    pub stats: DraftStats,
}

/// Draft an RFC from a local path, URL or `s3://bucket/key`.
///
/// # Errors
/// Only source resolution fails the call. Extraction, OCR and agent
/// failures leave placeholders in the output; check
/// [`DraftOutput::draft_degraded`].
pub async fn draft_rfc(
    input_str: impl AsRef<str>,
    toolkit: &Toolkit,
    options: &DraftOptions,
    store: Option<&dyn ObjectStore>,
) -> Result<DraftOutput, RfcError> {
    let start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting draft: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let source = input::resolve_source(input_str, toolkit.config.fetch_timeout_secs, store).await?;

    let mut session = DraftSession::new();
    session.set_metadata(options.metadata.clone());
    let kind = options.diagram_kind.unwrap_or(toolkit.config.diagram_kind);
    session.set_diagram_kind(kind);
    session.load_source(source);

    // ── Step 2: Extract, harvest, OCR ────────────────────────────────────
    session.extract(toolkit).await?;

    // ── Step 3: Image diagrams ───────────────────────────────────────────
    let generated = session.generate_all_diagrams(toolkit).await?;
    let degraded_diagrams = generated.iter().filter(|o| !o.is_ok()).count();
    if degraded_diagrams > 0 {
        warn!("{} of {} image diagrams degraded", degraded_diagrams, generated.len());
    }
    session.resolve_diagrams()?;

    // ── Step 4: Draft ────────────────────────────────────────────────────
    let mut draft = session.draft(toolkit).await?;

    // ── Step 5: Optional regeneration ────────────────────────────────────
    let prompt = options.custom_prompt.as_deref().filter(|p| !p.trim().is_empty());
    let regenerate = draft.is_ok() && (prompt.is_some() || options.context.is_some());
    if regenerate {
        if let Some(ctx) = options.context.clone() {
            session.attach_context(ctx, toolkit).await?;
        }
        draft = session.regenerate(prompt, kind, toolkit).await?;
    }

    let (file_name, bytes) = session.export()?;
    let markdown = String::from_utf8_lossy(&bytes).into_owned();

    let stats = DraftStats {
        text_chars: session.extracted_text().map(str::len).unwrap_or(0),
        images: session.images().len(),
        external_diagrams: session.external_diagrams().len(),
        degraded_diagrams,
        regenerated: regenerate,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Draft complete: {} ({} chars, {}ms)",
        file_name,
        markdown.len(),
        stats.duration_ms
    );

    Ok(DraftOutput {
        file_name,
        markdown,
        diagrams: session.diagrams(),
        draft_degraded: draft.degradation().cloned(),
        stats,
    })
}

/// Draft an RFC and write it to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn draft_rfc_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    toolkit: &Toolkit,
    options: &DraftOptions,
    store: Option<&dyn ObjectStore>,
) -> Result<DraftOutput, RfcError> {
    let output = draft_rfc(input_str, toolkit, options, store).await?;
    write_atomic(output_path.as_ref(), output.markdown.as_bytes()).await?;
    Ok(output)
}

/// Write `bytes` to `path` through a sibling temp file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RfcError> {
    let fail = |e| RfcError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}

/// Synchronous wrapper around [`draft_rfc`].
///
/// Creates a temporary tokio runtime internally.
pub fn draft_rfc_sync(
    input_str: impl AsRef<str>,
    toolkit: &Toolkit,
    options: &DraftOptions,
    store: Option<&dyn ObjectStore>,
) -> Result<DraftOutput, RfcError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RfcError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(draft_rfc(input_str, toolkit, options, store))
}

// ── Inspect ──────────────────────────────────────────────────────────────

/// What extraction sees in a source, without calling the agent.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub name: String,
    pub kind: SourceKind,
    pub bytes: usize,
    /// Extracted text, or why there is none.
    pub text: Outcome<String>,
    pub text_chars: usize,
    pub embedded_images: usize,
    pub links: DiagramLinks,
    /// Header, when the source is itself an RFC.
    pub metadata: Option<Metadata>,
}

/// Extract and harvest `input_str` without OCR, fetching or any agent call.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    fetch_timeout_secs: u64,
    store: Option<&dyn ObjectStore>,
) -> Result<InspectReport, RfcError> {
    let source = input::resolve_source(input_str.as_ref(), fetch_timeout_secs, store).await?;
    let doc = extract::extract(&source.bytes, &source.name).await;
    let links = harvest::harvest(doc.text());
    let metadata = doc.text.is_ok().then(|| metadata::parse(doc.text())).flatten();

    Ok(InspectReport {
        kind: SourceKind::from_name(&source.name),
        bytes: source.bytes.len(),
        text_chars: doc.text().chars().count(),
        embedded_images: doc.images.len(),
        text: doc.text,
        name: source.name,
        links,
        metadata,
    })
}
