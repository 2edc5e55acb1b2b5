//! Progress-callback trait for drafting events.
//!
//! Inject an [`Arc<dyn DraftProgressCallback>`] via
//! [`crate::config::RfcConfigBuilder::progress_callback`] to receive events
//! as a [`crate::session::DraftSession`] extracts the source, generates
//! diagrams and asks the agent for the draft. All methods default to no-ops.

use std::sync::Arc;

/// Called by the drafting session as it moves through its stages.
pub trait DraftProgressCallback: Send + Sync {
    /// Called once the source has been extracted.
    ///
    /// # Arguments
    /// * `text_len`: characters of extracted text (or placeholder)
    /// * `images`: number of images found, including fetched URL images
    /// * `diagrams`: number of harvested external diagrams
    fn on_extracted(&self, text_len: usize, images: usize, diagrams: usize) {
        let _ = (text_len, images, diagrams);
    }

    /// Called before the agent is asked for the diagram of image `index` (1-indexed).
    fn on_diagram_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a diagram was generated.
    fn on_diagram_complete(&self, index: usize, total: usize, code_len: usize) {
        let _ = (index, total, code_len);
    }

    /// Called when a diagram fell back to a placeholder.
    fn on_diagram_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called before the RFC draft prompt is sent.
    fn on_draft_start(&self, prompt_len: usize) {
        let _ = prompt_len;
    }

    /// Called with the length of the returned Markdown.
    fn on_draft_complete(&self, markdown_len: usize) {
        let _ = markdown_len;
    }

    /// Called instead of `on_draft_complete` when the agent gave no draft.
    fn on_draft_error(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DraftProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RfcConfig`].
pub type ProgressCallback = Arc<dyn DraftProgressCallback>;
