//! RFC document builder: compose the draft prompt and ask the agent.
//!
//! The prompt pins the agent to the 13-section skeleton from
//! [`crate::prompts`], with the metadata header filled in so the reply can be
//! read back by [`crate::pipeline::metadata`]. The agent's reply is returned
//! verbatim; nothing checks that it kept the skeleton.

use crate::config::{DiagramKind, RfcConfig};
use crate::error::Outcome;
use crate::model::Metadata;
use crate::pipeline::llm::{self, AgentClient};
use crate::prompts::{self, HeaderValues};
use tracing::{debug, info};

/// Appended when the source text is cut to fit the budget.
pub const SHORTEN_PLACEHOLDER: &str = "...";

/// Everything that goes into one draft prompt.
#[derive(Debug, Clone, Default)]
pub struct RfcRequest {
    /// Source text, or the current Markdown when regenerating.
    pub doc_text: String,
    /// Mermaid sources for section 7, in order.
    pub diagrams: Vec<String>,
    pub metadata: Metadata,
    /// Kind the image diagrams were generated with.
    pub kind: DiagramKind,
    pub custom_prompt: Option<String>,
    /// Text from a side-loaded reference file or image.
    pub extra_context: Option<String>,
}

/// Collapse whitespace and fit `text` into `width` characters.
///
/// Text that fits after collapsing is returned collapsed. Otherwise whole
/// words are kept while they and `placeholder` fit, and `placeholder` is
/// appended directly after the last word. A first word longer than the
/// budget is cut mid-word.
pub fn shorten(text: &str, width: usize, placeholder: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(placeholder.chars().count());
    let mut out = String::new();
    let mut used = 0usize;
    for word in collapsed.split(' ') {
        let sep = usize::from(!out.is_empty());
        let len = word.chars().count();
        if used + sep + len > budget {
            break;
        }
        if sep == 1 {
            out.push(' ');
        }
        out.push_str(word);
        used += sep + len;
    }

    if out.is_empty() {
        out = collapsed.chars().take(budget).collect();
    }
    out.push_str(placeholder);
    out
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

/// Today's date as used for a blank Date field.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// The full draft prompt for `request`, with blank metadata defaulted.
pub fn build_rfc_prompt(request: &RfcRequest, text_budget_chars: usize) -> String {
    build_rfc_prompt_on(request, text_budget_chars, &today())
}

/// [`build_rfc_prompt`] with an explicit date for blank Date fields.
pub fn build_rfc_prompt_on(request: &RfcRequest, text_budget_chars: usize, today: &str) -> String {
    let m = request.metadata.sanitized();
    let header = HeaderValues {
        author: or_default(&m.author, "Unknown"),
        date: or_default(&m.date, today),
        status: or_default(&m.status, "Draft"),
        reviewers: or_default(&m.reviewers, "N/A"),
        topic: or_default(&m.topic, "Unknown"),
    };

    let diagrams = prompts::render_diagrams(request.diagrams.iter().map(String::as_str));
    let source = shorten(&request.doc_text, text_budget_chars, SHORTEN_PLACEHOLDER);
    let mut prompt = prompts::rfc_prompt(header, &diagrams, &source);

    if let Some(p) = request.custom_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        prompt.push_str(&prompts::custom_prompt_block(p));
    }
    if let Some(t) = request.extra_context.as_deref().filter(|t| !t.trim().is_empty()) {
        prompt.push_str(&prompts::extra_context_block(t));
    }
    prompt
}

/// Ask the agent for the RFC Markdown.
pub async fn build_rfc(request: &RfcRequest, agent: &dyn AgentClient, config: &RfcConfig) -> Outcome<String> {
    let prompt = build_rfc_prompt(request, config.text_budget_chars);
    info!(
        "Drafting RFC: {} diagrams ({}), prompt {} chars",
        request.diagrams.len(),
        request.kind,
        prompt.len()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_draft_start(prompt.len());
    }

    let out = llm::ask(agent, config, &prompt).await;
    debug!("Draft reply: {} chars (ok={})", out.text().len(), out.is_ok());

    if let Some(ref cb) = config.progress_callback {
        match out.degradation() {
            None => cb.on_draft_complete(out.text().len()),
            Some(d) => cb.on_draft_error(&d.placeholder),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::metadata;

    #[test]
    fn short_text_is_only_collapsed() {
        assert_eq!(shorten("a  b\n\nc", 5000, "..."), "a b c");
    }

    #[test]
    fn long_text_is_cut_at_a_word_boundary() {
        let out = shorten("alpha beta gamma delta", 14, "...");
        assert_eq!(out, "alpha beta...");
        assert!(out.chars().count() <= 14);
    }

    #[test]
    fn oversized_first_word_is_cut() {
        assert_eq!(shorten("abcdefghijklmnop", 8, "..."), "abcde...");
    }

    #[test]
    fn budget_counts_characters_not_bytes() {
        let text = "é".repeat(10);
        assert_eq!(shorten(&text, 10, "..."), text);
    }

    #[test]
    fn blank_metadata_gets_defaults() {
        let req = RfcRequest {
            doc_text: "body".into(),
            ..Default::default()
        };
        let p = build_rfc_prompt_on(&req, 5000, "2024-05-06");
        assert!(p.contains("# RFC: Unknown\n"));
        assert!(p.contains("**Author:** Unknown  \n"));
        assert!(p.contains("**Date:** 2024-05-06  \n"));
        assert!(p.contains("**Status:** Draft  \n"));
        assert!(p.contains("**Reviewers:** N/A  \n"));
        assert!(p.contains("**Topic:** Unknown\n"));
    }

    #[test]
    fn prompt_header_is_readable_by_codec() {
        let req = RfcRequest {
            metadata: Metadata {
                author: "Jane".into(),
                date: "2024-01-01".into(),
                status: "Accepted".into(),
                reviewers: "Bob".into(),
                topic: "Caching".into(),
            },
            ..Default::default()
        };
        let p = build_rfc_prompt_on(&req, 5000, "unused");
        assert_eq!(metadata::parse(&p), Some(req.metadata.clone()));
    }

    #[test]
    fn source_text_is_shortened_to_budget() {
        let req = RfcRequest {
            doc_text: "word ".repeat(5000),
            ..Default::default()
        };
        let p = build_rfc_prompt_on(&req, 100, "d");
        let start = p.find("Extracted document text:\n").unwrap() + "Extracted document text:\n".len();
        let end = p[start..].find("\n\n").unwrap() + start;
        let embedded = &p[start..end];
        assert!(embedded.ends_with("..."));
        assert!(embedded.chars().count() <= 100);
    }

    #[test]
    fn optional_blocks_are_appended_in_order() {
        let req = RfcRequest {
            custom_prompt: Some("Focus on security".into()),
            extra_context: Some("OCR of whiteboard".into()),
            ..Default::default()
        };
        let p = build_rfc_prompt_on(&req, 5000, "d");
        assert!(p.ends_with(
            "\n\nAdditional user prompt: Focus on security\n\nExtra context from uploaded file/image:\nOCR of whiteboard\n"
        ));
    }

    #[test]
    fn blank_optional_blocks_are_skipped() {
        let req = RfcRequest {
            custom_prompt: Some("   ".into()),
            extra_context: Some(String::new()),
            ..Default::default()
        };
        let p = build_rfc_prompt_on(&req, 5000, "d");
        assert!(!p.contains("Additional user prompt"));
        assert!(!p.contains("Extra context"));
    }
}
