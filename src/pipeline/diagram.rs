//! Diagram generation: image description → Mermaid source.

use crate::config::{DiagramKind, RfcConfig};
use crate::error::{DegradedKind, Outcome};
use crate::pipeline::llm::{self, AgentClient};
use crate::prompts::diagram_prompt;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Placeholder when there is nothing to describe.
pub const NO_DESCRIPTION: &str = "[No OCR or image description available]";

// Closing fence optional: a reply cut off by the token limit still yields code.
static MERMAID_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```mermaid(.*?)(?:```|\z)").expect("valid regex"));

/// Code inside the first ```` ```mermaid ```` fence, or the whole reply.
pub fn extract_mermaid_code(reply: &str) -> String {
    match MERMAID_FENCE.captures(reply).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().trim().to_string(),
        None => reply.trim().to_string(),
    }
}

/// Ask the agent for a `kind` diagram of `description`.
///
/// A blank description short-circuits to [`NO_DESCRIPTION`] without a call.
pub async fn describe_diagram(
    description: &str,
    agent: &dyn AgentClient,
    config: &RfcConfig,
    kind: DiagramKind,
) -> Outcome<String> {
    if description.trim().is_empty() {
        return Outcome::degraded(DegradedKind::MissingInput, NO_DESCRIPTION);
    }

    let prompt = diagram_prompt(description, kind);
    debug!("Requesting {} diagram ({} chars of description)", kind, description.len());
    llm::ask(agent, config, &prompt).await.map(|reply| extract_mermaid_code(&reply))
}
