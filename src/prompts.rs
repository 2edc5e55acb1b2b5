//! Prompts sent to the RFC agent.
//!
//! Every piece of prompt text lives here so tests can inspect it without an
//! agent, and so the RFC skeleton the Metadata codec depends on is defined in
//! exactly one place.

use crate::config::DiagramKind;

/// Section titles of the RFC skeleton, in order.
pub const RFC_SECTIONS: [&str; 13] = [
    "Abstract",
    "Status of This Memo",
    "Introduction",
    "Motivation",
    "Proposal",
    "Architecture",
    "Diagrams",
    "Alternatives",
    "Risks",
    "Implementation Plan",
    "Security Considerations",
    "References",
    "Acknowledgements",
];

/// 1-indexed position of the section that receives the diagrams.
pub const DIAGRAMS_SECTION: usize = 7;

/// Output rules appended after the source text.
pub const RFC_OUTPUT_RULES: &str = "\
- Fill each section with content from the provided text if possible. Use placeholder sentences if necessary.
- When rendering diagrams, always use fenced Markdown code blocks with the mermaid language identifier.
- Do not summarize, explain, or provide any output other than the RFC Markdown.
- Never provide commentary outside the Markdown.
";

/// Prompt used by the vision OCR engine.
pub const VISION_OCR_PROMPT: &str = "Transcribe all text visible in this image. \
If the image is a diagram, describe every box, actor, arrow and label and how they connect, \
so that the diagram could be redrawn from your description. \
Output plain text only, with no commentary.";

/// GitHub-style anchor of a numbered section header: `"## 2. Status of This Memo"` → `"2-status-of-this-memo"`.
pub fn section_anchor(number: usize, title: &str) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect();
    format!("{number}-{slug}")
}

/// Numbered table of contents linking to each section header.
pub fn table_of_contents() -> String {
    RFC_SECTIONS
        .iter()
        .enumerate()
        .map(|(i, title)| format!("{}. [{}](#{})\n", i + 1, title, section_anchor(i + 1, title)))
        .collect()
}

/// Fixed header values after defaults have been applied.
#[derive(Debug, Clone, Copy)]
pub struct HeaderValues<'a> {
    pub author: &'a str,
    pub date: &'a str,
    pub status: &'a str,
    pub reviewers: &'a str,
    pub topic: &'a str,
}

/// The full RFC generation prompt.
///
/// `diagrams` is the already-rendered section 7 body and `source_text` the
/// already-shortened document text.
pub fn rfc_prompt(header: HeaderValues<'_>, diagrams: &str, source_text: &str) -> String {
    let mut p = String::with_capacity(4096 + source_text.len() + diagrams.len());
    p.push_str("\nYou are an RFC Markdown generator.\n");
    p.push_str(
        "Given the extracted document text below, output a complete RFC document in markdown format ONLY.\n",
    );
    p.push_str("The document MUST use this structure:\n\n");
    p.push_str(&format!("# RFC: {}\n\n", header.topic));
    p.push_str(&format!("**Author:** {}  \n", header.author));
    p.push_str(&format!("**Date:** {}  \n", header.date));
    p.push_str(&format!("**Status:** {}  \n", header.status));
    p.push_str(&format!("**Reviewers:** {}  \n", header.reviewers));
    p.push_str(&format!("**Topic:** {}\n\n---\n\n", header.topic));
    p.push_str("## Table of Contents\n\n");
    p.push_str(&table_of_contents());
    p.push_str("\n\n---\n\n");

    for (i, title) in RFC_SECTIONS.iter().enumerate() {
        let n = i + 1;
        p.push_str(&format!("## {n}. {title}\n\n"));
        if n == DIAGRAMS_SECTION {
            p.push_str(diagrams);
            p.push_str("\n\n");
        }
        p.push_str("---\n\n");
    }

    p.push_str("Extracted document text:\n");
    p.push_str(source_text);
    p.push_str("\n\n");
    p.push_str(RFC_OUTPUT_RULES);
    p
}

/// Numbered, fenced diagram blocks for section 7.
pub fn render_diagrams<'a>(codes: impl IntoIterator<Item = &'a str>) -> String {
    codes
        .into_iter()
        .enumerate()
        .map(|(i, code)| format!("\n#### Diagram {}\n```mermaid\n{}\n```\n", i + 1, code))
        .collect()
}

/// Additional instruction block appended when the user supplies a prompt.
pub fn custom_prompt_block(prompt: &str) -> String {
    format!("\n\nAdditional user prompt: {prompt}")
}

/// Context block appended for a side-uploaded reference file.
pub fn extra_context_block(text: &str) -> String {
    format!("\n\nExtra context from uploaded file/image:\n{text}\n")
}

/// Prompt asking for exactly one Mermaid block describing a diagram.
pub fn diagram_prompt(description: &str, kind: DiagramKind) -> String {
    format!(
        "Given the following diagram description, generate a detailed Mermaid diagram using type '{kind}'. \
Return ONLY the Mermaid code block (inside ```mermaid ... ```), and NOTHING else.\n\
Diagram description:\n{description}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toc_anchors_match_headers() {
        let toc = table_of_contents();
        assert!(toc.starts_with("1. [Abstract](#1-abstract)\n"));
        assert!(toc.contains("2. [Status of This Memo](#2-status-of-this-memo)\n"));
        assert!(toc.contains("10. [Implementation Plan](#10-implementation-plan)\n"));
        assert!(toc.ends_with("13. [Acknowledgements](#13-acknowledgements)\n"));
        assert_eq!(toc.lines().count(), 13);
    }

    #[test]
    fn prompt_contains_every_section_once() {
        let header = HeaderValues {
            author: "Jane",
            date: "2024-01-01",
            status: "Draft",
            reviewers: "Bob",
            topic: "Caching",
        };
        let p = rfc_prompt(header, "", "body");
        for (i, title) in RFC_SECTIONS.iter().enumerate() {
            let h = format!("## {}. {}\n", i + 1, title);
            assert_eq!(p.matches(&h).count(), 1, "header {h:?}");
        }
        assert!(p.contains("# RFC: Caching\n\n**Author:** Jane  \n**Date:** 2024-01-01  \n"));
        assert!(p.contains("**Topic:** Caching\n\n---\n\n## Table of Contents"));
        assert!(p.contains("Extracted document text:\nbody\n\n- Fill each section"));
        assert!(p.ends_with("Never provide commentary outside the Markdown.\n"));
    }

    #[test]
    fn diagrams_land_in_section_seven() {
        let header = HeaderValues {
            author: "a",
            date: "d",
            status: "s",
            reviewers: "r",
            topic: "t",
        };
        let d = render_diagrams(["A-->B", "C-->D"]);
        let p = rfc_prompt(header, &d, "");
        let s7 = p.find("## 7. Diagrams").unwrap();
        let s8 = p.find("## 8. Alternatives").unwrap();
        let d1 = p.find("#### Diagram 1\n```mermaid\nA-->B\n```").unwrap();
        let d2 = p.find("#### Diagram 2\n```mermaid\nC-->D\n```").unwrap();
        assert!(s7 < d1 && d1 < d2 && d2 < s8);
    }

    #[test]
    fn diagram_prompt_names_kind() {
        let p = diagram_prompt("a box", DiagramKind::EntityRelationship);
        assert!(p.contains("type 'entity_relationship'"));
        assert!(p.ends_with("Diagram description:\na box\n"));
    }
}
