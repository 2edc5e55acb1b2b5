//! Metadata header codec: read and rewrite the five-field RFC header.
//!
//! The header is the block the RFC prompt asks the agent to reproduce:
//!
//! ```text
//! **Author:** Jane
//! **Date:** 2024-01-01
//! **Status:** Draft
//! **Reviewers:** Bob
//! **Topic:** Caching
//! ```
//!
//! ## Grammar
//!
//! The labels must appear in exactly this order and spelling. Each value runs
//! from the label (after any leading whitespace, Unicode included) to the end
//! of its line, trailing whitespace excluded. Any text may sit between one value's line break and
//! the next label; a label that appears on the same line as the previous
//! value does not count. Only Topic may end at end of input instead of a
//! line break. A candidate `**Author:**` that cannot complete the sequence is
//! abandoned and the search resumes at the next one.
//!
//! [`parse`] and [`update`] share [`locate`], so they agree on what counts as
//! a header: when [`parse`] finds nothing, [`update`] leaves the text alone.

use crate::model::Metadata;
use std::ops::Range;
use tracing::debug;

/// Header labels in required order.
pub const LABELS: [&str; 5] = [
    "**Author:**",
    "**Date:**",
    "**Status:**",
    "**Reviewers:**",
    "**Topic:**",
];

/// Read the metadata header, or `None` when the text does not contain one.
pub fn parse(markdown: &str) -> Option<Metadata> {
    let spans = locate(markdown)?;
    Some(Metadata::from_fields(
        spans.map(|r| markdown[r].to_string()),
    ))
}

/// Rewrite the five header values in place.
///
/// Only the value spans of the first header change; every other byte is kept.
/// Values are [`Metadata::sanitized`] first. Without a header the input is
/// returned unchanged.
pub fn update(markdown: &str, metadata: &Metadata) -> String {
    let Some(spans) = locate(markdown) else {
        debug!("No metadata header found; leaving document unchanged");
        return markdown.to_string();
    };

    let clean = metadata.sanitized();
    let values = clean.fields();
    let mut out = String::with_capacity(markdown.len() + 64);
    let mut cursor = 0;
    for (span, value) in spans.iter().zip(values) {
        out.push_str(&markdown[cursor..span.start]);
        out.push_str(value);
        cursor = span.end;
    }
    out.push_str(&markdown[cursor..]);
    out
}

/// Byte ranges of the five values of the first complete header.
pub fn locate(markdown: &str) -> Option<[Range<usize>; 5]> {
    let mut from = 0;
    while let Some(rel) = markdown[from..].find(LABELS[0]) {
        let author_at = from + rel;
        if let Some(spans) = match_header(markdown, author_at) {
            return Some(spans);
        }
        from = author_at + LABELS[0].len();
    }
    None
}

fn match_header(text: &str, author_at: usize) -> Option<[Range<usize>; 5]> {
    let last = LABELS.len() - 1;
    let mut spans: [Range<usize>; 5] = Default::default();
    let mut label_at = author_at;

    for (i, label) in LABELS.iter().enumerate() {
        let (value, next_line) = read_value(text, label_at + label.len(), i == last)?;
        spans[i] = value;
        if i < last {
            label_at = next_line + text[next_line..].find(LABELS[i + 1])?;
        }
    }
    Some(spans)
}

/// Value span starting at `from`, plus the index just past its line break.
fn read_value(text: &str, from: usize, may_end_at_eof: bool) -> Option<(Range<usize>, usize)> {
    // Skip what `trim` would strip, stopping at a line break.
    let start = text[from..]
        .find(|c: char| !c.is_whitespace() || c == '\r' || c == '\n')
        .map_or(text.len(), |rel| from + rel);

    let (line_end, next_line) = match text[start..].find(['\r', '\n']) {
        Some(rel) => (start + rel, start + rel + 1),
        None if may_end_at_eof => (text.len(), text.len()),
        None => return None,
    };

    let end = start + text[start..line_end].trim_end().len();
    Some((start..end, next_line))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "**Author:** Jane\n**Date:** 2024-01-01\n**Status:** Draft\n**Reviewers:** Bob\n**Topic:** X\n";

    fn jane() -> Metadata {
        Metadata {
            author: "Jane".into(),
            date: "2024-01-01".into(),
            status: "Draft".into(),
            reviewers: "Bob".into(),
            topic: "X".into(),
        }
    }

    #[test]
    fn parses_plain_header() {
        assert_eq!(parse(SAMPLE), Some(jane()));
    }

    #[test]
    fn update_changes_only_status() {
        let m = Metadata {
            status: "Accepted".into(),
            ..jane()
        };
        let updated = update(SAMPLE, &m);
        assert_eq!(updated, SAMPLE.replace("Draft", "Accepted"));
    }

    #[test]
    fn update_with_same_values_is_identity() {
        let doc = "# RFC: Cache\n\n**Author:** Jane  \n**Date:** 2024-01-01  \n**Status:** Draft  \n**Reviewers:** Bob, Ann  \n**Topic:** Cache\n\n---\n\n## 1. Abstract\n";
        let m = parse(doc).unwrap();
        assert_eq!(m.reviewers, "Bob, Ann");
        assert_eq!(update(doc, &m), doc);
    }

    #[test]
    fn reparse_after_update_returns_new_values() {
        let doc = "intro\n**Author:** a\nfiller line\n**Date:** b\n\n**Status:** c\n**Reviewers:** d\n**Topic:** e\nrest";
        let m = Metadata {
            author: "Zed".into(),
            date: "2030-12-31".into(),
            status: "Implemented".into(),
            reviewers: "".into(),
            topic: "New topic".into(),
        };
        let updated = update(doc, &m);
        assert_eq!(parse(&updated), Some(m));
        assert!(updated.starts_with("intro\n"));
        assert!(updated.contains("\nfiller line\n"));
        assert!(updated.ends_with("\nrest"));
    }

    #[test]
    fn tolerates_filler_between_fields() {
        let doc = "**Author:** Jane\nsome note\n<!-- x -->\n**Date:** 2024-01-01\n**Status:** Draft\nmore\n**Reviewers:** Bob\n\n\n**Topic:** X\n";
        assert_eq!(parse(doc), Some(jane()));
    }

    #[test]
    fn wrong_order_is_not_a_header() {
        let doc = "**Date:** 2024-01-01\n**Author:** Jane\n**Status:** Draft\n**Reviewers:** Bob\n**Topic:** X\n";
        assert_eq!(parse(doc), None);
        assert_eq!(update(doc, &jane()), doc);
    }

    #[test]
    fn missing_label_is_not_a_header() {
        let doc = "**Author:** Jane\n**Date:** 2024-01-01\n**Reviewers:** Bob\n**Topic:** X\n";
        assert_eq!(parse(doc), None);
    }

    #[test]
    fn wrong_punctuation_is_not_a_header() {
        let doc = "**Author**: Jane\n**Date:** 2024-01-01\n**Status:** Draft\n**Reviewers:** Bob\n**Topic:** X\n";
        assert_eq!(parse(doc), None);
    }

    #[test]
    fn label_on_value_line_does_not_count() {
        let doc = "**Author:** Jane **Date:** 2024\n**Status:** Draft\n**Reviewers:** Bob\n**Topic:** X\n";
        assert_eq!(parse(doc), None);
    }

    #[test]
    fn crlf_line_endings() {
        let doc = SAMPLE.replace('\n', "\r\n");
        assert_eq!(parse(&doc), Some(jane()));
        let m = Metadata {
            author: "Ann".into(),
            ..jane()
        };
        assert_eq!(update(&doc, &m), doc.replace("Jane", "Ann"));
    }

    #[test]
    fn topic_may_end_at_end_of_input() {
        let doc = SAMPLE.trim_end();
        assert_eq!(parse(doc), Some(jane()));
    }

    #[test]
    fn empty_values_parse_as_empty() {
        let doc = "**Author:**\n**Date:** \n**Status:** Draft\n**Reviewers:**\t\n**Topic:** X\n";
        let m = parse(doc).unwrap();
        assert_eq!(m.author, "");
        assert_eq!(m.date, "");
        assert_eq!(m.reviewers, "");
        assert_eq!(update(doc, &m), doc);
    }

    #[test]
    fn first_complete_candidate_wins() {
        let doc = "**Author:** ghost\nno header here\n\n# RFC\n**Author:** Jane\n**Date:** 2024-01-01\n**Status:** Draft\n**Reviewers:** Bob\n**Topic:** X\n";
        // Filler may contain the second Author line.
        let m = parse(doc).unwrap();
        assert_eq!(m.author, "ghost");
        assert_eq!(m.date, "2024-01-01");
    }

    #[test]
    fn author_without_line_break_is_skipped() {
        let doc = "**Author:** Jane\n**Date:** 2024-01-01\n**Status:** Draft\n**Reviewers:** Bob\n**Topic:** X\n... see **Author:** Jim";
        assert_eq!(parse(doc), Some(jane()));
    }

    #[test]
    fn multiline_value_is_truncated_on_update() {
        let m = Metadata {
            topic: "First\nSecond".into(),
            ..jane()
        };
        let updated = update(SAMPLE, &m);
        assert!(updated.ends_with("**Topic:** First\n"));
        assert_eq!(parse(&updated).unwrap().topic, "First");
    }

    #[test]
    fn unicode_whitespace_round_trips() {
        let doc = "# RFC\n**Author:**\u{a0}Jane\n**Date:**\u{3000}2024-01-01\u{a0}\n**Status:** \u{2003}Draft\n**Reviewers:** Bob\n**Topic:** X\n";
        let m = parse(doc).unwrap();
        assert_eq!(m, jane());
        assert_eq!(update(doc, &m), doc);

        let bumped = Metadata {
            status: "Accepted".into(),
            ..jane()
        };
        assert_eq!(update(doc, &bumped), doc.replace("Draft", "Accepted"));
    }

    #[test]
    fn only_first_header_is_rewritten() {
        let doc = format!("{SAMPLE}\n---\n{SAMPLE}");
        let m = Metadata {
            author: "Ann".into(),
            ..jane()
        };
        let updated = update(&doc, &m);
        assert_eq!(updated.matches("**Author:** Ann").count(), 1);
        assert_eq!(updated.matches("**Author:** Jane").count(), 1);
    }
}
