//! DOCX reading: paragraph text and embedded image parts.
//!
//! A `.docx` file is a zip package. Body text lives in `word/document.xml`
//! as `w:p` paragraphs made of `w:r` runs; embedded pictures are package
//! parts referenced from `word/_rels/document.xml.rels`. Both are read with
//! a streaming `quick-xml` reader, so large documents are never built into
//! a tree.
//!
//! Everything here is blocking; [`super::extract`] calls it from
//! `spawn_blocking`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use thiserror::Error;
use tracing::{debug, warn};
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";

/// Largest up-front buffer reservation for a part; bigger parts grow as read.
const MAX_PREALLOC: usize = 1 << 20;

/// Why a DOCX package could not be read.
#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a zip package: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed XML in {part}: {source}")]
    Xml {
        part: &'static str,
        #[source]
        source: quick_xml::Error,
    },

    #[error("could not read package part: {0}")]
    Io(#[from] std::io::Error),
}

type Package<'a> = ZipArchive<Cursor<&'a [u8]>>;

fn open(bytes: &[u8]) -> Result<Package<'_>, DocxError> {
    Ok(ZipArchive::new(Cursor::new(bytes))?)
}

fn read_part(package: &mut Package<'_>, name: &str) -> Result<Vec<u8>, DocxError> {
    let mut part = package.by_name(name)?;
    let mut buf = Vec::with_capacity(initial_capacity(part.size()));
    part.read_to_end(&mut buf)?;
    Ok(buf)
}

/// The declared size comes from the zip header and is not trusted.
fn initial_capacity(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOC, |n| n.min(MAX_PREALLOC))
}

// ── Text ─────────────────────────────────────────────────────────────────

/// Text of every body-level paragraph, in document order.
///
/// Paragraphs inside tables (`w:tbl`) and text boxes (`w:txbxContent`) are
/// left out, text and all.
pub fn paragraphs(bytes: &[u8]) -> Result<Vec<String>, DocxError> {
    let mut package = open(bytes)?;
    let xml = read_part(&mut package, DOCUMENT_PART)?;
    parse_paragraphs(&xml).map_err(|source| DocxError::Xml {
        part: DOCUMENT_PART,
        source,
    })
}

/// Paragraph texts joined with `\n`.
pub fn read_text(bytes: &[u8]) -> Result<String, DocxError> {
    Ok(paragraphs(bytes)?.join("\n"))
}

fn parse_paragraphs(xml: &[u8]) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut out = Vec::new();
    let mut open_paragraphs: Vec<String> = Vec::new();
    let mut run_depth = 0usize;
    let mut in_text = false;
    // Depth inside tables and text boxes; everything there is skipped.
    let mut hidden_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if is_hidden_container(e.name().as_ref()) => hidden_depth += 1,
            Event::End(e) if is_hidden_container(e.name().as_ref()) => {
                hidden_depth = hidden_depth.saturating_sub(1)
            }
            Event::Eof => break,
            _ if hidden_depth > 0 => {}
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => open_paragraphs.push(String::new()),
                b"w:r" => run_depth += 1,
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => out.push(String::new()),
                b"w:tab" if run_depth > 0 => push_to(&mut open_paragraphs, "\t"),
                b"w:br" | b"w:cr" if run_depth > 0 => push_to(&mut open_paragraphs, "\n"),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape()?;
                push_to(&mut open_paragraphs, &text);
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    if let Some(p) = open_paragraphs.pop() {
                        out.push(p);
                    }
                }
                b"w:r" => run_depth = run_depth.saturating_sub(1),
                b"w:t" => in_text = false,
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    debug!("DOCX: {} paragraphs", out.len());
    Ok(out)
}

fn is_hidden_container(name: &[u8]) -> bool {
    matches!(name, b"w:tbl" | b"w:txbxContent")
}

fn push_to(open: &mut [String], s: &str) {
    if let Some(p) = open.last_mut() {
        p.push_str(s);
    }
}

// ── Images ───────────────────────────────────────────────────────────────

/// Bytes of every embedded image part, in relationship order.
///
/// Relationships whose type or target mentions `image` are taken; links to
/// external files (`TargetMode="External"`) are skipped. A relationship
/// whose part is missing from the package is skipped with a warning.
pub fn read_images(bytes: &[u8]) -> Result<Vec<Vec<u8>>, DocxError> {
    let mut package = open(bytes)?;
    let rels = match read_part(&mut package, RELS_PART) {
        Ok(r) => r,
        Err(DocxError::Zip(zip::result::ZipError::FileNotFound)) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let targets = parse_image_targets(&rels).map_err(|source| DocxError::Xml {
        part: RELS_PART,
        source,
    })?;

    let mut images = Vec::with_capacity(targets.len());
    for target in targets {
        let name = part_name(&target);
        match read_part(&mut package, &name) {
            Ok(blob) => images.push(blob),
            Err(e) => warn!("DOCX image part '{}' unreadable: {}", name, e),
        }
    }
    debug!("DOCX: {} embedded images", images.len());
    Ok(images)
}

fn parse_image_targets(xml: &[u8]) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut targets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let Some(target) = image_target(&e)? {
                    targets.push(target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(targets)
}

fn image_target(e: &BytesStart<'_>) -> Result<Option<String>, quick_xml::Error> {
    let mut kind = String::new();
    let mut target = String::new();
    let mut external = false;

    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"Type" => kind = value.into_owned(),
            b"Target" => target = value.into_owned(),
            b"TargetMode" => external = value.eq_ignore_ascii_case("External"),
            _ => {}
        }
    }

    let is_image = kind.contains("image") || target.contains("image");
    Ok((is_image && !external && !target.is_empty()).then_some(target))
}

/// Resolve a relationship target to a package part name.
///
/// Targets are relative to `word/` unless they start with `/`.
fn part_name(target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{target}"),
    };

    let mut segments: Vec<&str> = Vec::new();
    for seg in joined.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn package(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in parts {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:body>
<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Cache</w:t></w:r><w:r><w:t xml:space="preserve"> design &amp; plan</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:t>Box:</w:t><w:drawing><wps:txbx><w:txbxContent><w:p><w:r><w:t>boxed</w:t></w:r></w:p></w:txbxContent></wps:txbx></w:drawing></w:r><w:r><w:t> end</w:t></w:r></w:p>
</w:body>
</w:document>"#;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="https://example.com/x.png" TargetMode="External"/>
<Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="/word/media/image2.jpeg"/>
</Relationships>"#;

    #[test]
    fn extracts_paragraphs_in_order() {
        let bytes = package(&[(DOCUMENT_PART, DOC.as_bytes())]);
        let paras = paragraphs(&bytes).unwrap();
        assert_eq!(paras, vec!["Cache design & plan", "", "a\tb\nc", "Box: end"]);
        assert_eq!(read_text(&bytes).unwrap(), "Cache design & plan\n\na\tb\nc\nBox: end");
    }

    #[test]
    fn nested_tables_are_skipped_whole() {
        let doc = r#"<w:document xmlns:w="w"><w:body>
<w:p><w:r><w:t>before</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:tbl><w:tr><w:tc><w:p><w:r><w:t>inner</w:t></w:r></w:p></w:tc></w:tr></w:tbl><w:p><w:r><w:t>outer</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:t>after</w:t></w:r></w:p>
</w:body></w:document>"#;
        let bytes = package(&[(DOCUMENT_PART, doc.as_bytes())]);
        assert_eq!(paragraphs(&bytes).unwrap(), vec!["before", "after"]);
    }

    #[test]
    fn large_parts_are_read_past_the_reservation() {
        let big = vec![b'x'; MAX_PREALLOC * 2 + 7];
        let bytes = package(&[("word/media/big.png", &big[..])]);
        let mut archive = open(&bytes).unwrap();
        assert_eq!(read_part(&mut archive, "word/media/big.png").unwrap().len(), big.len());
    }

    #[test]
    fn declared_size_does_not_drive_allocation() {
        assert_eq!(initial_capacity(10), 10);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOC);
        assert_eq!(initial_capacity(MAX_PREALLOC as u64 + 1), MAX_PREALLOC);
    }

    #[test]
    fn extracts_embedded_images_only() {
        let bytes = package(&[
            (DOCUMENT_PART, DOC.as_bytes()),
            (RELS_PART, RELS.as_bytes()),
            ("word/media/image1.png", &b"png-bytes"[..]),
            ("word/media/image2.jpeg", &b"jpeg-bytes"[..]),
        ]);
        let images = read_images(&bytes).unwrap();
        assert_eq!(images, vec![b"png-bytes".to_vec(), b"jpeg-bytes".to_vec()]);
    }

    #[test]
    fn missing_rels_means_no_images() {
        let bytes = package(&[(DOCUMENT_PART, DOC.as_bytes())]);
        assert!(read_images(&bytes).unwrap().is_empty());
    }

    #[test]
    fn missing_image_part_is_skipped() {
        let bytes = package(&[(DOCUMENT_PART, DOC.as_bytes()), (RELS_PART, RELS.as_bytes())]);
        assert!(read_images(&bytes).unwrap().is_empty());
    }

    #[test]
    fn not_a_zip_is_an_error() {
        assert!(matches!(read_text(b"plain text"), Err(DocxError::Zip(_))));
        assert!(read_images(b"plain text").is_err());
    }

    #[test]
    fn part_names_resolve_relative_to_word() {
        assert_eq!(part_name("media/image1.png"), "word/media/image1.png");
        assert_eq!(part_name("../media/x.png"), "media/x.png");
        assert_eq!(part_name("/word/media/y.png"), "word/media/y.png");
    }
}
