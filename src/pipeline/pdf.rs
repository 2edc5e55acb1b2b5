//! PDF reading via pdfium: page text and embedded raster images.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! The async wrappers here move the work onto tokio's blocking pool.
//!
//! ## Library binding
//!
//! pdfium is a shared library loaded at run time. [`bind`] looks in
//! `PDFIUM_LIB_PATH` (a directory or the library file itself), then the
//! working directory, then the system library path. When none works the
//! caller gets [`PdfError::Unavailable`] and degrades to a placeholder
//! instead of panicking the way `Pdfium::default()` does.

use image::ImageFormat;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a PDF could not be read.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The pdfium shared library could not be loaded.
    #[error("{0}")]
    Unavailable(String),

    /// pdfium rejected the document.
    #[error("corrupt or unreadable PDF: {0}")]
    Corrupt(String),

    /// The blocking task panicked.
    #[error("PDF task failed: {0}")]
    Task(String),
}

/// Load the pdfium library.
pub fn bind() -> Result<Pdfium, PdfError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
        let p = PathBuf::from(p);
        if p.is_dir() {
            candidates.push(Pdfium::pdfium_platform_library_name_at_path(&p));
        } else {
            candidates.push(p);
        }
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path("./"));

    let mut last_err = String::from("no candidate paths");
    for path in &candidates {
        match Pdfium::bind_to_library(path) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", path.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => last_err = format!("{}: {:?}", path.display(), e),
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PdfError::Unavailable(format!("pdfium library not found ({last_err}; system: {e:?})")))
}

/// Text of every page that has any, joined with `\n`. Blocking.
pub fn read_text_blocking(bytes: &[u8]) -> Result<String, PdfError> {
    let pdfium = bind()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| PdfError::Corrupt(format!("{e:?}")))?;

    let mut pages = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        match page.text() {
            Ok(text) => {
                let t = text.all();
                if !t.trim().is_empty() {
                    pages.push(t);
                }
            }
            Err(e) => warn!("PDF page {}: no text layer ({:?})", idx + 1, e),
        }
    }

    info!("PDF text: {} of {} pages", pages.len(), document.pages().len());
    Ok(pages.join("\n"))
}

/// Every embedded image object, PNG-encoded, in page order. Blocking.
pub fn read_images_blocking(bytes: &[u8]) -> Result<Vec<Vec<u8>>, PdfError> {
    let pdfium = bind()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| PdfError::Corrupt(format!("{e:?}")))?;

    let mut images = Vec::new();
    for (idx, page) in document.pages().iter().enumerate() {
        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let raw = match image_object.get_raw_image() {
                Ok(img) => img,
                Err(e) => {
                    warn!("PDF page {}: image object unreadable ({:?})", idx + 1, e);
                    continue;
                }
            };
            let mut buf = Vec::new();
            match raw.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png) {
                Ok(()) => images.push(buf),
                Err(e) => warn!("PDF page {}: PNG encoding failed ({})", idx + 1, e),
            }
        }
    }

    debug!("PDF: {} embedded images", images.len());
    Ok(images)
}

/// Async wrapper around [`read_text_blocking`].
pub async fn read_text(bytes: Vec<u8>) -> Result<String, PdfError> {
    tokio::task::spawn_blocking(move || read_text_blocking(&bytes))
        .await
        .map_err(|e| PdfError::Task(e.to_string()))?
}

/// Async wrapper around [`read_images_blocking`].
pub async fn read_images(bytes: Vec<u8>) -> Result<Vec<Vec<u8>>, PdfError> {
    tokio::task::spawn_blocking(move || read_images_blocking(&bytes))
        .await
        .map_err(|e| PdfError::Task(e.to_string()))?
}
