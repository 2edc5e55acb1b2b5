//! Pipeline stages for drafting an RFC from a source document.
//!
//! Each submodule implements one step and knows nothing about sessions;
//! [`crate::session`] strings them together and keeps the state between
//! user actions.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ harvest ──▶ ocr ──▶ diagram ──▶ document
//! (path/URL/s3) (docx/pdf) (links)  (images) (mermaid)  (RFC prompt)
//!                                                          │
//!                                              metadata ◀──┘ (review)
//! ```
//!
//! 1. [`input`]    resolve a path, URL or `s3://` object to named bytes
//! 2. [`extract`]  text and embedded images by extension; [`docx`] and
//!    [`pdf`] do the format work in `spawn_blocking`
//! 3. [`harvest`]  image, draw.io and mermaid.live links plus inline
//!    Mermaid blocks; fetches what it finds
//! 4. [`ocr`]      image → text via Tesseract or a vision model
//! 5. [`diagram`]  description → Mermaid through the agent
//! 6. [`document`] the 13-section draft prompt and the agent call
//! 7. [`metadata`] read and rewrite the RFC header during review
//!
//! [`llm`] is shared by every agent call (retry, backoff, timeout) and
//! [`encode`] prepares images for vision requests.

pub mod diagram;
pub mod document;
pub mod docx;
pub mod encode;
pub mod extract;
pub mod harvest;
pub mod input;
pub mod llm;
pub mod metadata;
pub mod ocr;
pub mod pdf;
