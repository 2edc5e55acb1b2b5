//! Drafting and review sessions.
//!
//! A session holds everything one user action needs from the previous one:
//! the loaded source, OCR text, diagrams, metadata and the current Markdown.
//! Each method checks the session [`Stage`] first and returns
//! [`RfcError::InvalidTransition`] when called out of order, so a caller
//! cannot draft before extracting or export before drafting.
//!
//! ## Draft flow
//!
//! ```text
//! New ──extract──▶ Extracted ──resolve_diagrams──▶ DiagramsResolved ──draft──▶ Drafted
//!                                                                 ▲           │  ▲
//!                                                      regenerate │     edit  ▼  │ regenerate
//!                                                                 └────── Editing
//! Drafted/Editing ──upload──▶ Exported
//! ```
//!
//! ## Review flow
//!
//! ```text
//! LoadedForReview ──parse_metadata──▶ MetadataParsed | MetadataNotFound ──comment──▶ Commented
//!                                                                        ──upload──▶ Exported
//! ```
//!
//! Sessions take `&mut self` for every action; one action runs at a time.

use crate::config::{DiagramKind, RfcConfig};
use crate::error::{Outcome, RfcError};
use crate::fetch::{HttpFetch, ReqwestFetcher};
use crate::model::{
    file_stem, DiagramSource, DiagramSpec, ExtractedDocument, Metadata, RfcDocument, SourceFile,
};
use crate::pipeline::diagram;
use crate::pipeline::document::{self, RfcRequest};
use crate::pipeline::extract::{self, SourceKind};
use crate::pipeline::harvest;
use crate::pipeline::llm::{AgentClient, LlmAgent};
use crate::pipeline::metadata;
use crate::pipeline::ocr::{OcrEngine, TesseractOcr};
use crate::storage::ObjectStore;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

// ── Collaborators ────────────────────────────────────────────────────────

/// The collaborators and configuration a session works with.
#[derive(Clone)]
pub struct Toolkit {
    pub agent: Arc<dyn AgentClient>,
    pub fetcher: Arc<dyn HttpFetch>,
    pub ocr: Arc<dyn OcrEngine>,
    pub config: RfcConfig,
}

impl fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolkit")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Toolkit {
    pub fn new(
        agent: Arc<dyn AgentClient>,
        fetcher: Arc<dyn HttpFetch>,
        ocr: Arc<dyn OcrEngine>,
        config: RfcConfig,
    ) -> Self {
        Self {
            agent,
            fetcher,
            ocr,
            config,
        }
    }

    /// LLM agent from the provider chain, `reqwest` fetcher, Tesseract OCR.
    pub fn from_config(config: RfcConfig) -> Result<Self, RfcError> {
        let agent = LlmAgent::from_config(&config)?;
        let fetcher = ReqwestFetcher::new(config.fetch_timeout_secs)?;
        let ocr = TesseractOcr::new(config.tesseract_path.clone());
        Ok(Self::new(Arc::new(agent), Arc::new(fetcher), Arc::new(ocr), config))
    }
}

// ── Stages ───────────────────────────────────────────────────────────────

/// Where a [`DraftSession`] is in its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    New,
    Extracted,
    DiagramsResolved,
    Drafted,
    Editing,
    Regenerating,
    Exported,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::New => "new",
            Stage::Extracted => "extracted",
            Stage::DiagramsResolved => "diagrams_resolved",
            Stage::Drafted => "drafted",
            Stage::Editing => "editing",
            Stage::Regenerating => "regenerating",
            Stage::Exported => "exported",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a [`ReviewSession`] is in its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStage {
    LoadedForReview,
    MetadataParsed,
    MetadataNotFound,
    Commented,
    Exported,
}

impl ReviewStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStage::LoadedForReview => "loaded_for_review",
            ReviewStage::MetadataParsed => "metadata_parsed",
            ReviewStage::MetadataNotFound => "metadata_not_found",
            ReviewStage::Commented => "commented",
            ReviewStage::Exported => "exported",
        }
    }
}

impl fmt::Display for ReviewStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn require<S: Copy + PartialEq + fmt::Display>(
    current: S,
    allowed: &[S],
    action: &'static str,
) -> Result<(), RfcError> {
    if allowed.contains(&current) {
        Ok(())
    } else {
        Err(RfcError::InvalidTransition {
            action,
            stage: current.to_string(),
        })
    }
}

// ── Draft session ────────────────────────────────────────────────────────

/// State of one RFC drafting run.
#[derive(Debug)]
pub struct DraftSession {
    source: Option<SourceFile>,
    extracted: Option<ExtractedDocument>,
    /// Embedded images followed by fetched URL images.
    images: Vec<Vec<u8>>,
    /// OCR result per image; replaced by [`DraftSession::set_description`].
    descriptions: Vec<Outcome<String>>,
    /// Generated Mermaid per image; `None` until generated.
    image_diagrams: Vec<Option<String>>,
    external_diagrams: Vec<String>,
    metadata: Metadata,
    kind: DiagramKind,
    context: Option<String>,
    markdown: Option<String>,
    stage: Stage,
}

impl Default for DraftSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DraftSession {
    pub fn new() -> Self {
        Self {
            source: None,
            extracted: None,
            images: Vec::new(),
            descriptions: Vec::new(),
            image_diagrams: Vec::new(),
            external_diagrams: Vec::new(),
            metadata: Metadata::default(),
            kind: DiagramKind::default(),
            context: None,
            markdown: None,
            stage: Stage::New,
        }
    }

    // ── Accessors ──

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    /// Extracted text, or its placeholder; `None` before extraction.
    pub fn extracted_text(&self) -> Option<&str> {
        self.extracted.as_ref().map(ExtractedDocument::text)
    }

    pub fn images(&self) -> &[Vec<u8>] {
        &self.images
    }

    /// OCR text (or placeholder) per image.
    pub fn descriptions(&self) -> impl Iterator<Item = &str> {
        self.descriptions.iter().map(Outcome::text)
    }

    pub fn external_diagrams(&self) -> &[String] {
        &self.external_diagrams
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn diagram_kind(&self) -> DiagramKind {
        self.kind
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn markdown(&self) -> Option<&str> {
        self.markdown.as_deref()
    }

    /// The current draft, once there is one.
    pub fn document(&self) -> Option<RfcDocument> {
        self.markdown.clone().map(|markdown| RfcDocument { markdown })
    }

    /// Diagrams for section 7: generated image diagrams, then external ones.
    pub fn diagrams(&self) -> Vec<DiagramSpec> {
        let images = self
            .image_diagrams
            .iter()
            .enumerate()
            .filter_map(|(i, code)| {
                code.as_ref().map(|c| DiagramSpec {
                    kind: self.kind,
                    code: c.clone(),
                    source: DiagramSource::Image(i),
                })
            });
        let external = self.external_diagrams.iter().map(|c| DiagramSpec {
            kind: self.kind,
            code: c.clone(),
            source: DiagramSource::External,
        });
        images.chain(external).collect()
    }

    // ── Load & extract ──

    /// Start over with a new source document.
    pub fn load_source(&mut self, source: SourceFile) {
        info!("Loaded source '{}' ({} bytes)", source.name, source.bytes.len());
        let metadata = std::mem::take(&mut self.metadata);
        let kind = self.kind;
        *self = Self::new();
        self.metadata = metadata;
        self.kind = kind;
        self.source = Some(source);
    }

    /// Extract text and images, resolve harvested links and OCR every image.
    pub async fn extract(&mut self, toolkit: &Toolkit) -> Result<(), RfcError> {
        require(self.stage, &[Stage::New, Stage::Extracted], "extract")?;
        let source = self.source.as_ref().ok_or(RfcError::InvalidTransition {
            action: "extract without a source",
            stage: self.stage.to_string(),
        })?;

        let extracted = extract::extract(&source.bytes, &source.name).await;
        let links = harvest::harvest(extracted.text());
        let external = harvest::resolve_external(&links, toolkit.fetcher.as_ref()).await;

        let mut images = extracted.images.clone();
        images.extend(external.images);

        let mut descriptions = Vec::with_capacity(images.len());
        for (i, img) in images.iter().enumerate() {
            let text = toolkit.ocr.recognize(img).await;
            debug!("Image {}: OCR {} chars (ok={})", i + 1, text.text().len(), text.is_ok());
            descriptions.push(text);
        }

        if let Some(ref cb) = toolkit.config.progress_callback {
            cb.on_extracted(extracted.text().len(), images.len(), external.diagrams.len());
        }
        info!(
            "Extracted '{}': {} chars, {} images, {} external diagrams",
            source.name,
            extracted.text().len(),
            images.len(),
            external.diagrams.len()
        );

        self.image_diagrams = vec![None; images.len()];
        self.images = images;
        self.descriptions = descriptions;
        self.external_diagrams = external.diagrams;
        self.extracted = Some(extracted);
        self.stage = Stage::Extracted;
        Ok(())
    }

    // ── Form inputs ──

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    pub fn set_diagram_kind(&mut self, kind: DiagramKind) {
        self.kind = kind;
    }

    /// Replace the OCR text of image `index` (0-indexed).
    pub fn set_description(&mut self, index: usize, text: impl Into<String>) -> Result<(), RfcError> {
        require(
            self.stage,
            &[Stage::Extracted, Stage::DiagramsResolved],
            "edit an image description",
        )?;
        let len = self.descriptions.len();
        let slot = self
            .descriptions
            .get_mut(index)
            .ok_or(RfcError::IndexOutOfRange { index, len })?;
        *slot = Outcome::Ok(text.into());
        Ok(())
    }

    // ── Diagrams ──

    /// Generate the Mermaid diagram of image `index` from its description.
    ///
    /// A description that is a placeholder counts as blank.
    pub async fn generate_diagram(&mut self, index: usize, toolkit: &Toolkit) -> Result<Outcome<String>, RfcError> {
        require(
            self.stage,
            &[Stage::Extracted, Stage::DiagramsResolved],
            "generate a diagram",
        )?;
        let len = self.descriptions.len();
        let description = match self.descriptions.get(index) {
            Some(Outcome::Ok(text)) => text.clone(),
            Some(Outcome::Degraded(_)) => String::new(),
            None => return Err(RfcError::IndexOutOfRange { index, len }),
        };

        let cb = toolkit.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_diagram_start(index + 1, len);
        }
        let out = diagram::describe_diagram(&description, toolkit.agent.as_ref(), &toolkit.config, self.kind).await;
        if let Some(cb) = cb {
            match out.degradation() {
                None => cb.on_diagram_complete(index + 1, len, out.text().len()),
                Some(d) => cb.on_diagram_error(index + 1, len, &d.placeholder),
            }
        }

        self.image_diagrams[index] = Some(out.text().to_string());
        Ok(out)
    }

    /// Generate the diagram of every image in order.
    pub async fn generate_all_diagrams(&mut self, toolkit: &Toolkit) -> Result<Vec<Outcome<String>>, RfcError> {
        let mut out = Vec::with_capacity(self.images.len());
        for i in 0..self.images.len() {
            out.push(self.generate_diagram(i, toolkit).await?);
        }
        Ok(out)
    }

    /// Replace diagram `index` of [`DraftSession::diagrams`]'s numbering:
    /// images first (0..images), then external diagrams.
    pub fn set_diagram_code(&mut self, index: usize, code: impl Into<String>) -> Result<(), RfcError> {
        require(
            self.stage,
            &[Stage::Extracted, Stage::DiagramsResolved],
            "edit a diagram",
        )?;
        let n_images = self.image_diagrams.len();
        let len = n_images + self.external_diagrams.len();
        if index < n_images {
            self.image_diagrams[index] = Some(code.into());
        } else if index < len {
            self.external_diagrams[index - n_images] = code.into();
        } else {
            return Err(RfcError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    /// Freeze the diagram list for drafting.
    pub fn resolve_diagrams(&mut self) -> Result<Vec<DiagramSpec>, RfcError> {
        require(
            self.stage,
            &[Stage::Extracted, Stage::DiagramsResolved],
            "resolve diagrams",
        )?;
        self.stage = Stage::DiagramsResolved;
        Ok(self.diagrams())
    }

    // ── Draft ──

    /// Ask the agent for the first RFC draft.
    pub async fn draft(&mut self, toolkit: &Toolkit) -> Result<Outcome<String>, RfcError> {
        require(self.stage, &[Stage::DiagramsResolved], "draft")?;
        let request = RfcRequest {
            doc_text: self.extracted_text().unwrap_or_default().to_string(),
            diagrams: self.diagrams().into_iter().map(|d| d.code).collect(),
            metadata: self.metadata.clone(),
            kind: self.kind,
            custom_prompt: None,
            extra_context: None,
        };

        let out = document::build_rfc(&request, toolkit.agent.as_ref(), &toolkit.config).await;
        self.markdown = Some(out.text().to_string());
        self.stage = Stage::Drafted;
        Ok(out)
    }

    /// Replace the draft with the user's edited Markdown.
    pub fn edit(&mut self, markdown: impl Into<String>) -> Result<(), RfcError> {
        require(
            self.stage,
            &[Stage::Drafted, Stage::Editing, Stage::Exported],
            "edit",
        )?;
        self.markdown = Some(markdown.into());
        self.stage = Stage::Editing;
        Ok(())
    }

    /// Attach a reference file for the next regeneration.
    ///
    /// Images are OCR'd; other files contribute their extracted text.
    pub async fn attach_context(&mut self, file: SourceFile, toolkit: &Toolkit) -> Result<&str, RfcError> {
        require(
            self.stage,
            &[Stage::Drafted, Stage::Editing],
            "attach context",
        )?;
        let text = if SourceKind::from_name(&file.name).is_image() {
            toolkit.ocr.recognize(&file.bytes).await.into_text()
        } else {
            extract::extract_text(&file.bytes, &file.name).await.into_text()
        };
        info!("Attached context '{}' ({} chars)", file.name, text.len());
        Ok(self.context.insert(text).as_str())
    }

    /// Redraft from the current Markdown.
    ///
    /// Every image is OCR'd again (keeping the stored text when the new
    /// result is blank or a placeholder) and its diagram regenerated with
    /// `kind`. External diagrams keep their edited code.
    pub async fn regenerate(
        &mut self,
        prompt: Option<&str>,
        kind: DiagramKind,
        toolkit: &Toolkit,
    ) -> Result<Outcome<String>, RfcError> {
        require(
            self.stage,
            &[Stage::Drafted, Stage::Editing],
            "regenerate",
        )?;
        self.stage = Stage::Regenerating;
        self.kind = kind;

        let total = self.images.len();
        for i in 0..total {
            let fresh = toolkit.ocr.recognize(&self.images[i]).await;
            if matches!(&fresh, Outcome::Ok(t) if !t.trim().is_empty()) {
                self.descriptions[i] = fresh;
            }
            let description = match &self.descriptions[i] {
                Outcome::Ok(t) => t.clone(),
                Outcome::Degraded(_) => String::new(),
            };

            if let Some(ref cb) = toolkit.config.progress_callback {
                cb.on_diagram_start(i + 1, total);
            }
            let code = diagram::describe_diagram(&description, toolkit.agent.as_ref(), &toolkit.config, kind).await;
            if let Some(ref cb) = toolkit.config.progress_callback {
                match code.degradation() {
                    None => cb.on_diagram_complete(i + 1, total, code.text().len()),
                    Some(d) => cb.on_diagram_error(i + 1, total, &d.placeholder),
                }
            }
            self.image_diagrams[i] = Some(code.into_text());
        }

        let request = RfcRequest {
            doc_text: self.markdown.clone().unwrap_or_default(),
            diagrams: self.diagrams().into_iter().map(|d| d.code).collect(),
            metadata: self.metadata.clone(),
            kind,
            custom_prompt: prompt.map(str::to_string),
            extra_context: self.context.clone(),
        };

        let out = document::build_rfc(&request, toolkit.agent.as_ref(), &toolkit.config).await;
        self.markdown = Some(out.text().to_string());
        self.stage = Stage::Drafted;
        Ok(out)
    }

    // ── Export ──

    /// File name and bytes of the current draft: `<stem>_RFC.md`.
    pub fn export(&self) -> Result<(String, Vec<u8>), RfcError> {
        require(
            self.stage,
            &[Stage::Drafted, Stage::Editing, Stage::Exported],
            "export",
        )?;
        let stem = self.source.as_ref().map(SourceFile::stem).unwrap_or("rfc");
        let markdown = self.markdown.clone().unwrap_or_default();
        Ok((format!("{stem}_RFC.md"), markdown.into_bytes()))
    }

    /// Upload the draft; `key` defaults to the export name.
    pub async fn upload(&mut self, store: &dyn ObjectStore, bucket: &str, key: Option<&str>) -> Result<String, RfcError> {
        let (name, bytes) = self.export()?;
        let key = key.map(str::to_string).unwrap_or(name);
        store.put_object(bucket, &key, bytes).await?;
        self.stage = Stage::Exported;
        Ok(key)
    }
}

// ── Review session ───────────────────────────────────────────────────────

/// Where reviewer comments go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentPlacement {
    #[default]
    Append,
    Prepend,
}

/// Add a "Manager Comments" section to `markdown`.
pub fn apply_comment(markdown: &str, comment: &str, placement: CommentPlacement) -> String {
    match placement {
        CommentPlacement::Append => format!("{markdown}\n\n---\n## Manager Comments\n{comment}\n"),
        CommentPlacement::Prepend => format!("## Manager Comments\n{comment}\n\n---\n{markdown}"),
    }
}

/// State of one review of an existing RFC.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    bucket: Option<String>,
    key: String,
    original: String,
    metadata: Option<Metadata>,
    updated: Option<Metadata>,
    comment: Option<(String, CommentPlacement)>,
    stage: ReviewStage,
}

impl ReviewSession {
    /// Keys in `bucket` that look like RFCs (`.md`, any case).
    pub async fn list_rfc_files(store: &dyn ObjectStore, bucket: &str) -> Result<Vec<String>, RfcError> {
        let keys = store.list_objects(bucket).await?;
        Ok(keys
            .into_iter()
            .filter(|k| k.to_lowercase().ends_with(".md"))
            .collect())
    }

    /// Load `key` from `bucket` and read its header.
    ///
    /// Invalid UTF-8 is replaced, not rejected.
    pub async fn load(store: &dyn ObjectStore, bucket: &str, key: &str) -> Result<Self, RfcError> {
        let bytes = store.get_object(bucket, key).await?;
        let mut session = Self::from_markdown(key, String::from_utf8_lossy(&bytes).into_owned());
        session.bucket = Some(bucket.to_string());
        session.parse_metadata()?;
        Ok(session)
    }

    /// Review Markdown that is already in memory; `name` drives the export name.
    ///
    /// The session starts in [`ReviewStage::LoadedForReview`]; call
    /// [`ReviewSession::parse_metadata`] next.
    pub fn from_markdown(name: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            bucket: None,
            key: name.into(),
            original: markdown.into(),
            metadata: None,
            updated: None,
            comment: None,
            stage: ReviewStage::LoadedForReview,
        }
    }

    pub fn stage(&self) -> ReviewStage {
        self.stage
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Header as found in the loaded document.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Read the header of the loaded document.
    pub fn parse_metadata(&mut self) -> Result<Option<&Metadata>, RfcError> {
        require(
            self.stage,
            &[ReviewStage::LoadedForReview],
            "parse metadata",
        )?;
        self.metadata = metadata::parse(&self.original);
        self.stage = if self.metadata.is_some() {
            ReviewStage::MetadataParsed
        } else {
            info!("No metadata header in '{}'", self.key);
            ReviewStage::MetadataNotFound
        };
        Ok(self.metadata.as_ref())
    }

    /// Header values to write into the final document.
    ///
    /// Has no effect on the text when the document has no header.
    pub fn set_metadata(&mut self, metadata: Metadata) -> Result<(), RfcError> {
        require(
            self.stage,
            &[
                ReviewStage::MetadataParsed,
                ReviewStage::MetadataNotFound,
                ReviewStage::Commented,
            ],
            "set metadata",
        )?;
        self.updated = Some(metadata);
        Ok(())
    }

    /// Record a reviewer comment; a blank comment is ignored.
    pub fn comment(&mut self, text: &str, placement: CommentPlacement) -> Result<(), RfcError> {
        require(
            self.stage,
            &[
                ReviewStage::MetadataParsed,
                ReviewStage::MetadataNotFound,
                ReviewStage::Commented,
            ],
            "comment",
        )?;
        if text.trim().is_empty() {
            debug!("Ignoring blank review comment");
            return Ok(());
        }
        self.comment = Some((text.to_string(), placement));
        self.stage = ReviewStage::Commented;
        Ok(())
    }

    /// Loaded Markdown with the new header values and the comment applied.
    pub fn final_markdown(&self) -> String {
        let md = match &self.updated {
            Some(m) => metadata::update(&self.original, m),
            None => self.original.clone(),
        };
        match &self.comment {
            Some((c, placement)) => apply_comment(&md, c, *placement),
            None => md,
        }
    }

    /// `<stem>_with_comments.md` and the final Markdown bytes.
    pub fn export(&self) -> Result<(String, Vec<u8>), RfcError> {
        require(
            self.stage,
            &[
                ReviewStage::MetadataParsed,
                ReviewStage::MetadataNotFound,
                ReviewStage::Commented,
                ReviewStage::Exported,
            ],
            "export",
        )?;
        let name = if self.key.is_empty() {
            "rfc_with_comments.md".to_string()
        } else {
            format!("{}_with_comments.md", file_stem(&self.key))
        };
        Ok((name, self.final_markdown().into_bytes()))
    }

    /// Upload next to the source object.
    pub async fn upload(&mut self, store: &dyn ObjectStore) -> Result<String, RfcError> {
        let bucket = self.bucket.clone().ok_or_else(|| {
            RfcError::InvalidConfig("review was not loaded from a bucket; use upload_to".into())
        })?;
        self.upload_to(store, &bucket).await
    }

    pub async fn upload_to(&mut self, store: &dyn ObjectStore, bucket: &str) -> Result<String, RfcError> {
        let (key, bytes) = self.export()?;
        store.put_object(bucket, &key, bytes).await?;
        self.stage = ReviewStage::Exported;
        Ok(key)
    }
}
