//! CLI binary for edgequake-rfc.
//!
//! A thin shim over the library crate that maps CLI flags to `RfcConfig`,
//! runs a draft or review session and prints the result.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgequake_rfc::pipeline::input;
use edgequake_rfc::{
    draft_rfc, inspect, write_atomic, AgentConfig, CommentPlacement, Credentials, DiagramKind,
    DraftOptions, DraftProgressCallback, FsObjectStore, LlmAgent, Metadata, NoOcr, ObjectStore,
    OcrEngine, ProgressCallback, ReqwestFetcher, ReviewSession, RfcConfig, TesseractOcr, Toolkit,
    VisionOcr, STATUS_CHOICES,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Spinner with one log line per diagram.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.set_message("reading source…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if errors > 0 {
            eprintln!("{} {} diagrams fell back to a placeholder", cyan("⚠"), errors);
        }
    }
}

impl DraftProgressCallback for CliProgressCallback {
    fn on_extracted(&self, text_len: usize, images: usize, diagrams: usize) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold("Source extracted"),
            dim(&format!(
                "{text_len} chars, {images} images, {diagrams} external diagrams"
            ))
        ));
    }

    fn on_diagram_start(&self, index: usize, total: usize) {
        self.bar.set_prefix("Diagrams");
        self.bar.set_message(format!("image {index}/{total}"));
    }

    fn on_diagram_complete(&self, index: usize, total: usize, code_len: usize) {
        self.bar.println(format!(
            "  {} Diagram {:>2}/{:<2}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{code_len:>5} chars")),
        ));
    }

    fn on_diagram_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Diagram {:>2}/{:<2}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
        ));
    }

    fn on_draft_start(&self, prompt_len: usize) {
        self.bar.set_prefix("Drafting");
        self.bar.set_message(format!("prompt {prompt_len} chars"));
    }

    fn on_draft_complete(&self, markdown_len: usize) {
        self.bar.println(format!(
            "  {} Draft  {}",
            green("✓"),
            dim(&format!("{markdown_len} chars"))
        ));
    }

    fn on_draft_error(&self, error: &str) {
        self.bar.println(format!("  {} Draft  {}", red("✗"), red(error)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Draft an RFC from a Word document (stdout)
  rfc-agent draft design.docx --author "Jane Doe" --topic "Caching layer"

  # Draft to a file with sequence diagrams
  rfc-agent draft notes.pdf --diagram-kind sequence -o cache_RFC.md

  # Regenerate once with a custom prompt and a whiteboard photo
  rfc-agent draft notes.md --prompt "Focus on failure modes" --context board.png

  # Draft from the object store and upload the result
  rfc-agent --store-root ./store draft s3://docs/design.docx --upload rfcs

  # Review: accept an RFC and append a comment
  rfc-agent review rfcs design_RFC.md --status Accepted --comment "Ship it" --upload

  # See what extraction finds (no API key needed)
  rfc-agent inspect design.docx --json

  # List buckets, then RFCs in a bucket
  rfc-agent list
  rfc-agent list rfcs

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RFC_STORE_ROOT          Directory backing the object store
  RFC_AGENT_ID            Remote agent id (also RFC_AGENT_ALIAS_ID, RFC_REGION)
  RFC_ACCESS_KEY          Agent access key (with RFC_SECRET_KEY)
  PDFIUM_LIB_PATH         Directory or file of an existing libpdfium
"#;

/// Draft and review RFC design documents with an AI agent.
#[derive(Parser, Debug)]
#[command(
    name = "rfc-agent",
    version,
    about = "Draft and review RFC design documents with an AI agent",
    long_about = "Turn DOCX, PDF, Markdown or image sources into a 13-section RFC in Markdown, \
with Mermaid diagrams generated from embedded images and harvested links. Review existing RFCs \
by rewriting their metadata header and adding comments.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory backing the object store (one sub-directory per bucket).
    #[arg(long, global = true, env = "RFC_STORE_ROOT", default_value = "rfc-store")]
    store_root: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "RFC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "RFC_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "RFC_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draft an RFC from a local file, URL or s3://bucket/key.
    Draft(DraftArgs),
    /// Rewrite the header of a stored RFC and add reviewer comments.
    Review(ReviewArgs),
    /// Show what extraction and link harvesting find in a source.
    Inspect(InspectArgs),
    /// List buckets, or the RFC files in one bucket.
    List {
        /// Bucket to list; all buckets when omitted.
        bucket: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
struct MetadataArgs {
    #[arg(long)]
    author: Option<String>,

    /// Date (YYYY-MM-DD); today when left blank in a draft.
    #[arg(long)]
    date: Option<String>,

    #[arg(long, value_parser = STATUS_CHOICES)]
    status: Option<String>,

    #[arg(long)]
    reviewers: Option<String>,

    #[arg(long)]
    topic: Option<String>,
}

impl MetadataArgs {
    fn is_empty(&self) -> bool {
        self.author.is_none()
            && self.date.is_none()
            && self.status.is_none()
            && self.reviewers.is_none()
            && self.topic.is_none()
    }

    /// `base` with every given flag applied.
    fn apply(&self, base: Metadata) -> Metadata {
        let pick = |flag: &Option<String>, old: String| flag.clone().unwrap_or(old);
        Metadata {
            author: pick(&self.author, base.author),
            date: pick(&self.date, base.date),
            status: pick(&self.status, base.status),
            reviewers: pick(&self.reviewers, base.reviewers),
            topic: pick(&self.topic, base.topic),
        }
    }
}

#[derive(Args, Debug)]
struct AgentArgs {
    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "RFC_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max tokens per agent reply.
    #[arg(long, env = "RFC_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries per agent call on failure.
    #[arg(long, env = "RFC_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call agent timeout in seconds (none by default).
    #[arg(long, env = "RFC_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Characters of source text embedded in the draft prompt.
    #[arg(long, env = "RFC_TEXT_BUDGET", default_value_t = 5000)]
    text_budget: usize,

    /// Timeout for downloads and harvested image fetches, in seconds.
    #[arg(long, env = "RFC_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Remote agent id.
    #[arg(long, env = "RFC_AGENT_ID", default_value = "")]
    agent_id: String,

    /// Remote agent alias id.
    #[arg(long, env = "RFC_AGENT_ALIAS_ID", default_value = "")]
    agent_alias: String,

    /// Region of the agent backend.
    #[arg(long, env = "RFC_REGION", default_value = "us-east-1")]
    region: String,

    /// Conversation id shared by every agent call of this run.
    #[arg(long, env = "RFC_SESSION_ID", default_value = "rfc-session")]
    session_id: String,

    /// Access key for the agent backend (requires --secret-key).
    #[arg(long, env = "RFC_ACCESS_KEY", hide_env_values = true)]
    access_key: Option<String>,

    /// Secret key for the agent backend (requires --access-key).
    #[arg(long, env = "RFC_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,
}

impl AgentArgs {
    fn agent_config(&self) -> Result<AgentConfig> {
        let credentials = Credentials::from_parts(self.access_key.clone(), self.secret_key.clone())
            .context("Invalid agent credentials")?;
        Ok(AgentConfig {
            agent_id: self.agent_id.clone(),
            alias_id: self.agent_alias.clone(),
            region: self.region.clone(),
            session_id: self.session_id.clone(),
            credentials,
        })
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
enum OcrArg {
    #[default]
    Tesseract,
    Vision,
    #[value(name = "none")]
    Off,
}

#[derive(Args, Debug)]
struct DraftArgs {
    /// Local path, HTTP/HTTPS URL or s3://bucket/key.
    input: String,

    #[command(flatten)]
    metadata: MetadataArgs,

    #[command(flatten)]
    agent: AgentArgs,

    /// Diagram kind for image diagrams (flowchart, sequence, class, state, er, gantt, pie, gitgraph).
    #[arg(long, env = "RFC_DIAGRAM_KIND", default_value = "flowchart", value_parser = parse_kind)]
    diagram_kind: DiagramKind,

    /// Extra instruction; triggers one regeneration after the first draft.
    #[arg(long)]
    prompt: Option<String>,

    /// Reference file or image added to the regeneration.
    #[arg(long)]
    context: Option<String>,

    /// OCR engine for images.
    #[arg(long, env = "RFC_OCR", value_enum, default_value = "tesseract")]
    ocr: OcrArg,

    /// Path or name of the tesseract binary.
    #[arg(long, env = "RFC_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Write the RFC to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Upload the RFC to this bucket as <stem>_RFC.md.
    #[arg(long)]
    upload: Option<String>,

    /// Print the full result (markdown, diagrams, stats) as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ReviewArgs {
    /// Bucket holding the RFC.
    bucket: String,

    /// Key of the RFC inside the bucket.
    key: String,

    #[command(flatten)]
    metadata: MetadataArgs,

    /// Reviewer comment added as a "Manager Comments" section.
    #[arg(long)]
    comment: Option<String>,

    /// Put the comment before the document instead of after it.
    #[arg(long)]
    prepend: bool,

    /// Write the reviewed RFC to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Upload as <stem>_with_comments.md next to the source.
    #[arg(long)]
    upload: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local path, HTTP/HTTPS URL or s3://bucket/key.
    input: String,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Download timeout in seconds.
    #[arg(long, env = "RFC_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,
}

fn parse_kind(s: &str) -> Result<DiagramKind, String> {
    s.parse::<DiagramKind>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs stay quiet while the spinner is the user's feedback.
    let show_progress = !cli.quiet && !cli.no_progress && is_drafting_to_terminal(&cli.command);
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let store = FsObjectStore::new(&cli.store_root);

    match &cli.command {
        Command::Draft(args) => run_draft(&cli, args, &store, show_progress).await,
        Command::Review(args) => run_review(&cli, args, &store).await,
        Command::Inspect(args) => run_inspect(args, &store).await,
        Command::List { bucket } => run_list(bucket.as_deref(), &store).await,
    }
}

fn is_drafting_to_terminal(command: &Command) -> bool {
    matches!(command, Command::Draft(args) if !args.json)
}

// ── draft ────────────────────────────────────────────────────────────────

async fn run_draft(cli: &Cli, args: &DraftArgs, store: &FsObjectStore, show_progress: bool) -> Result<()> {
    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(args, progress.clone().map(|p| p as ProgressCallback))?;

    let agent = LlmAgent::from_config(&config).context("No AI provider available")?;
    let fetcher = ReqwestFetcher::new(config.fetch_timeout_secs)?;
    let ocr: Arc<dyn OcrEngine> = match args.ocr {
        OcrArg::Tesseract => Arc::new(TesseractOcr::new(config.tesseract_path.clone())),
        OcrArg::Vision => Arc::new(VisionOcr::new(agent.clone())),
        OcrArg::Off => Arc::new(NoOcr),
    };
    let toolkit = Toolkit::new(Arc::new(agent), Arc::new(fetcher), ocr, config);

    let context = match args.context {
        Some(ref c) => Some(
            input::resolve_source(c, toolkit.config.fetch_timeout_secs, Some(store))
                .await
                .with_context(|| format!("Failed to load context file '{c}'"))?,
        ),
        None => None,
    };

    let options = DraftOptions {
        metadata: args.metadata.apply(Metadata::default()),
        diagram_kind: Some(args.diagram_kind),
        custom_prompt: args.prompt.clone(),
        context,
    };

    let result = draft_rfc(&args.input, &toolkit, &options, Some(store)).await;
    if let Some(ref p) = progress {
        p.finish();
    }
    let output = result.context("Drafting failed")?;

    if let Some(ref d) = output.draft_degraded {
        eprintln!("{} {}", red("✘"), red(&format!("Agent did not produce a draft: {d}")));
    }

    if let Some(ref path) = args.output {
        write_atomic(path, output.markdown.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if let Some(ref bucket) = args.upload {
        store
            .put_object(bucket, &output.file_name, output.markdown.clone().into_bytes())
            .await
            .with_context(|| format!("Failed to upload to bucket '{bucket}'"))?;
        if !cli.quiet {
            eprintln!("{} Uploaded {}", green("✔"), bold(&format!("{bucket}/{}", output.file_name)));
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if args.output.is_none() && args.upload.is_none() {
        print_markdown(&output.markdown)?;
    }

    if !cli.quiet && !args.json {
        let s = &output.stats;
        eprintln!(
            "{}  {} images  {} external diagrams  {}ms{}",
            if output.draft_degraded.is_none() && s.degraded_diagrams == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            s.images,
            s.external_diagrams,
            s.duration_ms,
            args.output
                .as_ref()
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
    }

    if output.draft_degraded.is_some() {
        bail!("no RFC was drafted");
    }
    Ok(())
}

/// Map CLI args to `RfcConfig`.
fn build_config(args: &DraftArgs, progress: Option<ProgressCallback>) -> Result<RfcConfig> {
    let a = &args.agent;
    let mut builder = RfcConfig::builder()
        .agent(a.agent_config()?)
        .temperature(a.temperature)
        .max_tokens(a.max_tokens)
        .max_retries(a.max_retries)
        .text_budget_chars(a.text_budget)
        .fetch_timeout_secs(a.fetch_timeout)
        .diagram_kind(args.diagram_kind)
        .tesseract_path(&args.tesseract);

    if let Some(ref m) = a.model {
        builder = builder.model(m);
    }
    if let Some(ref p) = a.provider {
        builder = builder.provider_name(p);
    }
    if let Some(secs) = a.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

// ── review ───────────────────────────────────────────────────────────────

async fn run_review(cli: &Cli, args: &ReviewArgs, store: &FsObjectStore) -> Result<()> {
    let mut session = ReviewSession::load(store, &args.bucket, &args.key)
        .await
        .with_context(|| format!("Failed to load {}/{}", args.bucket, args.key))?;

    if session.metadata().is_none() && !args.metadata.is_empty() {
        eprintln!(
            "{} No metadata header found in {}; header flags are ignored",
            cyan("⚠"),
            args.key
        );
    }

    if !args.metadata.is_empty() {
        let base = session.metadata().cloned().unwrap_or_default();
        session.set_metadata(args.metadata.apply(base))?;
    }

    if let Some(ref c) = args.comment {
        let placement = if args.prepend {
            CommentPlacement::Prepend
        } else {
            CommentPlacement::Append
        };
        session.comment(c, placement)?;
    }

    if let Some(ref path) = args.output {
        write_atomic(path, session.final_markdown().as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if args.upload {
        let key = session.upload(store).await.context("Upload failed")?;
        if !cli.quiet {
            eprintln!("{} Uploaded {}", green("✔"), bold(&format!("{}/{key}", args.bucket)));
        }
    }

    if args.output.is_none() && !args.upload {
        print_markdown(&session.final_markdown())?;
    }
    Ok(())
}

// ── inspect / list ───────────────────────────────────────────────────────

async fn run_inspect(args: &InspectArgs, store: &FsObjectStore) -> Result<()> {
    let report = inspect(&args.input, args.fetch_timeout, Some(store))
        .await
        .context("Failed to inspect source")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
        return Ok(());
    }

    println!("File:            {}", report.name);
    println!("Kind:            {:?}", report.kind);
    println!("Size:            {} bytes", report.bytes);
    match report.text.degradation() {
        None => println!("Text:            {} chars", report.text_chars),
        Some(d) => println!("Text:            {}", d),
    }
    println!("Embedded images: {}", report.embedded_images);
    println!("Image links:     {}", report.links.image_urls.len());
    println!("draw.io links:   {}", report.links.drawio_urls.len());
    println!("mermaid.live:    {}", report.links.mermaid_urls.len());
    println!("Mermaid blocks:  {}", report.links.mermaid_blocks.len());
    if let Some(ref m) = report.metadata {
        println!("Author:          {}", m.author);
        println!("Date:            {}", m.date);
        println!("Status:          {}", m.status);
        println!("Reviewers:       {}", m.reviewers);
        println!("Topic:           {}", m.topic);
    }
    Ok(())
}

async fn run_list(bucket: Option<&str>, store: &FsObjectStore) -> Result<()> {
    let names = match bucket {
        Some(b) => ReviewSession::list_rfc_files(store, b)
            .await
            .with_context(|| format!("Failed to list bucket '{b}'"))?,
        None => store.list_buckets().await.context("Failed to list buckets")?,
    };
    if names.is_empty() {
        eprintln!("{}", dim(&format!("(nothing under {})", display_root(store.root(), bucket))));
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn display_root(root: &Path, bucket: Option<&str>) -> String {
    match bucket {
        Some(b) => root.join(b).display().to_string(),
        None => root.display().to_string(),
    }
}

fn print_markdown(markdown: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(markdown.as_bytes())
        .context("Failed to write to stdout")?;
    if !markdown.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_agent(args: &[&str]) -> Result<AgentConfig> {
        let cli = Cli::try_parse_from(["rfc-agent", "draft", "notes.md"].iter().chain(args))?;
        match cli.command {
            Command::Draft(d) => d.agent.agent_config(),
            other => bail!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn agent_flags_fill_agent_config() {
        let agent = draft_agent(&[
            "--agent-id",
            "A1",
            "--agent-alias",
            "live",
            "--region",
            "eu-west-1",
            "--access-key",
            "AK",
            "--secret-key",
            "SK",
        ])
        .unwrap();
        assert_eq!(agent.agent_id, "A1");
        assert_eq!(agent.alias_id, "live");
        assert_eq!(agent.region, "eu-west-1");
        assert_eq!(agent.session_id, "rfc-session");
        let creds = agent.credentials.unwrap();
        assert_eq!((creds.access_key.as_str(), creds.secret_key.as_str()), ("AK", "SK"));
    }

    #[test]
    fn half_a_key_pair_is_rejected() {
        assert!(draft_agent(&["--access-key", "AK"]).is_err());
    }
}
