//! Configuration types for RFC drafting.
//!
//! All drafting behaviour is controlled through [`RfcConfig`], built via its
//! [`RfcConfigBuilder`]. The agent identity ([`AgentConfig`]) travels inside
//! the config so every stage that talks to the AI backend sees the same
//! credentials and session id.

use crate::error::RfcError;
use crate::progress::DraftProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for drafting and reviewing RFC documents.
///
/// # Example
/// ```rust
/// use edgequake_rfc::{DiagramKind, RfcConfig};
///
/// let config = RfcConfig::builder()
///     .model("gpt-4.1-mini")
///     .diagram_kind(DiagramKind::Sequence)
///     .text_budget_chars(8000)
///     .build()
///     .unwrap();
/// assert_eq!(config.text_budget_chars, 8000);
/// ```
#[derive(Clone)]
pub struct RfcConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Identity of the remote agent; passed through to the backend untouched.
    pub agent: AgentConfig,

    /// Sampling temperature for the completion. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the agent may generate per reply. Default: 4096.
    ///
    /// A full 13-section RFC with a few diagrams is typically 2–3k tokens.
    pub max_tokens: usize,

    /// Retry attempts after a failed agent call. Default: 0 (one call).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout for the agent in seconds. Default: None (wait).
    pub api_timeout_secs: Option<u64>,

    /// Character budget for the source text embedded in the RFC prompt. Default: 5000.
    pub text_budget_chars: usize,

    /// Timeout for source downloads and harvested image fetches. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Diagram kind requested when none is chosen explicitly. Default: flowchart.
    pub diagram_kind: DiagramKind,

    /// Path or name of the `tesseract` binary. Default: "tesseract".
    pub tesseract_path: PathBuf,

    /// Optional progress callback for diagram and draft events.
    pub progress_callback: Option<Arc<dyn DraftProgressCallback>>,
}

impl Default for RfcConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            agent: AgentConfig::default(),
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: None,
            text_budget_chars: 5000,
            fetch_timeout_secs: 30,
            diagram_kind: DiagramKind::default(),
            tesseract_path: PathBuf::from("tesseract"),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RfcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RfcConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("agent", &self.agent)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("text_budget_chars", &self.text_budget_chars)
            .field("diagram_kind", &self.diagram_kind)
            .field("tesseract_path", &self.tesseract_path)
            .finish()
    }
}

impl RfcConfig {
    /// Create a new builder for `RfcConfig`.
    pub fn builder() -> RfcConfigBuilder {
        RfcConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RfcConfig`].
#[derive(Debug)]
pub struct RfcConfigBuilder {
    config: RfcConfig,
}

impl RfcConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn agent(mut self, agent: AgentConfig) -> Self {
        self.config.agent = agent;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn text_budget_chars(mut self, n: usize) -> Self {
        self.config.text_budget_chars = n;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn diagram_kind(mut self, kind: DiagramKind) -> Self {
        self.config.diagram_kind = kind;
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn DraftProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RfcConfig, RfcError> {
        let c = &self.config;
        if c.text_budget_chars < 16 {
            return Err(RfcError::InvalidConfig(format!(
                "text budget must be at least 16 characters, got {}",
                c.text_budget_chars
            )));
        }
        if c.max_tokens == 0 {
            return Err(RfcError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(RfcError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Agent identity ───────────────────────────────────────────────────────

/// Identity of the remote AI agent.
///
/// Nothing here is interpreted by the drafting pipeline; the fields are
/// handed to the [`crate::pipeline::llm::AgentClient`] as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub alias_id: String,
    pub region: String,
    /// Conversation id shared by every call of one tool run.
    pub session_id: String,
    pub credentials: Option<Credentials>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: String::new(),
            alias_id: String::new(),
            region: "us-east-1".to_string(),
            session_id: "rfc-session".to_string(),
            credentials: None,
        }
    }
}

/// Access key pair for the agent backend and object store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    /// Pair up an access key and secret key; both or neither must be given.
    pub fn from_parts(
        access_key: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Option<Self>, RfcError> {
        match (access_key, secret_key) {
            (Some(access_key), Some(secret_key)) => Ok(Some(Self {
                access_key,
                secret_key,
            })),
            (None, None) => Ok(None),
            _ => Err(RfcError::InvalidConfig(
                "access key and secret key must be given together".into(),
            )),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Mermaid diagram style requested from the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramKind {
    #[default]
    Flowchart,
    Sequence,
    Class,
    State,
    EntityRelationship,
    Gantt,
    Pie,
    Gitgraph,
}

impl DiagramKind {
    pub const ALL: [DiagramKind; 8] = [
        DiagramKind::Flowchart,
        DiagramKind::Sequence,
        DiagramKind::Class,
        DiagramKind::State,
        DiagramKind::EntityRelationship,
        DiagramKind::Gantt,
        DiagramKind::Pie,
        DiagramKind::Gitgraph,
    ];

    /// Name used in prompts and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Sequence => "sequence",
            DiagramKind::Class => "class",
            DiagramKind::State => "state",
            DiagramKind::EntityRelationship => "entity_relationship",
            DiagramKind::Gantt => "gantt",
            DiagramKind::Pie => "pie",
            DiagramKind::Gitgraph => "gitgraph",
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagramKind {
    type Err = RfcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_lowercase().replace(['-', ' '], "_");
        DiagramKind::ALL
            .into_iter()
            .find(|k| k.as_str() == norm || (norm == "er" && *k == DiagramKind::EntityRelationship))
            .ok_or_else(|| {
                RfcError::InvalidConfig(format!(
                    "unknown diagram kind '{s}' (expected one of: {})",
                    DiagramKind::ALL.map(|k| k.as_str()).join(", ")
                ))
            })
    }
}
