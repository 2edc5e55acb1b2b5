//! Agent interaction: send a prompt, get text back, with retry.
//!
//! The drafting pipeline talks to its AI backend only through the
//! [`AgentClient`] trait, so tests can script replies and deployments can
//! plug in whichever agent service they run. [`LlmAgent`] is the bundled
//! implementation over an `edgequake-llm` provider. All prompt text lives
//! in [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! [`ask`] retries failed calls `max_retries` times with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`, at most one minute). The default is zero retries: a draft
//! request is interactive and a user would rather see the error than wait.
//! An optional per-call timeout turns a hung call into an ordinary failure.

use crate::config::{AgentConfig, RfcConfig};
use crate::error::{DegradedKind, Outcome, RfcError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Failure of one agent call.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The backend answered with an error.
    #[error("{0}")]
    Backend(String),

    /// The call exceeded the configured timeout.
    #[error("no reply within {secs}s")]
    Timeout { secs: u64 },
}

/// A remote AI text-generation agent.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Send one prompt and return the full reply text.
    async fn complete(&self, agent: &AgentConfig, prompt: &str) -> Result<String, AgentError>;
}

/// Upper bound for a single retry delay.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Exponential delay before retry `attempt` (1-based), capped at [`MAX_BACKOFF_MS`].
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Ask the agent, retrying per `config`; failures become a placeholder.
///
/// The placeholder is `"[Agent Error: <detail>]"` so it can stand in for
/// the reply anywhere a reply would go.
pub async fn ask(client: &dyn AgentClient, config: &RfcConfig, prompt: &str) -> Outcome<String> {
    let start = Instant::now();
    let mut last_err: Option<AgentError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Agent call: retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = client.complete(&config.agent, prompt);
        let result = match config.api_timeout_secs {
            Some(secs) => match timeout(Duration::from_secs(secs), call).await {
                Ok(r) => r,
                Err(_) => Err(AgentError::Timeout { secs }),
            },
            None => call.await,
        };

        match result {
            Ok(reply) => {
                debug!(
                    "Agent replied with {} chars in {:?} (session {})",
                    reply.len(),
                    start.elapsed(),
                    config.agent.session_id
                );
                return Outcome::Ok(reply);
            }
            Err(e) => {
                warn!("Agent call: attempt {} failed: {}", attempt + 1, e);
                last_err = Some(e);
            }
        }
    }

    let detail = last_err
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Unknown error".to_string());
    Outcome::degraded(DegradedKind::Backend, format!("[Agent Error: {detail}]"))
}

// ── edgequake-llm backend ────────────────────────────────────────────────

/// [`AgentClient`] over an `edgequake-llm` provider.
///
/// The provider has no notion of agent ids or sessions; those fields of
/// [`AgentConfig`] are logged and otherwise ignored.
#[derive(Clone)]
pub struct LlmAgent {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl std::fmt::Debug for LlmAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAgent")
            .field("provider", &"<dyn LLMProvider>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmAgent {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &RfcConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Build from the provider chain described on [`resolve_provider`].
    pub fn from_config(config: &RfcConfig) -> Result<Self, RfcError> {
        Ok(Self::new(resolve_provider(config)?, config))
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, AgentError> {
        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| AgentError::Backend(e.to_string()))?;
        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }

    /// One vision call: `prompt` plus a single image.
    pub async fn describe_image(&self, prompt: &str, image: ImageData) -> Result<String, AgentError> {
        self.chat(vec![ChatMessage::user_with_images(prompt, vec![image])])
            .await
    }
}

#[async_trait]
impl AgentClient for LlmAgent {
    async fn complete(&self, agent: &AgentConfig, prompt: &str) -> Result<String, AgentError> {
        debug!(
            "Agent call: agent='{}' alias='{}' session='{}' prompt={} chars",
            agent.agent_id,
            agent.alias_id,
            agent.session_id,
            prompt.len()
        );
        self.chat(vec![ChatMessage::user(prompt)]).await
    }
}

const DEFAULT_MODEL: &str = "gpt-4.1-mini";

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, RfcError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        RfcError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, both set.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &RfcConfig) -> Result<Arc<dyn LLMProvider>, RfcError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| RfcError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
