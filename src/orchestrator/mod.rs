//! Response orchestration for ContextIQ
//!
//! The [`Orchestrator`] owns the active [`ModelConfig`] and the provider
//! bound to it. It assembles prompts, calls the remote model, streams token
//! chunks to an optional sink, and turns remote failures into advisories
//! according to the configured [`ErrorPolicy`].
//!
//! All `initialize` and `generate` calls are serialized through one async
//! mutex, so a reconfiguration never overlaps an in-flight generation.

pub mod advisory;
pub mod prompt;

pub use advisory::Advisory;
pub use prompt::{build_prompt, DEFAULT_SYSTEM_PROMPT};

use crate::config::{Config, ErrorPolicy, ModelConfig, OrchestratorConfig};
use crate::error::{ContextIqError, Result};
use crate::providers::{
    GenerationParams, GroqProviderFactory, Message, Provider, ProviderFactory,
};
use crate::secrets::{ChainedSecretSource, SecretSource, GROQ_API_KEY, LANGSMITH_API_KEY};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Project name reported when remote tracing is enabled
pub const TRACING_PROJECT: &str = "ContextIQ-Chatbot";

/// Event delivered to a streaming sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Partial text, in generation order
    Token(String),
    /// Generation finished; no further tokens follow
    Complete,
}

/// Caller-supplied destination for streamed tokens
pub type TokenSink = mpsc::UnboundedSender<StreamEvent>;

/// Per-call parameter overrides; unset fields use the active configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOverrides {
    /// Sampling temperature for this call
    pub temperature: Option<f32>,
    /// Completion token limit for this call
    pub max_tokens: Option<u32>,
    /// System prompt for this call
    pub system_prompt: Option<String>,
    /// Whether to stream this call to the sink
    pub streaming: Option<bool>,
}

struct Binding {
    config: ModelConfig,
    provider: Arc<dyn Provider>,
    remote_tracing: bool,
}

/// Builds prompts, invokes the remote model, and classifies failures
///
/// # Examples
///
/// ```no_run
/// use contextiq::config::Config;
/// use contextiq::orchestrator::{GenerationOverrides, Orchestrator};
/// use contextiq::providers::Message;
///
/// # async fn example() -> contextiq::error::Result<()> {
/// let config = Config::default();
/// let orchestrator = Orchestrator::from_config(&config)?;
/// orchestrator.initialize(config.model.clone()).await?;
///
/// let history = vec![Message::user("What is Generative AI?")];
/// let answer = orchestrator
///     .generate("What is Generative AI?", &history, &GenerationOverrides::default(), None)
///     .await?;
/// println!("{}", answer);
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    secrets: Arc<dyn SecretSource>,
    factory: Arc<dyn ProviderFactory>,
    settings: OrchestratorConfig,
    state: Mutex<Option<Binding>>,
}

impl Orchestrator {
    /// Create an uninitialized orchestrator
    pub fn new(
        secrets: Arc<dyn SecretSource>,
        factory: Arc<dyn ProviderFactory>,
        settings: OrchestratorConfig,
    ) -> Self {
        Self {
            secrets,
            factory,
            settings,
            state: Mutex::new(None),
        }
    }

    /// Create an orchestrator wired to Groq and the configured secret sources
    ///
    /// # Errors
    ///
    /// Returns error if a configured secrets file cannot be loaded
    pub fn from_config(config: &Config) -> Result<Self> {
        let secrets = ChainedSecretSource::from_config(&config.secrets)?;
        Ok(Self::new(
            Arc::new(secrets),
            Arc::new(GroqProviderFactory::new(config.groq.clone())),
            config.orchestrator.clone(),
        ))
    }

    /// Bind a provider for `config`, replacing any active configuration
    ///
    /// On failure the previous state is left untouched, so the caller can
    /// fix the problem and retry.
    ///
    /// # Errors
    ///
    /// Returns `ContextIqError::Config` if the configuration is invalid, the
    /// credential is missing, or the client cannot be built
    pub async fn initialize(&self, config: ModelConfig) -> Result<()> {
        config.validate()?;

        let api_key = self.secrets.get(GROQ_API_KEY).ok_or_else(|| {
            ContextIqError::Config(format!(
                "{} not found. Set the environment variable, add it to the secrets file, \
                 or store it in the keyring",
                GROQ_API_KEY
            ))
        })?;

        let remote_tracing = self.secrets.get(LANGSMITH_API_KEY).is_some();

        let mut state = self.state.lock().await;

        let provider = self
            .factory
            .create(&config.model, &api_key)
            .map_err(|e| ContextIqError::Config(format!("Failed to initialize model client: {:#}", e)))?;

        if remote_tracing {
            tracing::info!(project = TRACING_PROJECT, "Remote tracing credential found, tracing enabled");
        }
        tracing::info!(
            model = %config.model,
            temperature = config.temperature,
            max_tokens = config.max_tokens,
            streaming = config.streaming,
            "Orchestrator initialized"
        );

        *state = Some(Binding {
            config,
            provider,
            remote_tracing,
        });

        Ok(())
    }

    /// Whether `initialize` has succeeded at least once
    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// The active configuration, if initialized
    pub async fn active_config(&self) -> Option<ModelConfig> {
        self.state.lock().await.as_ref().map(|b| b.config.clone())
    }

    /// Whether the tracing credential was present at the last initialization
    pub async fn remote_tracing_enabled(&self) -> bool {
        self.state
            .lock()
            .await
            .as_ref()
            .map(|b| b.remote_tracing)
            .unwrap_or(false)
    }

    /// Error policy in effect
    pub fn error_policy(&self) -> ErrorPolicy {
        self.settings.error_policy
    }

    /// Generate a reply to `input`
    ///
    /// `history` is the transcript including the current user turn as its
    /// last entry. When streaming is in effect and `sink` is supplied, token
    /// chunks are sent in order followed by [`StreamEvent::Complete`]; the
    /// concatenated text is returned either way.
    ///
    /// # Errors
    ///
    /// Returns `ContextIqError::NotInitialized` before `initialize`,
    /// `ContextIqError::Config` for out-of-range overrides, and remote
    /// errors only under [`ErrorPolicy::Propagate`]
    pub async fn generate(
        &self,
        input: &str,
        history: &[Message],
        overrides: &GenerationOverrides,
        sink: Option<TokenSink>,
    ) -> Result<String> {
        self.generate_cancellable(input, history, overrides, sink, CancellationToken::new())
            .await
    }

    /// Same as [`generate`](Self::generate); re-asks with possibly different overrides
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate)
    pub async fn regenerate(
        &self,
        input: &str,
        history: &[Message],
        overrides: &GenerationOverrides,
        sink: Option<TokenSink>,
    ) -> Result<String> {
        self.generate(input, history, overrides, sink).await
    }

    /// [`generate`](Self::generate) that stops when `cancel` fires
    ///
    /// # Errors
    ///
    /// Returns `ContextIqError::Cancelled` if cancelled, otherwise as
    /// [`generate`](Self::generate)
    pub async fn generate_cancellable(
        &self,
        input: &str,
        history: &[Message],
        overrides: &GenerationOverrides,
        sink: Option<TokenSink>,
        cancel: CancellationToken,
    ) -> Result<String> {
        let state = self.state.lock().await;
        let binding = state.as_ref().ok_or(ContextIqError::NotInitialized)?;

        let effective = ModelConfig {
            model: binding.config.model.clone(),
            temperature: overrides.temperature.unwrap_or(binding.config.temperature),
            max_tokens: overrides.max_tokens.unwrap_or(binding.config.max_tokens),
            system_prompt: overrides
                .system_prompt
                .clone()
                .or_else(|| binding.config.system_prompt.clone()),
            streaming: overrides.streaming.unwrap_or(binding.config.streaming),
        };
        effective.validate()?;

        let params = GenerationParams {
            model: effective.model.clone(),
            temperature: effective.temperature,
            max_tokens: effective.max_tokens,
        };
        let messages = build_prompt(
            effective.system_prompt.as_deref(),
            history,
            input,
            self.settings.max_history_messages,
        );

        tracing::debug!(
            model = %params.model,
            messages = messages.len(),
            streaming = effective.streaming && sink.is_some(),
            "Generating response"
        );

        let started = Instant::now();
        let provider = binding.provider.as_ref();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ContextIqError::Cancelled.into()),
            result = invoke(provider, &messages, &params, effective.streaming, sink.as_ref()) => result,
        };

        match outcome {
            Ok(text) => {
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    chars = text.len(),
                    "Response complete"
                );
                if let Some(sink) = &sink {
                    let _ = sink.send(StreamEvent::Complete);
                }
                Ok(text)
            }
            Err(e) if matches!(e.downcast_ref(), Some(ContextIqError::Cancelled)) => {
                tracing::info!("Generation cancelled by caller");
                Err(e)
            }
            Err(e) => match self.settings.error_policy {
                ErrorPolicy::Propagate => {
                    tracing::error!("Remote call failed: {:#}", e);
                    Err(e)
                }
                ErrorPolicy::Absorb => {
                    let advisory = Advisory::classify(&format!("{:#}", e), &params.model);
                    tracing::warn!(?advisory, "Remote call failed, returning advisory: {:#}", e);
                    if let Some(sink) = &sink {
                        let _ = sink.send(StreamEvent::Complete);
                    }
                    Ok(advisory.message())
                }
            },
        }
    }
}

/// Call the provider, streaming into `sink` when streaming is requested
///
/// Without streaming, a supplied sink receives the whole reply as a single
/// token so a sink-driven caller still sees the text.
async fn invoke(
    provider: &dyn Provider,
    messages: &[Message],
    params: &GenerationParams,
    streaming: bool,
    sink: Option<&TokenSink>,
) -> Result<String> {
    match sink {
        Some(sink) if streaming => {
            let mut stream = provider.complete_stream(messages, params).await?;
            let mut text = String::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                text.push_str(&chunk);
                let _ = sink.send(StreamEvent::Token(chunk));
            }
            Ok(text)
        }
        _ => {
            let response = provider.complete(messages, params).await?;
            if let Some(usage) = response.usage {
                tracing::debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Token usage"
                );
            }
            if let Some(sink) = sink {
                let _ = sink.send(StreamEvent::Token(response.content.clone()));
            }
            Ok(response.content)
        }
    }
}
