//! Groq provider implementation for ContextIQ
//!
//! This module implements the Provider trait for Groq's OpenAI-compatible
//! chat completions endpoint, with a fixed retry policy, a fixed request
//! timeout, and Server-Sent Events token streaming.

use crate::config::GroqConfig;
use crate::error::{ContextIqError, Result};
use crate::providers::{
    CompletionResponse, GenerationParams, Message, Provider, TokenStream, TokenUsage,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Request timeout applied to every remote call
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Number of retries after the first failed attempt
pub const MAX_RETRIES: u32 = 3;

/// Retry behaviour for transient failures (429, 5xx, connect/timeouts)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Delay between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Groq API provider
///
/// # Examples
///
/// ```no_run
/// use contextiq::config::GroqConfig;
/// use contextiq::providers::{GenerationParams, GroqProvider, Message, Provider};
///
/// # async fn example() -> contextiq::error::Result<()> {
/// let provider = GroqProvider::new(
///     GroqConfig::default(),
///     "gsk_example",
///     "llama-3.3-70b-versatile",
/// )?;
/// let params = GenerationParams {
///     model: provider.model(),
///     temperature: 0.3,
///     max_tokens: 2048,
/// };
/// let response = provider.complete(&[Message::user("Hello!")], &params).await?;
/// println!("{}", response.content);
/// # Ok(())
/// # }
/// ```
pub struct GroqProvider {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

/// Request structure for the chat completions endpoint
#[derive(Debug, Serialize)]
struct GroqRequest<'a> {
    model: &'a str,
    messages: Vec<GroqMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

/// Message structure for the Groq API
#[derive(Debug, Serialize)]
struct GroqMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Non-streaming response
#[derive(Debug, Deserialize)]
struct GroqResponse {
    #[serde(default)]
    choices: Vec<GroqChoice>,
    #[serde(default)]
    usage: Option<GroqUsage>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqResponseMessage,
}

#[derive(Debug, Deserialize)]
struct GroqResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// One `data:` payload of a streamed response
#[derive(Debug, Deserialize)]
struct GroqStreamChunk {
    #[serde(default)]
    choices: Vec<GroqStreamChoice>,
    #[serde(default)]
    error: Option<GroqStreamError>,
}

/// Error object Groq may emit mid-stream instead of a delta
#[derive(Debug, Deserialize)]
struct GroqStreamError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqStreamChoice {
    #[serde(default)]
    delta: GroqDelta,
}

#[derive(Debug, Default, Deserialize)]
struct GroqDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Meaning of a single SSE line
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseLine {
    /// A non-empty content delta
    Token(String),
    /// The `[DONE]` terminator
    Done,
    /// Comments, blank lines, empty deltas, other fields
    Skip,
}

impl GroqProvider {
    /// Create a new Groq provider bound to `model`
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use contextiq::config::GroqConfig;
    /// use contextiq::providers::{GroqProvider, Provider};
    ///
    /// let provider = GroqProvider::new(GroqConfig::default(), "key", "gemma2-9b-it").unwrap();
    /// assert_eq!(provider.model(), "gemma2-9b-it");
    /// ```
    pub fn new(
        config: GroqConfig,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("contextiq/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ContextIqError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        let model = model.into();
        tracing::info!(
            "Initialized Groq provider: api_base={}, model={}",
            config.api_base,
            model
        );

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Configured API base URL
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request<'a>(
        messages: &'a [Message],
        params: &'a GenerationParams,
        stream: bool,
    ) -> GroqRequest<'a> {
        GroqRequest {
            model: &params.model,
            messages: messages
                .iter()
                .map(|m| GroqMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream,
        }
    }

    /// POST the request, retrying transient failures
    async fn send_with_retry(&self, request: &GroqRequest<'_>) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);
        let mut attempt = 0u32;

        loop {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let error_text = response.text().await.unwrap_or_default();
                    let retryable =
                        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if retryable && attempt < self.retry.max_retries {
                        attempt += 1;
                        tracing::warn!(
                            "Groq returned {} (attempt {}/{}), retrying",
                            status,
                            attempt,
                            self.retry.max_retries
                        );
                        tokio::time::sleep(self.retry.backoff).await;
                        continue;
                    }

                    tracing::error!("Groq returned error {}: {}", status, error_text);
                    return Err(status_error(status, &error_text).into());
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    if retryable && attempt < self.retry.max_retries {
                        attempt += 1;
                        tracing::warn!(
                            "Groq request failed (attempt {}/{}): {}",
                            attempt,
                            self.retry.max_retries,
                            e
                        );
                        tokio::time::sleep(self.retry.backoff).await;
                        continue;
                    }

                    tracing::error!("Groq request failed: {}", e);
                    return Err(transport_error(e).into());
                }
            }
        }
    }
}

/// Map a non-success HTTP status to an error whose text the advisory
/// classifier recognises
fn status_error(status: StatusCode, body: &str) -> ContextIqError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ContextIqError::Authentication(
            format!("Groq rejected the credential ({}): {}", status, body),
        ),
        StatusCode::NOT_FOUND => {
            ContextIqError::Provider(format!("model not found ({}): {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ContextIqError::Provider(format!("rate limit exceeded ({}): {}", status, body))
        }
        _ => ContextIqError::Provider(format!("Groq returned error {}: {}", status, body)),
    }
}

fn transport_error(e: reqwest::Error) -> ContextIqError {
    if e.is_timeout() {
        ContextIqError::Timeout(format!(
            "no response from Groq within {}s",
            REQUEST_TIMEOUT_SECS
        ))
    } else {
        ContextIqError::Http(e)
    }
}

/// Interpret one line of a Groq SSE body
pub(crate) fn parse_sse_line(line: &str) -> Result<SseLine> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim();

    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    if data.is_empty() {
        return Ok(SseLine::Skip);
    }

    let chunk: GroqStreamChunk = serde_json::from_str(data).map_err(|e| {
        ContextIqError::Provider(format!("Failed to parse Groq stream chunk: {}", e))
    })?;

    if let Some(error) = chunk.error {
        let message = error
            .message
            .or(error.kind)
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(ContextIqError::Provider(format!("Groq stream error: {}", message)).into());
    }

    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
    {
        Some(content) if !content.is_empty() => Ok(SseLine::Token(content)),
        _ => Ok(SseLine::Skip),
    }
}

/// Consume an SSE byte stream, forwarding token chunks in arrival order
async fn pump_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    tx: mpsc::UnboundedSender<Result<String>>,
) {
    // Raw bytes so a multi-byte character split across chunks decodes intact
    let mut buffer: Vec<u8> = Vec::new();

    tokio::pin!(byte_stream);

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(Err(transport_error(e).into()));
                return;
            }
        };

        buffer.extend_from_slice(&chunk);

        while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=line_end).collect();

            match decode_sse_line(&line[..line_end]) {
                Ok(SseLine::Token(token)) => {
                    if tx.send(Ok(token)).is_err() {
                        return;
                    }
                }
                Ok(SseLine::Done) => return,
                Ok(SseLine::Skip) => {}
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            }
        }
    }

    // Trailing line without a newline terminator
    match decode_sse_line(&buffer) {
        Ok(SseLine::Token(token)) => {
            let _ = tx.send(Ok(token));
        }
        Err(e) => {
            let _ = tx.send(Err(e));
        }
        Ok(_) => {}
    }
}

fn decode_sse_line(line: &[u8]) -> Result<SseLine> {
    let line = std::str::from_utf8(line).map_err(|e| {
        ContextIqError::Provider(format!("Groq stream is not valid UTF-8: {}", e))
    })?;
    parse_sse_line(line)
}

#[async_trait]
impl Provider for GroqProvider {
    async fn complete(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<CompletionResponse> {
        let request = Self::build_request(messages, params, false);

        tracing::debug!(
            "Sending Groq request: model={}, {} messages",
            request.model,
            request.messages.len()
        );

        let response = self.send_with_retry(&request).await?;

        let groq_response: GroqResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Groq response: {}", e);
            ContextIqError::Provider(format!("Failed to parse Groq response: {}", e))
        })?;

        let content = groq_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(match groq_response.usage {
            Some(u) => CompletionResponse::with_usage(
                content,
                TokenUsage::new(u.prompt_tokens, u.completion_tokens),
            ),
            None => CompletionResponse::new(content),
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<TokenStream> {
        let request = Self::build_request(messages, params, true);

        tracing::debug!(
            "Opening Groq stream: model={}, {} messages",
            request.model,
            request.messages.len()
        );

        let response = self.send_with_retry(&request).await?;
        let byte_stream = response.bytes_stream();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            pump_sse_stream(byte_stream, tx).await;
        });

        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            let item = rx.recv().await?;
            Some((item, rx))
        })))
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
