//! Base provider trait and common types for ContextIQ
//!
//! This module defines the Provider trait that remote model backends must
//! implement, along with the message, parameter and response types shared
//! by the orchestrator and the conversation store.

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions; only used when assembling prompts
    System,
    /// A human turn
    User,
    /// A model turn
    Assistant,
}

impl Role {
    /// Wire name of the role (`system`, `user`, `assistant`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message structure for conversation
///
/// The same type is sent to the provider and persisted by the conversation
/// store. Stored transcripts only contain user and assistant turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// Generation latency in seconds (assistant messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_seconds: Option<f64>,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use contextiq::providers::{Message, Role};
    ///
    /// let msg = Message::user("What is Generative AI?");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            response_time_seconds: None,
        }
    }

    /// Creates a new assistant message
    ///
    /// # Examples
    ///
    /// ```
    /// use contextiq::providers::{Message, Role};
    ///
    /// let msg = Message::assistant("Generative AI is...");
    /// assert_eq!(msg.role, Role::Assistant);
    /// assert!(msg.response_time_seconds.is_none());
    /// ```
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            response_time_seconds: None,
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            response_time_seconds: None,
        }
    }

    /// Attaches the generation latency to an assistant message
    ///
    /// # Examples
    ///
    /// ```
    /// use contextiq::providers::Message;
    ///
    /// let msg = Message::assistant("done").with_response_time(1.25);
    /// assert_eq!(msg.response_time_seconds, Some(1.25));
    /// ```
    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time_seconds = Some(seconds);
        self
    }
}

/// Token usage information from a completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use contextiq::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Remote model identifier
    pub model: String,
    /// Sampling temperature in [0, 1]
    pub temperature: f32,
    /// Maximum number of completion tokens
    pub max_tokens: u32,
}

/// Response from a non-streaming completion
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated text
    pub content: String,
    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a response without usage information
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    /// Create a response carrying token usage
    pub fn with_usage(content: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            content: content.into(),
            usage: Some(usage),
        }
    }
}

/// Ordered stream of token chunks; the stream ends when generation ends
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Provider trait for remote model backends
///
/// The provider is stateless across calls: every request carries the full
/// conversation context.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use contextiq::providers::{
///     CompletionResponse, GenerationParams, Message, Provider, TokenStream,
/// };
/// use contextiq::error::Result;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Provider for Echo {
///     async fn complete(
///         &self,
///         messages: &[Message],
///         _params: &GenerationParams,
///     ) -> Result<CompletionResponse> {
///         let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
///         Ok(CompletionResponse::new(last))
///     }
///
///     async fn complete_stream(
///         &self,
///         messages: &[Message],
///         params: &GenerationParams,
///     ) -> Result<TokenStream> {
///         let text = self.complete(messages, params).await?.content;
///         Ok(Box::pin(futures::stream::iter(vec![Ok(text)])))
///     }
///
///     fn model(&self) -> String {
///         "echo".to_string()
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Complete a conversation and return the whole response at once
    ///
    /// # Errors
    ///
    /// Returns error if the remote call fails after retries
    async fn complete(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<CompletionResponse>;

    /// Complete a conversation, yielding token chunks as they arrive
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be opened; errors that occur
    /// mid-stream are yielded as stream items.
    async fn complete_stream(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<TokenStream>;

    /// Model identifier the provider was bound to
    fn model(&self) -> String;
}
