//! Provider module for ContextIQ
//!
//! This module contains the remote model abstraction, the Groq
//! implementation, and the factory the orchestrator uses to bind a provider
//! at initialization time.

pub mod base;
pub mod groq;

pub use base::{
    CompletionResponse, GenerationParams, Message, Provider, Role, TokenStream, TokenUsage,
};
pub use groq::{GroqProvider, RetryPolicy, MAX_RETRIES, REQUEST_TIMEOUT_SECS};

use crate::config::GroqConfig;
use crate::error::Result;
use std::sync::Arc;

/// Model identifiers offered by Groq for this assistant
pub const KNOWN_MODELS: &[&str] = &[
    "llama-3.3-70b-versatile",
    "llama-3.1-70b-versatile",
    "mixtral-8x7b-32768",
    "gemma2-9b-it",
];

/// Builds a provider bound to a model and credential
///
/// The orchestrator calls this on every `initialize`; tests substitute a
/// factory returning stub providers.
pub trait ProviderFactory: Send + Sync {
    /// Create a provider for `model` authenticated with `api_key`
    ///
    /// # Errors
    ///
    /// Returns error if the underlying client cannot be constructed
    fn create(&self, model: &str, api_key: &str) -> Result<Arc<dyn Provider>>;
}

/// Factory producing [`GroqProvider`] instances
#[derive(Debug, Clone, Default)]
pub struct GroqProviderFactory {
    config: GroqConfig,
    retry: RetryPolicy,
}

impl GroqProviderFactory {
    /// Create a factory using the given endpoint configuration
    pub fn new(config: GroqConfig) -> Self {
        Self {
            config,
            retry: RetryPolicy::default(),
        }
    }

    /// Retry policy handed to every provider this factory creates
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl ProviderFactory for GroqProviderFactory {
    fn create(&self, model: &str, api_key: &str) -> Result<Arc<dyn Provider>> {
        let provider =
            GroqProvider::new(self.config.clone(), api_key, model)?.with_retry_policy(self.retry);
        Ok(Arc::new(provider))
    }
}
