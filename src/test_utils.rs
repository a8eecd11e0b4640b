//! Test utilities for ContextIQ
//!
//! Temporary directories, error assertions, and deterministic providers
//! used by unit tests across the crate.

use crate::error::{ContextIqError, Result};
use crate::providers::{
    CompletionResponse, GenerationParams, Message, Provider, ProviderFactory, TokenStream,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Create a temporary directory that is removed when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Assert that a result failed with a message containing `expected`
///
/// # Panics
///
/// Panics if the result is Ok or the error text does not contain `expected`
pub fn assert_error_contains<T: std::fmt::Debug>(result: Result<T>, expected: &str) {
    match result {
        Ok(value) => panic!("Expected error containing '{}', got Ok({:?})", expected, value),
        Err(e) => {
            let text = format!("{:#}", e);
            assert!(
                text.contains(expected),
                "Error '{}' does not contain '{}'",
                text,
                expected
            );
        }
    }
}

/// Deterministic provider that replies with fixed chunks
///
/// `complete` returns the chunks concatenated; `complete_stream` yields them
/// one by one.
pub struct StubProvider {
    chunks: Vec<String>,
    stream_error: Option<String>,
    delay: Option<Duration>,
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
}

impl StubProvider {
    /// Provider answering with `chunks`, in order
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            stream_error: None,
            delay: None,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
        }
    }

    /// Yield `error` as a stream item after all chunks
    pub fn failing_stream_after(mut self, error: &str) -> Self {
        self.stream_error = Some(error.to_string());
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls seen so far
    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    /// Number of `complete_stream` calls seen so far
    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Provider for StubProvider {
    async fn complete(
        &self,
        _messages: &[Message],
        _params: &GenerationParams,
    ) -> Result<CompletionResponse> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(CompletionResponse::new(self.chunks.concat()))
    }

    async fn complete_stream(
        &self,
        _messages: &[Message],
        _params: &GenerationParams,
    ) -> Result<TokenStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let mut items: Vec<Result<String>> = self.chunks.iter().cloned().map(Ok).collect();
        if let Some(error) = &self.stream_error {
            items.push(Err(ContextIqError::Provider(error.clone()).into()));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn model(&self) -> String {
        "stub".to_string()
    }
}

/// Factory handing out one shared provider and counting calls
pub struct StaticProviderFactory {
    provider: Arc<dyn Provider>,
    created: AtomicUsize,
}

impl StaticProviderFactory {
    /// Factory that returns `provider` for every model
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            created: AtomicUsize::new(0),
        }
    }

    /// Number of providers handed out
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ProviderFactory for StaticProviderFactory {
    fn create(&self, _model: &str, _api_key: &str) -> Result<Arc<dyn Provider>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.provider.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stub_provider_stream_matches_complete() {
        let provider = StubProvider::new(&["a", "b", "c"]);
        let params = GenerationParams {
            model: "stub".to_string(),
            temperature: 0.3,
            max_tokens: 512,
        };
        let whole = provider.complete(&[], &params).await.unwrap().content;
        let streamed: Vec<String> = provider
            .complete_stream(&[], &params)
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(streamed.concat(), whole);
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_error_contains_panics_on_mismatch() {
        let result: Result<()> = Err(ContextIqError::Config("alpha".into()).into());
        assert_error_contains(result, "beta");
    }
}
