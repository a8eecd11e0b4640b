//! Error types for ContextIQ
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for ContextIQ operations
///
/// This enum covers configuration, orchestration, provider and storage
/// failures. Most APIs return [`Result`], an `anyhow` alias, so callers can
/// attach context and still `downcast_ref::<ContextIqError>()` to inspect
/// the category.
#[derive(Error, Debug)]
pub enum ContextIqError {
    /// Configuration-related errors (missing credential, invalid model settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generation was requested before the orchestrator was initialized
    #[error("Orchestrator not initialized: call initialize() before generating")]
    NotInitialized,

    /// Provider-related errors (API calls, unexpected responses)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Authentication errors (e.g., 401 Unauthorized)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Remote request exceeded the configured timeout
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Generation was cancelled by the caller
    #[error("Generation cancelled")]
    Cancelled,

    /// Conversation storage errors (unwritable medium, corrupt index)
    #[error("Storage error: {0}")]
    Storage(String),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for ContextIQ operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ContextIqError::Config("GROQ_API_KEY not found".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: GROQ_API_KEY not found"
        );
    }

    #[test]
    fn test_not_initialized_display_mentions_initialize() {
        let error = ContextIqError::NotInitialized;
        assert!(error.to_string().contains("initialize()"));
    }

    #[test]
    fn test_provider_error_display() {
        let error = ContextIqError::Provider("bad gateway".to_string());
        assert_eq!(error.to_string(), "Provider error: bad gateway");
    }

    #[test]
    fn test_authentication_error_is_classifiable() {
        let error = ContextIqError::Authentication("invalid key".to_string());
        assert!(error.to_string().to_lowercase().contains("authentication"));
    }

    #[test]
    fn test_timeout_error_is_classifiable() {
        let error = ContextIqError::Timeout("after 60s".to_string());
        assert!(error.to_string().to_lowercase().contains("timeout"));
    }

    #[test]
    fn test_storage_error_display() {
        let error = ContextIqError::Storage("database connection failed".to_string());
        assert_eq!(
            error.to_string(),
            "Storage error: database connection failed"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = ContextIqError::NotInitialized.into();
        assert!(matches!(
            err.downcast_ref::<ContextIqError>(),
            Some(ContextIqError::NotInitialized)
        ));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<Vec<String>>("key: [unclosed").unwrap_err();
        let error: ContextIqError = yaml_error.into();
        assert!(matches!(error, ContextIqError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ContextIqError>();
    }
}
