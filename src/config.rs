//! Configuration management for ContextIQ
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ContextIqError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Model used when nothing else is configured
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Accepted temperature range (inclusive)
pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 1.0);

/// Accepted max-token range (inclusive)
pub const MAX_TOKENS_RANGE: (u32, u32) = (512, 4096);

/// Main configuration structure for ContextIQ
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote endpoint settings
    #[serde(default)]
    pub groq: GroqConfig,

    /// Generation parameters used to initialize the orchestrator
    #[serde(default)]
    pub model: ModelConfig,

    /// Orchestrator behaviour
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Conversation storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Where credentials are looked up
    #[serde(default)]
    pub secrets: SecretsConfig,
}

/// Groq endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroqConfig {
    /// Base URL of the OpenAI-compatible API (useful for tests and local mocks)
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
        }
    }
}

/// Active set of generation parameters
///
/// Exactly one is active per orchestrator; it is replaced wholesale on
/// re-initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Remote model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature in [0, 1]
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token limit in [512, 4096]
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Custom system prompt; the built-in persona is used when absent
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Stream tokens to the caller when a sink is supplied
    #[serde(default = "default_streaming")]
    pub streaming: bool,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_streaming() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            streaming: default_streaming(),
        }
    }
}

impl ModelConfig {
    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns `ContextIqError::Config` if the model is empty or a value is
    /// out of range
    ///
    /// # Examples
    ///
    /// ```
    /// use contextiq::config::ModelConfig;
    ///
    /// let mut config = ModelConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.max_tokens = 100;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ContextIqError::Config("model cannot be empty".to_string()).into());
        }

        let (t_min, t_max) = TEMPERATURE_RANGE;
        if !(t_min..=t_max).contains(&self.temperature) {
            return Err(ContextIqError::Config(format!(
                "temperature must be between {} and {}, got {}",
                t_min, t_max, self.temperature
            ))
            .into());
        }

        let (m_min, m_max) = MAX_TOKENS_RANGE;
        if !(m_min..=m_max).contains(&self.max_tokens) {
            return Err(ContextIqError::Config(format!(
                "max_tokens must be between {} and {}, got {}",
                m_min, m_max, self.max_tokens
            ))
            .into());
        }

        Ok(())
    }
}

/// How remote failures reach the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Replace the failure with an advisory reply
    #[default]
    Absorb,
    /// Return the remote error to the caller
    Propagate,
}

impl FromStr for ErrorPolicy {
    type Err = ContextIqError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "absorb" => Ok(Self::Absorb),
            "propagate" => Ok(Self::Propagate),
            other => Err(ContextIqError::Config(format!(
                "Invalid error policy: {}. Must be one of: absorb, propagate",
                other
            ))),
        }
    }
}

/// Orchestrator behaviour configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Absorb remote failures into advisory text, or propagate them
    #[serde(default)]
    pub error_policy: ErrorPolicy,

    /// Keep only this many prior turns in the prompt (all when unset)
    #[serde(default)]
    pub max_history_messages: Option<usize>,
}

/// Which conversation store implementation to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite, falling back to the JSON file store on failure
    #[default]
    Auto,
    /// SQLite only
    Sqlite,
    /// JSON file store only
    Json,
}

impl FromStr for StorageBackend {
    type Err = ContextIqError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "sqlite" => Ok(Self::Sqlite),
            "json" => Ok(Self::Json),
            other => Err(ContextIqError::Config(format!(
                "Invalid storage backend: {}. Must be one of: auto, sqlite, json",
                other
            ))),
        }
    }
}

/// Conversation storage configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite database file (defaults to `<data dir>/conversations.db`)
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// JSON store directory (defaults to `<data dir>/conversation_data`)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Storage rooted in a single directory, used by tests and `--storage-path`
    ///
    /// # Examples
    ///
    /// ```
    /// use contextiq::config::StorageConfig;
    ///
    /// let config = StorageConfig::in_dir("/tmp/contextiq");
    /// assert!(config.db_path.unwrap().ends_with("conversations.db"));
    /// ```
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            backend: StorageBackend::Auto,
            db_path: Some(dir.join("conversations.db")),
            data_dir: Some(dir.join("conversation_data")),
        }
    }

    /// Resolve the SQLite path, falling back to the platform data directory
    ///
    /// # Errors
    ///
    /// Returns `ContextIqError::Storage` if no data directory can be determined
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_data_dir()?.join("conversations.db")),
        }
    }

    /// Resolve the JSON store directory, falling back to the platform data directory
    ///
    /// # Errors
    ///
    /// Returns `ContextIqError::Storage` if no data directory can be determined
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(project_data_dir()?.join("conversation_data")),
        }
    }
}

fn project_data_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "contextiq", "contextiq")
        .ok_or_else(|| ContextIqError::Storage("Could not determine data directory".into()))?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

/// Credential lookup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Optional YAML file of `KEY: value` pairs
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Consult the OS keyring after the environment
    #[serde(default = "default_use_keyring")]
    pub use_keyring: bool,
}

fn default_use_keyring() -> bool {
    true
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            file: None,
            use_keyring: default_use_keyring(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ContextIqError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ContextIqError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_base) = std::env::var("CONTEXTIQ_API_BASE") {
            self.groq.api_base = api_base;
        }

        if let Ok(model) = std::env::var("CONTEXTIQ_MODEL") {
            self.model.model = model;
        }

        if let Ok(temperature) = std::env::var("CONTEXTIQ_TEMPERATURE") {
            if let Ok(v) = temperature.parse::<f32>() {
                self.model.temperature = v;
            } else {
                tracing::warn!("Invalid CONTEXTIQ_TEMPERATURE: {}", temperature);
            }
        }

        if let Ok(max_tokens) = std::env::var("CONTEXTIQ_MAX_TOKENS") {
            if let Ok(v) = max_tokens.parse::<u32>() {
                self.model.max_tokens = v;
            } else {
                tracing::warn!("Invalid CONTEXTIQ_MAX_TOKENS: {}", max_tokens);
            }
        }

        if let Ok(prompt) = std::env::var("CONTEXTIQ_SYSTEM_PROMPT") {
            self.model.system_prompt = Some(prompt);
        }

        if let Ok(streaming) = std::env::var("CONTEXTIQ_STREAMING") {
            match streaming.to_lowercase().parse::<bool>() {
                Ok(v) => self.model.streaming = v,
                Err(_) => tracing::warn!("Invalid CONTEXTIQ_STREAMING: {}", streaming),
            }
        }

        if let Ok(policy) = std::env::var("CONTEXTIQ_ERROR_POLICY") {
            match policy.parse::<ErrorPolicy>() {
                Ok(v) => self.orchestrator.error_policy = v,
                Err(e) => tracing::warn!("{}", e),
            }
        }

        if let Ok(backend) = std::env::var("CONTEXTIQ_STORAGE_BACKEND") {
            match backend.parse::<StorageBackend>() {
                Ok(v) => self.storage.backend = v,
                Err(e) => tracing::warn!("{}", e),
            }
        }

        if let Ok(db_path) = std::env::var("CONTEXTIQ_HISTORY_DB") {
            tracing::debug!(db_path = %db_path, "Env override: CONTEXTIQ_HISTORY_DB");
            self.storage.db_path = Some(PathBuf::from(db_path));
        }

        if let Ok(data_dir) = std::env::var("CONTEXTIQ_DATA_DIR") {
            tracing::debug!(data_dir = %data_dir, "Env override: CONTEXTIQ_DATA_DIR");
            self.storage.data_dir = Some(PathBuf::from(data_dir));
        }

        if let Ok(file) = std::env::var("CONTEXTIQ_SECRETS_FILE") {
            self.secrets.file = Some(PathBuf::from(file));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(dir) = &cli.storage_path {
            tracing::info!("Using storage directory override from CLI: {}", dir.display());
            let backend = self.storage.backend;
            self.storage = StorageConfig {
                backend,
                ..StorageConfig::in_dir(dir)
            };
        }

        if let Some(backend) = cli.backend {
            self.storage.backend = backend;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.groq.api_base.trim().is_empty() {
            return Err(ContextIqError::Config("groq.api_base cannot be empty".to_string()).into());
        }

        self.model.validate()?;

        if self.orchestrator.max_history_messages == Some(0) {
            return Err(ContextIqError::Config(
                "orchestrator.max_history_messages must be greater than 0 when set".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
