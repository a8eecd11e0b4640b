//! Credential lookup for ContextIQ
//!
//! The orchestrator reads the Groq API key (and optionally the tracing
//! service key) through a [`SecretSource`] at initialization time. Sources
//! can be chained so the environment wins over a secrets file, which wins
//! over the OS keyring.

use crate::config::SecretsConfig;
use crate::error::{ContextIqError, Result};
use std::collections::HashMap;
use std::path::Path;

/// Mandatory credential for the remote model API
pub const GROQ_API_KEY: &str = "GROQ_API_KEY";

/// Optional credential for the remote tracing service
pub const LANGSMITH_API_KEY: &str = "LANGSMITH_API_KEY";

/// Keyring service name under which secrets are stored
pub const KEYRING_SERVICE: &str = "contextiq";

/// Key-value lookup for credentials
pub trait SecretSource: Send + Sync {
    /// Return the secret stored under `key`, if any. Empty values count as absent.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads secrets from process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretSource;

impl SecretSource for EnvSecretSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Reads secrets from the OS keyring (`service = contextiq`, `user = key`)
#[derive(Debug, Clone)]
pub struct KeyringSecretSource {
    service: String,
}

impl KeyringSecretSource {
    /// Create a keyring source for the given service name
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl Default for KeyringSecretSource {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl SecretSource for KeyringSecretSource {
    fn get(&self, key: &str) -> Option<String> {
        match keyring::Entry::new(&self.service, key).and_then(|e| e.get_password()) {
            Ok(value) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                tracing::debug!("Keyring lookup for {} failed: {}", key, e);
                None
            }
        }
    }
}

/// In-memory secrets; also the representation of a loaded secrets file
#[derive(Debug, Clone, Default)]
pub struct MapSecretSource {
    values: HashMap<String, String>,
}

impl MapSecretSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret, builder style
    ///
    /// # Examples
    ///
    /// ```
    /// use contextiq::secrets::{MapSecretSource, SecretSource, GROQ_API_KEY};
    ///
    /// let secrets = MapSecretSource::new().with(GROQ_API_KEY, "gsk_test");
    /// assert_eq!(secrets.get(GROQ_API_KEY).as_deref(), Some("gsk_test"));
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Load a YAML mapping of `KEY: value` pairs
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a string mapping
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ContextIqError::Config(format!(
                "Failed to read secrets file {}: {}",
                path.display(),
                e
            ))
        })?;
        let values: HashMap<String, String> =
            serde_yaml::from_str(&contents).map_err(ContextIqError::Yaml)?;
        Ok(Self { values })
    }
}

impl SecretSource for MapSecretSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Returns the first hit across an ordered list of sources
#[derive(Default)]
pub struct ChainedSecretSource {
    sources: Vec<Box<dyn SecretSource>>,
}

impl ChainedSecretSource {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with lower priority than those already present
    pub fn push(mut self, source: impl SecretSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Build the chain described by configuration: env, then file, then keyring
    ///
    /// # Errors
    ///
    /// Returns error if a configured secrets file cannot be loaded
    pub fn from_config(config: &SecretsConfig) -> Result<Self> {
        let mut chain = Self::new().push(EnvSecretSource);
        if let Some(file) = &config.file {
            chain = chain.push(MapSecretSource::from_yaml_file(file)?);
        }
        if config.use_keyring {
            chain = chain.push(KeyringSecretSource::default());
        }
        Ok(chain)
    }
}

impl SecretSource for ChainedSecretSource {
    fn get(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|s| s.get(key))
    }
}
