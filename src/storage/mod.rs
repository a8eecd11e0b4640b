//! Conversation persistence
//!
//! [`ConversationStore`] is implemented by a SQLite table ([`SqliteStore`])
//! and by a JSON index file ([`JsonFileStore`]) with identical semantics.
//! [`open_store`] picks one according to [`StorageConfig`].

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{ContextIqError, Result};
use crate::providers::Message;

pub mod json_file;
pub mod sqlite;
pub mod types;

pub use json_file::JsonFileStore;
pub use sqlite::SqliteStore;
pub use types::{ConversationRecord, ConversationSummary};

/// Persistence operations over conversation records
///
/// Missing records are reported as `Ok(false)` or `Ok(None)`;
/// `ContextIqError::Storage` is reserved for medium failures.
pub trait ConversationStore: Send + Sync {
    /// Create an empty conversation and return its id (max existing id + 1)
    fn create(&self, title: &str, model: &str) -> Result<i64>;

    /// Replace the message list of conversation `id`
    fn update(&self, id: i64, messages: &[Message]) -> Result<bool>;

    /// Fetch a conversation with its messages
    fn get(&self, id: i64) -> Result<Option<ConversationRecord>>;

    /// All conversations, most recently updated first
    fn list_all(&self) -> Result<Vec<ConversationSummary>>;

    /// Permanently remove conversation `id`
    fn delete(&self, id: i64) -> Result<bool>;

    /// Conversations whose title or message bodies contain `query`
    fn search(&self, query: &str) -> Result<Vec<ConversationSummary>>;

    /// Short backend name for logs and status output
    fn backend_name(&self) -> &'static str;
}

/// Open the store selected by `config`
///
/// With [`StorageBackend::Auto`], SQLite is tried first and any failure falls
/// back to the JSON file store.
///
/// # Errors
///
/// Returns `ContextIqError::Storage` if the selected backend (or both, in
/// auto mode) cannot be opened
///
/// # Examples
///
/// ```
/// use contextiq::config::StorageConfig;
/// use contextiq::storage::open_store;
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = open_store(&StorageConfig::in_dir(dir.path())).unwrap();
/// let id = store.create("First chat", "llama-3.3-70b-versatile").unwrap();
/// assert_eq!(id, 1);
/// ```
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn ConversationStore>> {
    match config.backend {
        StorageBackend::Sqlite => Ok(Box::new(SqliteStore::new_with_path(
            config.resolved_db_path()?,
        )?)),
        StorageBackend::Json => Ok(Box::new(JsonFileStore::open(config.resolved_data_dir()?)?)),
        StorageBackend::Auto => {
            let sqlite = config
                .resolved_db_path()
                .and_then(SqliteStore::new_with_path);
            match sqlite {
                Ok(store) => {
                    tracing::debug!("Using SQLite conversation store");
                    Ok(Box::new(store))
                }
                Err(e) => {
                    tracing::warn!("SQLite store unavailable, falling back to JSON files: {:#}", e);
                    Ok(Box::new(JsonFileStore::open(config.resolved_data_dir()?)?))
                }
            }
        }
    }
}

/// Convert a contextual error into a storage error, keeping the cause chain
pub(crate) fn storage_error(e: anyhow::Error) -> ContextIqError {
    ContextIqError::Storage(format!("{:#}", e))
}
