use super::types::{sort_by_recency, ConversationRecord, ConversationSummary};
use super::{storage_error, ConversationStore};
use crate::error::{ContextIqError, Result};
use crate::providers::Message;
use anyhow::Context;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const INDEX_FILE: &str = "index.json";

type Index = BTreeMap<i64, ConversationRecord>;

/// Conversation store kept in a single JSON index file
///
/// The index maps stringified ids to full records. It is read once at open
/// and rewritten whole, through a temporary file and rename, on every
/// mutation. Two processes writing the same directory can lose updates.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    index: Mutex<Index>,
}

impl JsonFileStore {
    /// Open (creating if needed) the store in `dir`
    ///
    /// # Errors
    ///
    /// Returns `ContextIqError::Storage` if the directory cannot be created
    /// or an existing index cannot be parsed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))
            .map_err(storage_error)?;

        let index = load_index(&dir.join(INDEX_FILE))?;
        tracing::debug!(dir = %dir.display(), conversations = index.len(), "Opened JSON conversation store");

        Ok(Self {
            dir,
            index: Mutex::new(index),
        })
    }

    /// Directory holding the index file
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, Index>> {
        self.index
            .lock()
            .map_err(|_| ContextIqError::Storage("Conversation index lock poisoned".into()).into())
    }

    /// Apply `mutate` to a copy of the index, persist it, then publish it
    fn mutate<T>(&self, mutate: impl FnOnce(&mut Index) -> T) -> Result<T> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let out = mutate(&mut next);
        save_index(&self.dir, &next)?;
        *guard = next;
        Ok(out)
    }

    fn summaries(&self, filter: impl Fn(&ConversationRecord) -> bool) -> Result<Vec<ConversationSummary>> {
        let guard = self.lock()?;
        let mut summaries: Vec<ConversationSummary> = guard
            .values()
            .filter(|r| filter(r))
            .map(ConversationRecord::summary)
            .collect();
        sort_by_recency(&mut summaries);
        Ok(summaries)
    }
}

fn load_index(path: &Path) -> Result<Index> {
    if !path.exists() {
        return Ok(Index::new());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))
        .map_err(storage_error)?;
    if contents.trim().is_empty() {
        return Ok(Index::new());
    }

    let on_disk: BTreeMap<String, ConversationRecord> = serde_json::from_str(&contents)
        .with_context(|| format!("Corrupt conversation index {}", path.display()))
        .map_err(storage_error)?;

    let mut index = Index::new();
    for (key, mut record) in on_disk {
        let id: i64 = key.parse().map_err(|_| {
            ContextIqError::Storage(format!(
                "Corrupt conversation index {}: invalid id key '{}'",
                path.display(),
                key
            ))
        })?;
        record.id = id;
        record.message_count = record.messages.len();
        index.insert(id, record);
    }
    Ok(index)
}

fn save_index(dir: &Path, index: &Index) -> Result<()> {
    let on_disk: BTreeMap<String, &ConversationRecord> =
        index.iter().map(|(id, r)| (id.to_string(), r)).collect();
    let json = serde_json::to_string_pretty(&on_disk)
        .context("Failed to serialize conversation index")
        .map_err(storage_error)?;

    let path = dir.join(INDEX_FILE);
    let tmp = dir.join(format!("{}.tmp", INDEX_FILE));
    {
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))
            .map_err(storage_error)?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .with_context(|| format!("Failed to write {}", tmp.display()))
            .map_err(storage_error)?;
    }
    fs::rename(&tmp, &path)
        .with_context(|| format!("Failed to replace {}", path.display()))
        .map_err(storage_error)?;
    Ok(())
}

impl ConversationStore for JsonFileStore {
    fn create(&self, title: &str, model: &str) -> Result<i64> {
        let id = self.mutate(|index| {
            let id = index.keys().next_back().copied().unwrap_or(0) + 1;
            index.insert(id, ConversationRecord::new(id, title, model, Utc::now()));
            id
        })?;
        tracing::debug!(id, title, "Created conversation");
        Ok(id)
    }

    fn update(&self, id: i64, messages: &[Message]) -> Result<bool> {
        if !self.lock()?.contains_key(&id) {
            return Ok(false);
        }
        self.mutate(|index| match index.get_mut(&id) {
            Some(record) => {
                record.replace_messages(messages, Utc::now());
                true
            }
            None => false,
        })
    }

    fn get(&self, id: i64) -> Result<Option<ConversationRecord>> {
        Ok(self.lock()?.get(&id).cloned())
    }

    fn list_all(&self) -> Result<Vec<ConversationSummary>> {
        self.summaries(|_| true)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        if !self.lock()?.contains_key(&id) {
            return Ok(false);
        }
        self.mutate(|index| index.remove(&id).is_some())
    }

    fn search(&self, query: &str) -> Result<Vec<ConversationSummary>> {
        self.summaries(|record| record.matches(query))
    }

    fn backend_name(&self) -> &'static str {
        "json"
    }
}
