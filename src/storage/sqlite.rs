use super::types::{ConversationRecord, ConversationSummary};
use super::{storage_error, ConversationStore};
use crate::error::Result;
use crate::providers::Message;
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

const SUMMARY_COLUMNS: &str = "id, title, model, created_at, updated_at, message_count";

/// Conversation store backed by a single SQLite table
pub struct SqliteStore {
    db_path: PathBuf,
}

/// Column values before timestamp and JSON decoding
struct RawRow {
    id: i64,
    title: String,
    model: String,
    created_at: String,
    updated_at: String,
    message_count: i64,
    messages_json: Option<String>,
}

impl RawRow {
    fn from_summary_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            model: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            message_count: row.get(5)?,
            messages_json: None,
        })
    }

    fn from_full_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let mut raw = Self::from_summary_row(row)?;
        raw.messages_json = Some(row.get(6)?);
        Ok(raw)
    }

    fn into_summary(self) -> Result<ConversationSummary> {
        Ok(ConversationSummary {
            id: self.id,
            title: self.title,
            model: self.model,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            message_count: self.message_count.max(0) as usize,
        })
    }

    fn into_record(self) -> Result<ConversationRecord> {
        let messages: Vec<Message> = match &self.messages_json {
            Some(json) => serde_json::from_str(json)
                .context("Failed to deserialize messages")
                .map_err(storage_error)?,
            None => Vec::new(),
        };
        let summary = self.into_summary()?;
        Ok(ConversationRecord {
            id: summary.id,
            title: summary.title,
            model: summary.model,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            message_count: messages.len(),
            messages,
        })
    }
}

/// Fixed-width UTC timestamp so lexical order equals chronological order
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp in database: {}", value))
        .map_err(storage_error)?;
    Ok(parsed.with_timezone(&Utc))
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path`
    ///
    /// # Errors
    ///
    /// Returns `ContextIqError::Storage` if the file or schema cannot be created
    ///
    /// # Examples
    ///
    /// ```
    /// use contextiq::storage::{ConversationStore, SqliteStore};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SqliteStore::new_with_path(dir.path().join("conversations.db")).unwrap();
    /// assert!(store.list_all().unwrap().is_empty());
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(storage_error)?;
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    /// Path of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open database {}", self.db_path.display()))
            .map_err(storage_error)?;
        Ok(conn)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                model TEXT NOT NULL,
                messages_json TEXT NOT NULL,
                message_count INTEGER NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(storage_error)?;

        Ok(())
    }

    fn query_summaries(&self, conn: &Connection) -> Result<Vec<ConversationSummary>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM conversations ORDER BY updated_at DESC, id DESC",
                SUMMARY_COLUMNS
            ))
            .context("Failed to prepare query")
            .map_err(storage_error)?;

        let rows = stmt
            .query_map([], RawRow::from_summary_row)
            .context("Failed to query conversations")
            .map_err(storage_error)?;

        let mut summaries = Vec::new();
        for row in rows {
            let raw = row.context("Failed to read row").map_err(storage_error)?;
            summaries.push(raw.into_summary()?);
        }
        Ok(summaries)
    }
}

impl ConversationStore for SqliteStore {
    fn create(&self, title: &str, model: &str) -> Result<i64> {
        let mut conn = self.connect()?;
        let now = format_timestamp(Utc::now());

        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(storage_error)?;

        let id: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(id), 0) + 1 FROM conversations",
                [],
                |row| row.get(0),
            )
            .context("Failed to allocate conversation id")
            .map_err(storage_error)?;

        tx.execute(
            "INSERT INTO conversations
                (id, title, created_at, updated_at, model, messages_json, message_count)
             VALUES (?, ?, ?, ?, ?, '[]', 0)",
            params![id, title, now, now, model],
        )
        .context("Failed to insert conversation")
        .map_err(storage_error)?;

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(storage_error)?;

        tracing::debug!(id, title, "Created conversation");
        Ok(id)
    }

    fn update(&self, id: i64, messages: &[Message]) -> Result<bool> {
        let conn = self.connect()?;
        let messages_json = serde_json::to_string(messages)
            .context("Failed to serialize messages")
            .map_err(storage_error)?;
        let now = format_timestamp(Utc::now());

        let changed = conn
            .execute(
                "UPDATE conversations SET
                    messages_json = ?,
                    message_count = ?,
                    updated_at = ?
                WHERE id = ?",
                params![messages_json, messages.len() as i64, now, id],
            )
            .context("Failed to update conversation")
            .map_err(storage_error)?;

        Ok(changed > 0)
    }

    fn get(&self, id: i64) -> Result<Option<ConversationRecord>> {
        let conn = self.connect()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {}, messages_json FROM conversations WHERE id = ?",
                    SUMMARY_COLUMNS
                ),
                params![id],
                RawRow::from_full_row,
            )
            .optional()
            .context("Failed to load conversation")
            .map_err(storage_error)?;

        raw.map(RawRow::into_record).transpose()
    }

    fn list_all(&self) -> Result<Vec<ConversationSummary>> {
        let conn = self.connect()?;
        self.query_summaries(&conn)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.connect()?;
        let deleted = conn
            .execute("DELETE FROM conversations WHERE id = ?", params![id])
            .context("Failed to delete conversation")
            .map_err(storage_error)?;
        Ok(deleted > 0)
    }

    fn search(&self, query: &str) -> Result<Vec<ConversationSummary>> {
        let conn = self.connect()?;
        if query.is_empty() {
            return self.query_summaries(&conn);
        }

        // Message bodies live inside JSON, so matching happens after decoding
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {}, messages_json FROM conversations ORDER BY updated_at DESC, id DESC",
                SUMMARY_COLUMNS
            ))
            .context("Failed to prepare query")
            .map_err(storage_error)?;

        let rows = stmt
            .query_map([], RawRow::from_full_row)
            .context("Failed to query conversations")
            .map_err(storage_error)?;

        let mut matches = Vec::new();
        for row in rows {
            let raw = row.context("Failed to read row").map_err(storage_error)?;
            let record = raw.into_record()?;
            if record.matches(query) {
                matches.push(record.summary());
            }
        }
        Ok(matches)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextIqError;
    use crate::test_utils::temp_dir;

    fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = temp_dir();
        let store = SqliteStore::new_with_path(dir.path().join("conversations.db")).unwrap();
        (dir, store)
    }

    fn set_updated_at(store: &SqliteStore, id: i64, ts: &str) {
        let conn = Connection::open(store.db_path()).unwrap();
        conn.execute(
            "UPDATE conversations SET updated_at = ? WHERE id = ?",
            params![ts, id],
        )
        .unwrap();
    }

    #[test]
    fn test_timestamps_are_fixed_width() {
        let a = format_timestamp(DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc));
        let b = format_timestamp(Utc::now());
        assert_eq!(a, "2024-01-01T00:00:00.000000Z");
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn test_create_starts_at_one_and_is_empty() {
        let (_dir, store) = store();
        let id = store.create("Hello", "llama-3.3-70b-versatile").unwrap();
        assert_eq!(id, 1);

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.title, "Hello");
        assert_eq!(record.model, "llama-3.3-70b-versatile");
        assert!(record.messages.is_empty());
        assert_eq!(record.message_count, 0);
    }

    #[test]
    fn test_ids_follow_max_plus_one_after_delete() {
        let (_dir, store) = store();
        let a = store.create("a", "m").unwrap();
        let b = store.create("b", "m").unwrap();
        assert_eq!((a, b), (1, 2));

        assert!(store.delete(b).unwrap());
        assert_eq!(store.create("c", "m").unwrap(), 2);

        assert!(store.delete(a).unwrap());
        assert_eq!(store.create("d", "m").unwrap(), 3);
    }

    #[test]
    fn test_update_round_trips_messages() {
        let (_dir, store) = store();
        let id = store.create("t", "m").unwrap();
        let messages = vec![
            Message::user("What is Rust?"),
            Message::assistant("A systems language.").with_response_time(0.42),
        ];
        assert!(store.update(id, &messages).unwrap());

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.messages, messages);
        assert_eq!(record.message_count, 2);
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_update_missing_returns_false() {
        let (_dir, store) = store();
        assert!(!store.update(99, &[Message::user("x")]).unwrap());
    }

    #[test]
    fn test_delete_missing_returns_false() {
        let (_dir, store) = store();
        assert!(!store.delete(5).unwrap());
        assert!(store.get(5).unwrap().is_none());
    }

    #[test]
    fn test_list_all_orders_by_updated_then_id() {
        let (_dir, store) = store();
        for title in ["one", "two", "three"] {
            store.create(title, "m").unwrap();
        }
        set_updated_at(&store, 1, "2024-05-01T10:00:00.000000Z");
        set_updated_at(&store, 2, "2024-05-01T09:00:00.000000Z");
        set_updated_at(&store, 3, "2024-05-01T09:00:00.000000Z");

        let ids: Vec<i64> = store.list_all().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn test_search_title_and_body() {
        let (_dir, store) = store();
        let a = store.create("Tokio runtime", "m").unwrap();
        let b = store.create("Untitled", "m").unwrap();
        store
            .update(b, &[Message::user("Explain the Borrow checker")])
            .unwrap();

        let hits: Vec<i64> = store.search("tokio").unwrap().iter().map(|s| s.id).collect();
        assert_eq!(hits, vec![a]);
        let hits: Vec<i64> = store.search("BORROW").unwrap().iter().map(|s| s.id).collect();
        assert_eq!(hits, vec![b]);
        assert_eq!(store.search("").unwrap().len(), 2);
        assert!(store.search("content").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_messages_is_storage_error() {
        let (_dir, store) = store();
        let id = store.create("t", "m").unwrap();
        let conn = Connection::open(store.db_path()).unwrap();
        conn.execute(
            "UPDATE conversations SET messages_json = 'not json' WHERE id = ?",
            params![id],
        )
        .unwrap();

        let err = store.get(id).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ContextIqError>(),
            Some(ContextIqError::Storage(_))
        ));
    }

    #[test]
    fn test_reopen_preserves_data() {
        let dir = temp_dir();
        let path = dir.path().join("nested").join("conversations.db");
        {
            let store = SqliteStore::new_with_path(&path).unwrap();
            let id = store.create("persisted", "m").unwrap();
            store.update(id, &[Message::user("hi")]).unwrap();
        }
        let store = SqliteStore::new_with_path(&path).unwrap();
        let summaries = store.list_all().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].message_count, 1);
    }
}
