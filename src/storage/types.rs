use crate::providers::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted conversation with its full transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Store-assigned identifier
    pub id: i64,
    /// Short label, usually the first question
    pub title: String,
    /// Model used for the conversation
    pub model: String,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation was last mutated
    pub updated_at: DateTime<Utc>,
    /// Always equal to `messages.len()`
    pub message_count: usize,
    /// Transcript in conversation order
    pub messages: Vec<Message>,
}

impl ConversationRecord {
    /// Create an empty record stamped with `now`
    pub fn new(id: i64, title: &str, model: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.to_string(),
            model: model.to_string(),
            created_at: now,
            updated_at: now,
            message_count: 0,
            messages: Vec::new(),
        }
    }

    /// Replace the transcript and refresh derived fields
    pub fn replace_messages(&mut self, messages: &[Message], now: DateTime<Utc>) {
        self.messages = messages.to_vec();
        self.message_count = self.messages.len();
        self.updated_at = now;
    }

    /// Metadata view without messages
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            model: self.model.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            message_count: self.message_count,
        }
    }

    /// Case-insensitive match of `query` against the title or any message body
    ///
    /// An empty query matches every record.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self
                .messages
                .iter()
                .any(|m| m.content.to_lowercase().contains(&needle))
    }
}

/// Conversation metadata as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Store-assigned identifier
    pub id: i64,
    /// Short label
    pub title: String,
    /// Model used for the conversation
    pub model: String,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation was last mutated
    pub updated_at: DateTime<Utc>,
    /// Number of messages
    pub message_count: usize,
}

/// Most recently updated first, ties broken by higher id first
pub(crate) fn sort_by_recency(summaries: &mut [ConversationSummary]) {
    summaries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ConversationRecord {
        let mut record = ConversationRecord::new(1, "Rust lifetimes", "gemma2-9b-it", Utc::now());
        record.replace_messages(
            &[
                Message::user("How do borrows work?"),
                Message::assistant("The Borrow Checker tracks them."),
            ],
            Utc::now(),
        );
        record
    }

    #[test]
    fn test_replace_messages_updates_count() {
        let record = record();
        assert_eq!(record.message_count, 2);
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_matches_title_and_body_case_insensitive() {
        let record = record();
        assert!(record.matches("LIFETIMES"));
        assert!(record.matches("borrow checker"));
        assert!(record.matches(""));
        assert!(!record.matches("python"));
    }

    #[test]
    fn test_matches_ignores_serialized_field_names() {
        assert!(!record().matches("role"));
        assert!(!record().matches("content"));
    }

    #[test]
    fn test_sort_by_recency_tie_breaks_on_id() {
        let now = Utc::now();
        let mut summaries = vec![
            ConversationRecord::new(1, "a", "m", now).summary(),
            ConversationRecord::new(3, "b", "m", now).summary(),
            ConversationRecord::new(2, "c", "m", now + chrono::Duration::seconds(1)).summary(),
        ];
        sort_by_recency(&mut summaries);
        let ids: Vec<i64> = summaries.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
