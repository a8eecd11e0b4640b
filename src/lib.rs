//! ContextIQ - conversational assistant core
//!
//! This library provides the response orchestrator that turns a question
//! and its conversation history into a prompt for a hosted model, and the
//! conversation store that keeps past transcripts searchable.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `orchestrator`: Prompt assembly, remote calls, streaming, and failure advisories
//! - `providers`: Remote model abstraction and the Groq implementation
//! - `storage`: Conversation store trait with SQLite and JSON file backends
//! - `secrets`: Credential lookup (environment, secrets file, keyring)
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and handlers
//!
//! # Example
//!
//! ```no_run
//! use contextiq::orchestrator::{GenerationOverrides, Orchestrator};
//! use contextiq::providers::Message;
//! use contextiq::storage::open_store;
//! use contextiq::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!     orchestrator.initialize(config.model.clone()).await?;
//!
//!     let mut history = vec![Message::user("What is Generative AI?")];
//!     let answer = orchestrator
//!         .generate("What is Generative AI?", &history, &GenerationOverrides::default(), None)
//!         .await?;
//!     history.push(Message::assistant(answer));
//!
//!     let store = open_store(&config.storage)?;
//!     let id = store.create("What is Generative AI?", &config.model.model)?;
//!     store.update(id, &history)?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod secrets;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{ContextIqError, Result};
pub use orchestrator::{GenerationOverrides, Orchestrator, StreamEvent};
pub use storage::{open_store, ConversationStore};

#[cfg(test)]
pub mod test_utils;
