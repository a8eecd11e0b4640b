//! Command-line interface definition for ContextIQ
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, one-shot questions,
//! conversation history, and model listing.

use crate::config::StorageBackend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ContextIQ - conversational assistant backed by Groq
///
/// Ask questions, stream answers, and keep a searchable local
/// history of past conversations.
#[derive(Parser, Debug, Clone)]
#[command(name = "contextiq")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory for conversation storage (overrides config)
    #[arg(long, env = "CONTEXTIQ_STORAGE_PATH")]
    pub storage_path: Option<PathBuf>,

    /// Storage backend: auto, sqlite or json
    #[arg(long, value_parser = parse_backend)]
    pub backend: Option<StorageBackend>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

fn parse_backend(value: &str) -> Result<StorageBackend, String> {
    value.parse::<StorageBackend>().map_err(|e| e.to_string())
}

/// Available commands for ContextIQ
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Resume a stored conversation by ID
        #[arg(short, long)]
        resume: Option<i64>,

        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,

        /// Wait for the whole answer instead of streaming tokens
        #[arg(long)]
        no_stream: bool,

        /// Title for the new conversation (defaults to the first question)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Ask a single question without saving it
    Ask {
        /// The question to ask
        question: String,

        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,

        /// Sampling temperature for this question
        #[arg(long)]
        temperature: Option<f32>,

        /// Wait for the whole answer instead of streaming tokens
        #[arg(long)]
        no_stream: bool,
    },

    /// Manage stored conversations
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// List models available for chat
    Models,
}

/// Conversation history subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List stored conversations, most recent first
    List,

    /// Print the transcript of a conversation
    Show {
        /// Conversation ID
        id: i64,
    },

    /// Delete a conversation
    Delete {
        /// Conversation ID
        id: i64,
    },

    /// Search titles and messages
    Search {
        /// Case-insensitive text to look for
        query: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            backend: None,
            command: Commands::Models,
        }
    }
}
