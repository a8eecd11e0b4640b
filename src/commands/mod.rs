/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `chat`    — Interactive chat session with persisted history
- `ask`     — One-shot question, nothing persisted
- `history` — List, show, delete and search stored conversations
- `models`  — List models available for chat
*/

use crate::config::Config;
use crate::error::{ContextIqError, Result};
use crate::orchestrator::{GenerationOverrides, Orchestrator, StreamEvent, TokenSink};
use crate::providers::{Message, Role};
use crate::storage::{open_store, ConversationStore};
use colored::Colorize;
use std::io::Write;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// Conversation history commands
pub mod history;

// Model listing
pub mod models;

// Special commands parser for the chat prompt
pub mod special_commands;

/// Maximum characters taken from the first question for a conversation title
pub const TITLE_MAX_CHARS: usize = 50;

/// Title for a new conversation derived from its first question
///
/// # Examples
///
/// ```
/// use contextiq::commands::conversation_title;
///
/// assert_eq!(conversation_title("What is Rust?"), "What is Rust?");
/// assert!(conversation_title(&"x".repeat(80)).ends_with("..."));
/// ```
pub fn conversation_title(question: &str) -> String {
    let question = question.trim();
    if question.chars().count() > TITLE_MAX_CHARS {
        let head: String = question.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        question.to_string()
    }
}

/// Print streamed tokens as they arrive and return the text printed
async fn print_tokens(mut rx: mpsc::UnboundedReceiver<StreamEvent>) -> String {
    let mut text = String::new();
    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Token(chunk) => {
                print!("{}", chunk);
                let _ = stdout.flush();
                text.push_str(&chunk);
            }
            StreamEvent::Complete => break,
        }
    }
    text
}

/// Cancel `token` when the user presses Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    })
}

/// Generate with a terminal printer attached; prints whatever the stream did not
async fn generate_to_terminal(
    session: &mut chat::ChatSession,
    question: Option<&str>,
) -> Result<chat::TurnOutcome> {
    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone());
    let (tx, rx): (TokenSink, _) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_tokens(rx));

    println!();
    let outcome = match question {
        Some(q) => session.submit(q, Some(tx), cancel).await,
        None => session.regenerate(Some(tx), cancel).await,
    };
    watcher.abort();
    let streamed = printer.await.unwrap_or_default();

    if let Ok(chat::TurnOutcome::Answered { text, seconds }) = &outcome {
        if streamed != *text {
            if !streamed.is_empty() {
                println!();
            }
            print!("{}", text);
        }
        println!();
        println!("{}", format!("⏱ {:.2}s", seconds).dimmed());
        println!();
    }
    outcome
}

// Chat command handler
pub mod chat {
    //! Interactive chat mode handler.
    //!
    //! A [`ChatSession`] keeps the in-memory transcript, calls the
    //! orchestrator for each question, and pushes the transcript to the
    //! conversation store after every answer. [`run_chat`] wraps it in a
    //! readline loop.

    use super::*;
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Result of one question/answer exchange
    #[derive(Debug, Clone, PartialEq)]
    pub enum TurnOutcome {
        /// The assistant replied (possibly with an advisory)
        Answered {
            /// Reply text
            text: String,
            /// Wall-clock generation latency
            seconds: f64,
        },
        /// The user cancelled the generation; the transcript is unchanged
        Cancelled,
    }

    /// One conversation driven through the orchestrator
    pub struct ChatSession {
        orchestrator: Orchestrator,
        store: Option<Box<dyn ConversationStore>>,
        model: String,
        title: Option<String>,
        conversation_id: Option<i64>,
        history: Vec<Message>,
        overrides: GenerationOverrides,
    }

    impl ChatSession {
        /// Create a session for an initialized orchestrator
        pub fn new(
            orchestrator: Orchestrator,
            store: Option<Box<dyn ConversationStore>>,
            model: impl Into<String>,
        ) -> Self {
            Self {
                orchestrator,
                store,
                model: model.into(),
                title: None,
                conversation_id: None,
                history: Vec::new(),
                overrides: GenerationOverrides::default(),
            }
        }

        /// Use a fixed title instead of deriving one from the first question
        pub fn with_title(mut self, title: Option<String>) -> Self {
            self.title = title;
            self
        }

        /// Continue a stored conversation
        pub fn resume(&mut self, id: i64, messages: Vec<Message>) {
            self.conversation_id = Some(id);
            self.history = messages;
        }

        /// Forget the transcript; the next answer creates a new record
        pub fn reset(&mut self) {
            self.conversation_id = None;
            self.history.clear();
        }

        /// Transcript so far
        pub fn history(&self) -> &[Message] {
            &self.history
        }

        /// Stored record id, once the first answer has been persisted
        pub fn conversation_id(&self) -> Option<i64> {
            self.conversation_id
        }

        /// Per-call settings applied to every question in this session
        pub fn overrides_mut(&mut self) -> &mut GenerationOverrides {
            &mut self.overrides
        }

        /// Ask `question` and record the exchange
        ///
        /// # Errors
        ///
        /// Returns orchestrator errors that are not absorbed into advisories;
        /// the transcript is left as it was before the call
        pub async fn submit(
            &mut self,
            question: &str,
            sink: Option<TokenSink>,
            cancel: CancellationToken,
        ) -> Result<TurnOutcome> {
            self.history.push(Message::user(question));
            let outcome = self.answer(question, sink, cancel).await;
            if !matches!(outcome, Ok(TurnOutcome::Answered { .. })) {
                self.history.pop();
            }
            outcome
        }

        /// Replace the last answer with a new one for the same question
        ///
        /// # Errors
        ///
        /// Returns `ContextIqError::Config` if there is no question to
        /// regenerate, otherwise as [`submit`](Self::submit)
        pub async fn regenerate(
            &mut self,
            sink: Option<TokenSink>,
            cancel: CancellationToken,
        ) -> Result<TurnOutcome> {
            let removed = match self.history.last() {
                Some(m) if m.role == Role::Assistant => self.history.pop(),
                _ => None,
            };

            let question = match self.history.last() {
                Some(m) if m.role == Role::User => m.content.clone(),
                _ => {
                    self.history.extend(removed);
                    return Err(ContextIqError::Config(
                        "Nothing to regenerate yet: ask a question first".to_string(),
                    )
                    .into());
                }
            };

            tracing::info!("Regenerating response");
            let outcome = self.answer(&question, sink, cancel).await;
            if !matches!(outcome, Ok(TurnOutcome::Answered { .. })) {
                self.history.extend(removed);
            }
            outcome
        }

        async fn answer(
            &mut self,
            question: &str,
            sink: Option<TokenSink>,
            cancel: CancellationToken,
        ) -> Result<TurnOutcome> {
            let started = Instant::now();
            let result = self
                .orchestrator
                .generate_cancellable(question, &self.history, &self.overrides, sink, cancel)
                .await;

            match result {
                Ok(text) => {
                    let seconds = started.elapsed().as_secs_f64();
                    self.history
                        .push(Message::assistant(text.clone()).with_response_time(seconds));
                    if let Err(e) = self.persist() {
                        tracing::warn!("Failed to save conversation: {:#}", e);
                        eprintln!("{}", format!("Warning: conversation not saved: {}", e).yellow());
                    }
                    Ok(TurnOutcome::Answered { text, seconds })
                }
                Err(e) if matches!(e.downcast_ref(), Some(ContextIqError::Cancelled)) => {
                    Ok(TurnOutcome::Cancelled)
                }
                Err(e) => Err(e),
            }
        }

        fn persist(&mut self) -> Result<()> {
            let store = match &self.store {
                Some(store) => store,
                None => return Ok(()),
            };

            let id = match self.conversation_id {
                Some(id) => id,
                None => {
                    let title = match &self.title {
                        Some(title) => title.clone(),
                        None => self
                            .history
                            .iter()
                            .find(|m| m.role == Role::User)
                            .map(|m| conversation_title(&m.content))
                            .unwrap_or_else(|| "New conversation".to_string()),
                    };
                    store.create(&title, &self.model)?
                }
            };
            self.conversation_id = Some(id);

            if !store.update(id, &self.history)? {
                tracing::warn!(id, "Conversation disappeared from the store; it will be recreated");
                self.conversation_id = None;
            }
            Ok(())
        }

        async fn print_status(&self) {
            let config = self.orchestrator.active_config().await;
            println!();
            if let Some(config) = config {
                println!("Model:        {}", config.model.cyan());
                println!(
                    "Temperature:  {}",
                    self.overrides.temperature.unwrap_or(config.temperature)
                );
                println!(
                    "Max tokens:   {}",
                    self.overrides.max_tokens.unwrap_or(config.max_tokens)
                );
                println!("Streaming:    {}", config.streaming);
            }
            if self.overrides.system_prompt.is_some() {
                println!("System:       custom");
            }
            match &self.store {
                Some(store) => println!("Storage:      {}", store.backend_name()),
                None => println!("Storage:      {}", "disabled".yellow()),
            }
            match self.conversation_id {
                Some(id) => println!("Conversation: #{}", id),
                None => println!("Conversation: (not saved yet)"),
            }
            println!("Messages:     {}", self.history.len());
            if self.orchestrator.remote_tracing_enabled().await {
                println!("Tracing:      {}", "enabled".green());
            }
            println!();
        }
    }

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `resume` - Stored conversation to continue
    /// * `model` - Override for the configured model
    /// * `no_stream` - Disable token streaming
    /// * `title` - Title for a new conversation
    ///
    /// # Errors
    ///
    /// Returns error if the orchestrator cannot be initialized or the
    /// conversation to resume does not exist
    pub async fn run_chat(
        config: Config,
        resume: Option<i64>,
        model: Option<String>,
        no_stream: bool,
        title: Option<String>,
    ) -> Result<()> {
        tracing::info!("Starting interactive chat mode");

        let store = match open_store(&config.storage) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!("Conversation storage unavailable: {:#}", e);
                eprintln!("{}", "History disabled: storage could not be opened".yellow());
                None
            }
        };

        let mut model_config = config.model.clone();
        let mut resumed = None;
        if let Some(id) = resume {
            let store = store.as_deref().ok_or_else(|| {
                anyhow::anyhow!("Cannot resume conversation {}: storage is unavailable", id)
            })?;
            let record = store
                .get(id)?
                .ok_or_else(|| anyhow::anyhow!("Conversation {} not found", id))?;
            model_config.model = record.model.clone();
            resumed = Some(record);
        }
        if let Some(model) = model {
            model_config.model = model;
        }
        if no_stream {
            model_config.streaming = false;
        }

        let orchestrator = Orchestrator::from_config(&config)?;
        orchestrator.initialize(model_config.clone()).await?;

        let mut session =
            ChatSession::new(orchestrator, store, model_config.model.clone()).with_title(title);

        print_welcome_banner(&model_config.model);

        if let Some(record) = resumed {
            println!(
                "Resuming {} {} ({} messages)\n",
                format!("#{}", record.id).cyan(),
                record.title.bold(),
                record.message_count
            );
            for message in record.messages.iter().rev().take(2).rev() {
                let speaker = match message.role {
                    Role::User => "You".green().bold(),
                    _ => "ContextIQ".blue().bold(),
                };
                println!("{}: {}\n", speaker, message.content);
            }
            session.resume(record.id, record.messages);
        }

        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline(&format!("{} ", "you>".green().bold())) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    let command = match parse_special_command(trimmed) {
                        Ok(command) => command,
                        Err(e) => {
                            eprintln!("{}", e.to_string().red());
                            continue;
                        }
                    };

                    let outcome = match command {
                        SpecialCommand::None => generate_to_terminal(&mut session, Some(trimmed)).await,
                        SpecialCommand::Regenerate => generate_to_terminal(&mut session, None).await,
                        SpecialCommand::SetTemperature(t) => {
                            session.overrides_mut().temperature = Some(t);
                            println!("Temperature set to {}\n", t);
                            continue;
                        }
                        SpecialCommand::SetMaxTokens(n) => {
                            session.overrides_mut().max_tokens = Some(n);
                            println!("Max tokens set to {}\n", n);
                            continue;
                        }
                        SpecialCommand::SetSystemPrompt(prompt) => {
                            let message = if prompt.is_some() {
                                "Custom system prompt set"
                            } else {
                                "Default system prompt restored"
                            };
                            session.overrides_mut().system_prompt = prompt;
                            println!("{}\n", message);
                            continue;
                        }
                        SpecialCommand::NewConversation => {
                            session.reset();
                            println!("{}\n", "Started a new conversation".green());
                            continue;
                        }
                        SpecialCommand::ShowStatus => {
                            session.print_status().await;
                            continue;
                        }
                        SpecialCommand::Help => {
                            print_help();
                            continue;
                        }
                        SpecialCommand::Exit => break,
                    };

                    match outcome {
                        Ok(TurnOutcome::Answered { .. }) => {}
                        Ok(TurnOutcome::Cancelled) => {
                            println!("\n{}\n", "Generation cancelled".yellow());
                        }
                        Err(e) => eprintln!("\n{}\n", format!("Error: {:#}", e).red()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(id) = session.conversation_id() {
            println!("Saved as conversation #{}", id);
        }
        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome_banner(model: &str) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║              ContextIQ Chat - Ask me anything!               ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Model: {}\n", model.cyan());
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }
}

// One-shot question handler
pub mod ask {
    //! Ask a single question and print the answer without saving it.

    use super::*;

    /// Ask `question` once
    ///
    /// # Errors
    ///
    /// Returns error if the orchestrator cannot be initialized or a remote
    /// failure is propagated by the configured error policy
    pub async fn run_ask(
        config: Config,
        question: String,
        model: Option<String>,
        temperature: Option<f32>,
        no_stream: bool,
    ) -> Result<()> {
        let mut model_config = config.model.clone();
        if let Some(model) = model {
            model_config.model = model;
        }
        if no_stream {
            model_config.streaming = false;
        }

        let orchestrator = Orchestrator::from_config(&config)?;
        orchestrator.initialize(model_config.clone()).await?;

        let overrides = GenerationOverrides {
            temperature,
            ..GenerationOverrides::default()
        };
        let history = vec![Message::user(question.clone())];

        let cancel = CancellationToken::new();
        let watcher = cancel_on_ctrl_c(cancel.clone());
        let started = Instant::now();

        let (tx, rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_tokens(rx));
        let result = orchestrator
            .generate_cancellable(&question, &history, &overrides, Some(tx), cancel)
            .await;
        watcher.abort();
        let streamed = printer.await.unwrap_or_default();

        match result {
            Ok(text) => {
                if streamed != text {
                    if !streamed.is_empty() {
                        println!();
                    }
                    print!("{}", text);
                }
                println!();
                tracing::debug!(elapsed_secs = started.elapsed().as_secs_f64(), "Answered");
                Ok(())
            }
            Err(e) if matches!(e.downcast_ref(), Some(ContextIqError::Cancelled)) => {
                println!("\n{}", "Generation cancelled".yellow());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
