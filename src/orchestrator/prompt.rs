//! Prompt assembly
//!
//! A prompt is one system message, the prior conversation turns, and the new
//! user input as the final message.

use crate::providers::{Message, Role};

/// Persona used when neither the call nor the active configuration supplies one
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are ContextIQ, an intelligent, professional, and helpful AI assistant. \
Answer clearly, concisely, and accurately. Provide detailed explanations when needed. \
Use proper formatting with markdown when appropriate. \
If you are unsure about something, honestly say you do not know.";

/// Build the ordered message list sent to the provider
///
/// `history` is the caller's transcript, whose last entry is the user turn
/// being answered; that entry is dropped because `input` is appended
/// explicitly. System entries in the history are ignored. With
/// `max_history` set, only the most recent prior turns are kept.
///
/// # Examples
///
/// ```
/// use contextiq::orchestrator::build_prompt;
/// use contextiq::providers::{Message, Role};
///
/// let history = vec![
///     Message::user("Hi"),
///     Message::assistant("Hello!"),
///     Message::user("What is Rust?"),
/// ];
/// let prompt = build_prompt(None, &history, "What is Rust?", None);
///
/// assert_eq!(prompt.len(), 4);
/// assert_eq!(prompt[0].role, Role::System);
/// assert_eq!(prompt[3].content, "What is Rust?");
/// ```
pub fn build_prompt(
    system_prompt: Option<&str>,
    history: &[Message],
    input: &str,
    max_history: Option<usize>,
) -> Vec<Message> {
    let system = system_prompt
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let prior = match history.split_last() {
        Some((_, rest)) => rest,
        None => &[],
    };
    let prior: Vec<&Message> = prior.iter().filter(|m| m.role != Role::System).collect();

    let keep_from = match max_history {
        Some(limit) => prior.len().saturating_sub(limit),
        None => 0,
    };

    let mut messages = Vec::with_capacity(prior.len() - keep_from + 2);
    messages.push(Message::system(system));
    messages.extend(prior[keep_from..].iter().map(|m| Message {
        role: m.role,
        content: m.content.clone(),
        response_time_seconds: None,
    }));
    messages.push(Message::user(input));
    messages
}
