use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::Result;
use crate::providers::Role;
use crate::storage::{open_store, ConversationStore, ConversationSummary};
use colored::Colorize;
use prettytable::{format, Table};

const TITLE_WIDTH: usize = 40;

/// Handle history commands
pub fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let store = open_store(&config.storage)?;
    tracing::debug!(backend = store.backend_name(), "Opened conversation store");
    run_history(store.as_ref(), command)
}

/// Execute a history command against an open store
pub fn run_history(store: &dyn ConversationStore, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List => {
            let summaries = store.list_all()?;
            if summaries.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }
            println!("\nConversation History:");
            print_summaries(&summaries);
            println!(
                "Use {} to resume a conversation.",
                "contextiq chat --resume <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id } => match store.get(id)? {
            Some(record) => {
                println!(
                    "\n{} {}  {}",
                    format!("#{}", record.id).cyan(),
                    record.title.bold(),
                    format!("({}, {} messages)", record.model, record.message_count).dimmed()
                );
                println!();
                for message in &record.messages {
                    let speaker = match message.role {
                        Role::User => "You".green().bold(),
                        Role::Assistant => "ContextIQ".blue().bold(),
                        Role::System => "System".dimmed(),
                    };
                    println!("{}:", speaker);
                    println!("{}", message.content);
                    if let Some(secs) = message.response_time_seconds {
                        println!("{}", format!("⏱ {:.2}s", secs).dimmed());
                    }
                    println!();
                }
            }
            None => println!("{}", format!("Conversation {} not found", id).yellow()),
        },
        HistoryCommand::Delete { id } => {
            if store.delete(id)? {
                println!("{}", format!("Deleted conversation {}", id).green());
            } else {
                println!("{}", format!("Conversation {} not found", id).yellow());
            }
        }
        HistoryCommand::Search { query } => {
            let summaries = store.search(&query)?;
            if summaries.is_empty() {
                println!("{}", format!("No conversations match '{}'", query).yellow());
                return Ok(());
            }
            println!("\nConversations matching '{}':", query);
            print_summaries(&summaries);
        }
    }

    Ok(())
}

fn print_summaries(summaries: &[ConversationSummary]) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Model".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for summary in summaries {
        let updated = summary.updated_at.format("%Y-%m-%d %H:%M").to_string();
        table.add_row(prettytable::row![
            summary.id.to_string().cyan(),
            shorten(&summary.title, TITLE_WIDTH),
            summary.model,
            summary.message_count,
            updated
        ]);
    }

    table.printstd();
    println!();
}

/// Truncate to `width` characters, marking the cut with "..."
pub(crate) fn shorten(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}
