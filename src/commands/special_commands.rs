//! Special commands parser for interactive chat mode
//!
//! Commands are prefixed with `/` and are case-insensitive. They let the
//! user regenerate the last answer, tune per-call generation settings,
//! start a fresh conversation, inspect the session, or leave.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given a value it cannot use
    #[error("Invalid value for {command}: {arg}\n\nUsage: {usage}")]
    InvalidArgument {
        command: String,
        arg: String,
        usage: String,
    },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq)]
pub enum SpecialCommand {
    /// Re-ask the last question, replacing the last answer
    Regenerate,

    /// Set the sampling temperature for the following questions
    SetTemperature(f32),

    /// Set the completion token limit for the following questions
    SetMaxTokens(u32),

    /// Set (`Some`) or clear (`None`) the session system prompt
    SetSystemPrompt(Option<String>),

    /// Start a new conversation
    NewConversation,

    /// Show model, storage, and conversation status
    ShowStatus,

    /// Display help information
    Help,

    /// Leave the chat session
    Exit,

    /// Not a special command; send the input to the model
    None,
}

/// Parse user input into a special command
///
/// Plain text (anything not starting with `/`, other than `exit` and
/// `quit`) returns [`SpecialCommand::None`].
///
/// # Errors
///
/// Returns [`CommandError`] for unknown commands or bad arguments
///
/// # Examples
///
/// ```
/// use contextiq::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/regenerate").unwrap(), SpecialCommand::Regenerate);
/// assert_eq!(parse_special_command("/temperature 0.7").unwrap(), SpecialCommand::SetTemperature(0.7));
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    // Only the command word is case-folded; arguments keep their case
    let (head, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    let command = head.to_lowercase();

    match command.as_str() {
        "/regenerate" | "/regen" | "/r" => Ok(SpecialCommand::Regenerate),
        "/new" | "/clear" => Ok(SpecialCommand::NewConversation),
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" | "exit" | "quit" => Ok(SpecialCommand::Exit),

        "/temperature" | "/temp" => {
            let usage = "/temperature <0.0-1.0>";
            let value = require_arg(&command, arg, usage)?;
            value
                .parse::<f32>()
                .ok()
                .filter(|v| (0.0..=1.0).contains(v))
                .map(SpecialCommand::SetTemperature)
                .ok_or_else(|| invalid(&command, value, usage))
        }

        "/tokens" | "/max-tokens" => {
            let usage = "/tokens <512-4096>";
            let value = require_arg(&command, arg, usage)?;
            value
                .parse::<u32>()
                .ok()
                .filter(|v| (512..=4096).contains(v))
                .map(SpecialCommand::SetMaxTokens)
                .ok_or_else(|| invalid(&command, value, usage))
        }

        "/system" => {
            if arg.is_empty() || arg.eq_ignore_ascii_case("reset") {
                Ok(SpecialCommand::SetSystemPrompt(None))
            } else {
                Ok(SpecialCommand::SetSystemPrompt(Some(arg.to_string())))
            }
        }

        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

fn require_arg<'a>(command: &str, arg: &'a str, usage: &str) -> Result<&'a str, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        })
    } else {
        Ok(arg)
    }
}

fn invalid(command: &str, arg: &str, usage: &str) -> CommandError {
    CommandError::InvalidArgument {
        command: command.to_string(),
        arg: arg.to_string(),
        usage: usage.to_string(),
    }
}

/// Print the list of special commands
pub fn print_help() {
    println!(
        r#"
Special Commands:

  /regenerate        Ask the last question again and replace the answer
  /temperature <t>   Sampling temperature for following questions (0.0-1.0)
  /tokens <n>        Max response tokens for following questions (512-4096)
  /system <prompt>   Use a custom system prompt ("/system reset" restores default)
  /new               Start a new conversation
  /status            Show model, storage, and conversation details
  /help              Show this help
  /exit              Leave the chat (also: exit, quit, Ctrl-D)

Press Ctrl-C while an answer is streaming to cancel it.
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(
            parse_special_command("What is Generative AI?").unwrap(),
            SpecialCommand::None
        );
    }

    #[test]
    fn test_exit_variants() {
        for input in ["/exit", "/quit", "exit", "QUIT", "  /Exit  "] {
            assert_eq!(parse_special_command(input).unwrap(), SpecialCommand::Exit);
        }
    }

    #[test]
    fn test_regenerate_aliases() {
        for input in ["/regenerate", "/regen", "/R"] {
            assert_eq!(
                parse_special_command(input).unwrap(),
                SpecialCommand::Regenerate
            );
        }
    }

    #[test]
    fn test_temperature_in_range() {
        assert_eq!(
            parse_special_command("/temperature 0.9").unwrap(),
            SpecialCommand::SetTemperature(0.9)
        );
    }

    #[test]
    fn test_temperature_out_of_range() {
        assert!(matches!(
            parse_special_command("/temperature 1.5"),
            Err(CommandError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_tokens_requires_argument() {
        assert!(matches!(
            parse_special_command("/tokens"),
            Err(CommandError::MissingArgument { .. })
        ));
        assert_eq!(
            parse_special_command("/tokens 1024").unwrap(),
            SpecialCommand::SetMaxTokens(1024)
        );
    }

    #[test]
    fn test_system_prompt_keeps_case() {
        assert_eq!(
            parse_special_command("/system Answer Like A Pirate").unwrap(),
            SpecialCommand::SetSystemPrompt(Some("Answer Like A Pirate".to_string()))
        );
        assert_eq!(
            parse_special_command("/system reset").unwrap(),
            SpecialCommand::SetSystemPrompt(None)
        );
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            parse_special_command("/frobnicate"),
            Err(CommandError::UnknownCommand(_))
        ));
    }
}
