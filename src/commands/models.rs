//! Model listing command for ContextIQ

use crate::config::Config;
use crate::error::Result;
use crate::providers::KNOWN_MODELS;
use colored::Colorize;
use prettytable::{format, row, Table};

/// Print the Groq models offered for chat, marking the configured one
///
/// # Examples
///
/// ```
/// use contextiq::commands::models::list_models;
/// use contextiq::config::Config;
///
/// list_models(&Config::default()).unwrap();
/// ```
pub fn list_models(config: &Config) -> Result<()> {
    tracing::debug!(configured = %config.model.model, "Listing known models");

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row!["Model".bold(), "Active".bold()]);

    for model in KNOWN_MODELS {
        let active = if *model == config.model.model { "*" } else { "" };
        table.add_row(row![model.cyan(), active]);
    }

    if !KNOWN_MODELS.contains(&config.model.model.as_str()) {
        table.add_row(row![config.model.model.yellow(), "* (custom)"]);
    }

    println!("\nAvailable models:");
    table.printstd();
    println!();
    println!(
        "Use {} to pick one for a session.",
        "contextiq chat --model <MODEL>".cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_models_with_custom_model() {
        let mut config = Config::default();
        config.model.model = "my-finetune".to_string();
        assert!(list_models(&config).is_ok());
    }
}
