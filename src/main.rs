//! ContextIQ - conversational assistant CLI
//!
#![doc = "ContextIQ - conversational assistant CLI"]
#![doc = "Main entry point for the ContextIQ application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use contextiq::cli::{Cli, Commands};
use contextiq::commands;
use contextiq::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat {
            resume,
            model,
            no_stream,
            title,
        } => {
            if let Some(id) = resume {
                tracing::debug!("Resuming conversation: {}", id);
            }
            if let Some(m) = &model {
                tracing::debug!("Using model override: {}", m);
            }
            commands::chat::run_chat(config, resume, model, no_stream, title).await?;
            Ok(())
        }
        Commands::Ask {
            question,
            model,
            temperature,
            no_stream,
        } => {
            tracing::info!("Answering one-shot question");
            commands::ask::run_ask(config, question, model, temperature, no_stream).await?;
            Ok(())
        }
        Commands::History { command } => {
            tracing::info!("Starting history command");
            commands::history::handle_history(&config, command)?;
            Ok(())
        }
        Commands::Models => {
            commands::models::list_models(&config)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "contextiq=debug"
    } else {
        "contextiq=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
