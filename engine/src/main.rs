// Todo Agent
// Main entry point for the todo-agent binary

use clap::Parser;
use todo_engine::cli::{Cli, Command, ConfigAction, TodoAction};
use todo_engine::config::{Config, VALID_LOG_LEVELS};
use todo_engine::handlers::{
    handle_chat, handle_config_path, handle_config_show, handle_run, handle_todos_add,
    handle_todos_delete, handle_todos_list, handle_todos_search, OutputFormat,
};
use todo_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    if let Some(level) = &cli.log {
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}'. Must be one of: {}",
                level,
                VALID_LOG_LEVELS.join(", ")
            );
        }
    }

    // Load configuration (or use custom path if provided)
    let mut config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    if let Some(level) = &cli.log {
        config.core.log_level = level.clone();
    }
    init_telemetry_with_level(&config.core.log_level);

    tracing::info!(
        "Todo Agent v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    // Handle commands
    match cli.resolved_command() {
        Command::Chat => handle_chat(&config, format).await,

        Command::Run { text } => {
            tracing::info!("Running single turn");
            handle_run(text, &config, format).await
        }

        Command::Todos { action } => {
            tracing::debug!("Todo management: {:?}", action);
            match action {
                TodoAction::List => handle_todos_list(&config, format).await,
                TodoAction::Add { text } => handle_todos_add(text, &config, format).await,
                TodoAction::Delete { id } => handle_todos_delete(id, &config, format).await,
                TodoAction::Search { query } => {
                    handle_todos_search(query, &config, format).await
                }
            }
        }

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => handle_config_path(cli.config.as_deref(), format),
        },
    }
}
