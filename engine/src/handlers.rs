//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - chat: interactive conversation with the assistant
//! - run: a single turn
//! - todos list/add/delete/search: direct store access
//! - config show/path: inspect configuration

use anyhow::{Context, Result};
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::agent::{AgentCore, TurnResult};
use crate::config::Config;
use crate::db::{Database, TodoItem};
use crate::llm::build_provider;
use crate::tools::{ToolRegistry, PROMPT_VERSION};
use sdk::errors::{EngineError, ErrorExt};

const USER_PROMPT: &str = "😁 You: ";
const ASSISTANT_PREFIX: &str = "🤖 Assistant: ";

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// What a console line asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// `exit` or `quit` in any case, or an empty line
    Exit,
    /// `/reset`
    Reset,
    Message(String),
}

impl ConsoleInput {
    pub fn classify(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("exit")
            || trimmed.eq_ignore_ascii_case("quit")
        {
            ConsoleInput::Exit
        } else if trimmed == "/reset" {
            ConsoleInput::Reset
        } else {
            ConsoleInput::Message(trimmed.to_string())
        }
    }
}

/// Open the configured database
pub async fn open_database(config: &Config) -> Result<Database> {
    let db_path = config.database_path();
    Database::new(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))
}

/// Wire provider, tools and settings into an agent
pub fn build_agent(config: &Config, database: &Database) -> Result<AgentCore> {
    let provider = build_provider(&config.llm).context("Failed to create LLM provider")?;
    let tools = Arc::new(ToolRegistry::new(database.todos()));

    tracing::debug!("System prompt version {}", PROMPT_VERSION);
    Ok(AgentCore::new(provider, tools, config.agent.clone()))
}

/// Interactive chat on stdin/stdout
pub async fn handle_chat(config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let mut agent = build_agent(config, &database)?;

    if format == OutputFormat::Text {
        println!(
            "Todo assistant ({}). Type 'exit' to quit, '/reset' to start over.",
            agent.provider_name()
        );
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_console(&mut agent, stdin, &mut stdout, format).await?;

    flush_on_shutdown(&database).await;
    Ok(())
}

async fn flush_on_shutdown(database: &Database) {
    if let Err(e) = database.flush_wal().await {
        tracing::warn!("Failed to flush WAL on shutdown: {:#}", e);
    }
}

/// Console loop over any line source
///
/// Ends on EOF, an empty line, `exit`/`quit`, or Ctrl-C. A failed turn is
/// reported and the loop moves on to the next line, unless the error can't
/// go away without a configuration change.
pub async fn run_console<R, W>(
    agent: &mut AgentCore,
    reader: R,
    out: &mut W,
    format: OutputFormat,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = reader.lines();

    loop {
        if format == OutputFormat::Text {
            write!(out, "{}", USER_PROMPT)?;
            out.flush()?;
        }

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                writeln!(out)?;
                break;
            }
        };

        // EOF
        let Some(line) = line else {
            if format == OutputFormat::Text {
                writeln!(out)?;
            }
            break;
        };

        match ConsoleInput::classify(&line) {
            ConsoleInput::Exit => break,
            ConsoleInput::Reset => {
                agent.reset();
                match format {
                    OutputFormat::Text => writeln!(out, "Conversation cleared.")?,
                    OutputFormat::Json => writeln!(out, "{}", json!({ "status": "reset" }))?,
                }
            }
            ConsoleInput::Message(text) => {
                let outcome = tokio::select! {
                    result = agent.process_turn(&text) => Some(result),
                    _ = tokio::signal::ctrl_c() => None,
                };

                match outcome {
                    Some(Ok(result)) => write_reply(out, format, &result)?,
                    Some(Err(e)) => {
                        write_turn_error(out, format, &e)?;
                        if !e.is_recoverable() {
                            tracing::error!("Ending session: {}", e);
                            break;
                        }
                    }
                    None => {
                        tracing::warn!("Interrupted during a turn");
                        writeln!(out)?;
                        break;
                    }
                }
            }
        }
    }

    if format == OutputFormat::Text {
        writeln!(out, "Goodbye!")?;
    }
    Ok(())
}

fn write_reply<W: Write>(out: &mut W, format: OutputFormat, result: &TurnResult) -> Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{}{}", ASSISTANT_PREFIX, result.output)?,
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({
                "status": "completed",
                "turn_id": result.turn_id,
                "output": result.output,
                "model_calls": result.model_calls,
                "tool_calls": result.tool_calls,
            })
        )?,
    }
    Ok(())
}

fn write_turn_error<W: Write>(out: &mut W, format: OutputFormat, err: &EngineError) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(out, "Error: {}", err)?;
            writeln!(out, "  Hint: {}", err.user_hint())?;
            if err.is_recoverable() {
                writeln!(out, "  Type '/reset' to start over if the assistant is stuck.")?;
            }
        }
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({
                "status": "failed",
                "error": err.to_string(),
                "hint": err.user_hint(),
                "recoverable": err.is_recoverable(),
            })
        )?,
    }
    Ok(())
}

/// Send a single message and print the reply
pub async fn handle_run(text: String, config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let mut agent = build_agent(config, &database)?;

    let result = agent.process_turn(&text).await;
    flush_on_shutdown(&database).await;

    match result {
        Ok(turn) => {
            match format {
                OutputFormat::Text => {
                    println!("{}", turn.output);
                }
                OutputFormat::Json => {
                    let output = json!({
                        "status": "completed",
                        "turn_id": turn.turn_id,
                        "output": turn.output,
                        "provider": agent.provider_name(),
                        "model_calls": turn.model_calls,
                        "tool_calls": turn.tool_calls,
                        "retries": turn.retries,
                        "duration_ms": turn.duration_ms,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
            }
            Ok(())
        }
        Err(e) => {
            match format {
                OutputFormat::Text => {
                    eprintln!("✗ {}", e);
                    eprintln!("  Hint: {}", e.user_hint());
                }
                OutputFormat::Json => {
                    let output = json!({
                        "status": "failed",
                        "error": e.to_string(),
                        "hint": e.user_hint(),
                        "recoverable": e.is_recoverable(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
            }
            Err(e.into())
        }
    }
}

fn format_created(created_at: i64) -> String {
    chrono::DateTime::from_timestamp(created_at, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn print_items(items: &[TodoItem], format: OutputFormat, empty_message: &str) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if items.is_empty() {
                println!("{}", empty_message);
                return Ok(());
            }
            for item in items {
                println!(
                    "{:>4}  {}  ({})",
                    item.id,
                    item.text,
                    format_created(item.created_at)
                );
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "todos": items,
                "count": items.len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// List all todos
pub async fn handle_todos_list(config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let items = database
        .todos()
        .get_all_todos()
        .await
        .context("Failed to fetch todos")?;
    print_items(&items, format, "No todos yet")
}

/// Add a todo
pub async fn handle_todos_add(text: String, config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let id = database.todos().create_todo(&text).await?;

    match format {
        OutputFormat::Text => println!("✓ Added todo {}", id),
        OutputFormat::Json => {
            let output = json!({ "id": id, "todo": text });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// Delete a todo by ID
pub async fn handle_todos_delete(id: i64, config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let todos = database.todos();
    let existing = todos.get_todo(id).await?;
    let deleted = todos.delete_todo_by_id(id).await?;

    match format {
        OutputFormat::Text => println!("{}", delete_summary(id, existing.as_ref(), deleted)),
        OutputFormat::Json => {
            let output = json!({
                "id": id,
                "deleted": deleted,
                "todo": existing.map(|item| item.text),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn delete_summary(id: i64, existing: Option<&TodoItem>, deleted: bool) -> String {
    match existing {
        Some(item) if deleted => format!("✓ Deleted todo {}: {}", id, item.text),
        _ if deleted => format!("✓ Deleted todo {}", id),
        _ => format!("No todo with id {}", id),
    }
}

/// Search todos
pub async fn handle_todos_search(
    query: String,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let database = open_database(config).await?;
    let items = database.todos().search_todo(&query).await?;
    print_items(&items, format, &format!("No todos matching '{}'", query))
}

/// Show the effective configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}

/// Print where the configuration is read from
pub fn handle_config_path(explicit: Option<&Path>, format: OutputFormat) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };

    match format {
        OutputFormat::Text => println!("{}", path.display()),
        OutputFormat::Json => {
            let output = json!({ "path": path, "exists": path.exists() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_console_input() {
        assert_eq!(ConsoleInput::classify(""), ConsoleInput::Exit);
        assert_eq!(ConsoleInput::classify("   "), ConsoleInput::Exit);
        assert_eq!(ConsoleInput::classify("exit"), ConsoleInput::Exit);
        assert_eq!(ConsoleInput::classify("QUIT\n"), ConsoleInput::Exit);
        assert_eq!(ConsoleInput::classify("/reset"), ConsoleInput::Reset);
        assert_eq!(
            ConsoleInput::classify("  Buy milk "),
            ConsoleInput::Message("Buy milk".into())
        );
        assert_eq!(
            ConsoleInput::classify("exit strategy"),
            ConsoleInput::Message("exit strategy".into())
        );
    }

    #[test]
    fn test_format_created() {
        assert_eq!(format_created(0), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_turn_error_output_has_hint() {
        let mut out = Vec::new();
        let err = EngineError::UnknownTool("doStuff".into());
        write_turn_error(&mut out, OutputFormat::Text, &err).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Error: Invalid tool call: doStuff\n"));
        assert!(text.contains("Hint: "));
        assert!(text.contains("/reset"));
    }

    #[test]
    fn test_config_error_does_not_suggest_reset() {
        let mut out = Vec::new();
        let err = EngineError::Config("missing API key".into());
        write_turn_error(&mut out, OutputFormat::Text, &err).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Hint: "));
        assert!(!text.contains("/reset"));
    }

    #[tokio::test]
    async fn test_shutdown_flush_failure_is_not_fatal() {
        let database = Database::in_memory().await.unwrap();
        flush_on_shutdown(&database).await;

        // Checkpoint on a closed pool fails; it is only logged
        database.pool().close().await;
        assert!(database.flush_wal().await.is_err());
        flush_on_shutdown(&database).await;
    }

    #[test]
    fn test_delete_summary() {
        let item = TodoItem {
            id: 3,
            text: "Buy milk".into(),
            created_at: 0,
        };
        assert_eq!(
            delete_summary(3, Some(&item), true),
            "✓ Deleted todo 3: Buy milk"
        );
        assert_eq!(delete_summary(3, None, true), "✓ Deleted todo 3");
        assert_eq!(delete_summary(3, None, false), "No todo with id 3");
    }

    #[test]
    fn test_json_turn_error() {
        let mut out = Vec::new();
        write_turn_error(&mut out, OutputFormat::Json, &EngineError::LLMTimeout).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "LLM call timed out");
        assert_eq!(value["recoverable"], true);
    }
}
