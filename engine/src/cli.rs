//! CLI interface for the todo agent
//!
//! This module provides the command-line interface using clap's derive API.
//! With no subcommand the binary opens the interactive chat.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Todo Agent
///
/// A conversational to-do list assistant: tell it what you need to do in
/// plain language and a language model manages the list for you.
#[derive(Parser, Debug)]
#[command(name = "todo-agent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The requested command, `chat` when none was given
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Chat)
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Talk to the assistant (default)
    Chat,

    /// Send a single message and print the reply
    Run {
        /// The message to send
        text: String,
    },

    /// Manage todos directly, without the model
    Todos {
        #[command(subcommand)]
        action: TodoAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Direct store access
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TodoAction {
    /// List all todos
    List,

    /// Add a todo
    Add {
        /// Todo text
        text: String,
    },

    /// Delete a todo by ID
    Delete {
        /// Todo ID
        id: i64,
    },

    /// Find todos containing a phrase (case-insensitive)
    Search {
        /// Text to look for
        query: String,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the configuration file path
    Path,
}
