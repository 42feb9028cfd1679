//! Error types and handling
//!
//! This module provides the error types used throughout the todo engine.
//! All errors implement the `ErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! Errors raised inside a conversation turn never end the session: the
//! console prints the message plus `user_hint()` and waits for the next
//! request. Only `is_retryable()` errors are retried inside the turn.

use thiserror::Error;

/// Trait for engine error extensions
///
/// Provides additional context for errors, including user-friendly hints and
/// recoverability information.
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to print on the console and never echoes raw model
    /// output or SQL.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors may succeed on a later turn. Non-recoverable errors
    /// need the user to change configuration or restart.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Protocol**: the model reply could not be turned into an action
/// - **Tools**: the model asked for a tool that does not exist, or gave it
///   bad input
/// - **Store**: SQLite failures
/// - **LLM Provider**: transport, timeout and authentication failures
/// - **Configuration**: invalid or missing configuration
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::UnknownTool("doStuff".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
/// assert!(!error.is_retryable());
///
/// let malformed = EngineError::MalformedResponse("no JSON object".to_string());
/// assert!(malformed.is_retryable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Protocol errors
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Unknown action type: {0}")]
    UnknownActionType(String),

    // Tool errors
    #[error("Invalid tool call: {0}")]
    UnknownTool(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // Store errors
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // Agent loop errors
    #[error("Model did not produce a valid action after {attempts} attempts")]
    RetryBudgetExhausted { attempts: usize },

    #[error("Max iterations exceeded")]
    MaxIterationsExceeded,

    #[error("LLM call timed out")]
    LLMTimeout,

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the agent loop should re-ask the model within the same turn.
    ///
    /// Retries are bounded by the configured retry budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::MalformedResponse(_) | Self::LLMTimeout)
    }
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            // Protocol errors
            Self::MalformedResponse(_) => "The model replied with something other than an action",
            Self::UnknownActionType(_) => "The model used an action type outside the protocol",

            // Tool errors
            Self::UnknownTool(_) => "The model asked for a tool that does not exist. Try rephrasing",
            Self::Validation(_) => "The request could not be applied. Check the task text or id",

            // Store errors
            Self::StoreUnavailable(_) => "The todo database is unavailable. Try again shortly",

            // Agent loop errors
            Self::RetryBudgetExhausted { .. } => {
                "The model kept producing invalid replies. Try again or rephrase"
            }
            Self::MaxIterationsExceeded => "Request too complex. Try breaking it into smaller steps",
            Self::LLMTimeout => "LLM provider took too long to respond. Try again",

            // LLM provider errors
            Self::LLMProvider(_) => "LLM provider unavailable. Check your API keys and network",

            // Configuration errors
            Self::Config(_) => "Check your config.toml file for errors",

            // Generic IO error
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}
