//! Todo Engine Library
//!
//! This library provides the core functionality of the todo agent.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Database persistence module
pub mod db;

/// LLM provider abstraction layer
pub mod llm;

/// Agent loop core module
pub mod agent;

/// Todo tools exposed to the model
pub mod tools;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
