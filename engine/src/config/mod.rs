//! Configuration management
//!
//! This module handles loading, validation, and management of the agent
//! configuration. Configuration is stored in TOML format at
//! ~/.todo-agent/config.toml and created with defaults on first run.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory, database location
//! - **llm**: Which model provider to use and how to reach it
//! - **agent**: Retry budget, iteration cap, timeouts, transcript window,
//!   sampling parameters
//!
//! Every section and field has a default, so a partial file is valid.
//!
//! # Examples
//!
//! ```no_run
//! use todo_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Database: {:?}", config.database_path());
//! println!("Provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::replicate::LLAMA3_PROMPT_TEMPLATE;
use crate::llm::Sampling;

/// Providers `llm.default_provider` may name
pub const VALID_PROVIDERS: [&str; 3] = ["ollama", "openai", "replicate"];

/// Levels `core.log_level` may name
pub const VALID_LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Agent loop tuning
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Explicit database file; defaults to `<data_dir>/todos.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Provider used by the agent (ollama, openai, replicate)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Replicate provider settings
    #[serde(default)]
    pub replicate: ReplicateConfig,
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for OpenAI API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
}

/// Replicate provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateConfig {
    /// Base URL for Replicate API
    #[serde(default = "default_replicate_base_url")]
    pub base_url: String,

    /// Model in `owner/name` form
    #[serde(default = "default_replicate_model")]
    pub model: String,

    /// Environment variable holding the API token
    #[serde(default = "default_replicate_key_env")]
    pub api_key_env: String,

    /// Chat template sent with each prediction; an empty string disables it
    /// for models that apply their own
    #[serde(default = "default_prompt_template")]
    pub prompt_template: Option<String>,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Malformed or timed-out model replies tolerated per turn
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Model calls allowed per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Timeout for each model call (seconds)
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Most recent history entries rendered into the transcript (0 = all)
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f64,
}

impl AgentConfig {
    pub fn sampling(&self) -> Sampling {
        Sampling {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.todo-agent")
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_replicate_base_url() -> String {
    "https://api.replicate.com/v1".to_string()
}

fn default_replicate_model() -> String {
    "meta/meta-llama-3-8b-instruct".to_string()
}

fn default_replicate_key_env() -> String {
    "REPLICATE_API_TOKEN".to_string()
}

fn default_prompt_template() -> Option<String> {
    Some(LLAMA3_PROMPT_TEMPLATE.to_string())
}

fn default_max_retries() -> usize {
    5
}

fn default_max_iterations() -> usize {
    20
}

fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_history_window() -> usize {
    40
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    500
}

fn default_top_p() -> f64 {
    0.95
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            database_path: None,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            ollama: OllamaConfig::default(),
            openai: OpenAIConfig::default(),
            replicate: ReplicateConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            api_key_env: default_openai_key_env(),
        }
    }
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        Self {
            base_url: default_replicate_base_url(),
            model: default_replicate_model(),
            api_key_env: default_replicate_key_env(),
            prompt_template: default_prompt_template(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_iterations: default_max_iterations(),
            llm_timeout_secs: default_llm_timeout_secs(),
            history_window: default_history_window(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.todo-agent/config.toml)
    ///
    /// If the configuration file doesn't exist, writes a default one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or written, TOML parsing
    /// fails, or validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default();

        // Written before path expansion so the file stays portable
        let toml_string = config.to_toml_string()?;
        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = config;
        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.todo-agent/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".todo-agent").join("config.toml"))
    }

    /// Serialize to pretty TOML
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Resolved database file location
    pub fn database_path(&self) -> PathBuf {
        self.core
            .database_path
            .clone()
            .unwrap_or_else(|| self.core.data_dir.join("todos.db"))
    }

    /// Validate and process configuration
    ///
    /// Checks enumerated fields and numeric ranges, then expands ~ in
    /// paths. Directories are created lazily by the database layer.
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        if !VALID_LOG_LEVELS.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if !VALID_PROVIDERS.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                VALID_PROVIDERS.join(", ")
            )));
        }

        if self.agent.max_retries == 0 {
            return Err(EngineError::Config(
                "agent.max_retries must be at least 1".to_string(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(EngineError::Config(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.agent.llm_timeout_secs == 0 {
            return Err(EngineError::Config(
                "agent.llm_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(EngineError::Config(
                "agent.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.agent.top_p) || self.agent.top_p == 0.0 {
            return Err(EngineError::Config(
                "agent.top_p must be in (0.0, 1.0]".to_string(),
            ));
        }
        if self.agent.max_tokens == 0 {
            return Err(EngineError::Config(
                "agent.max_tokens must be at least 1".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        if let Some(db_path) = &self.core.database_path {
            self.core.database_path = Some(expand_path(db_path)?);
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
