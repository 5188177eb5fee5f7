//! Configuration loading, validation, and management for Relay.
//!
//! Loads configuration from `~/.relay/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! ```toml
//! router_pool = ["qwen3"]
//!
//! [models.qwen3]
//! provider = "ollama"
//! model_id = "qwen3:8b"
//! description = "General purpose model, good at simple tasks"
//! thinking_in_content = "inline_tag"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Base URL used for Ollama models, which never configure their own.
pub const OLLAMA_API_BASE: &str = "http://localhost:11434/v1";

/// The root configuration structure.
///
/// Maps directly to `~/.relay/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model ids tried, in order, as the routing coordinator
    #[serde(default)]
    pub router_pool: Vec<String>,

    /// Model pool, keyed by pool id
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Context summarization settings
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

/// Which wire dialect a model endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// A hosted OpenAI-compatible endpoint; needs `api_base` and `api_key`.
    #[default]
    #[serde(alias = "openai_compatible")]
    Openai,
    /// A local Ollama server on its OpenAI-compatible port.
    #[serde(alias = "ollama_chat")]
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

/// How a model is made to return structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatHandling {
    /// The endpoint supports `response_format` natively.
    #[default]
    None,
    /// The schema is described in a system message.
    SystemPrompt,
    /// The schema is offered as a single mandatory `final_output` tool.
    ToolCall,
}

/// Where a model puts its reasoning when it has no dedicated channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThinkingInContent {
    #[default]
    None,
    /// Reasoning precedes a closing `</think>` tag in the content.
    InlineTag,
}

/// One entry of the model pool.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name sent to the endpoint
    pub model_id: String,

    /// What the model is good at; shown to the routing coordinator
    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Whether the model reasons before answering
    #[serde(default)]
    pub thinking: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub response_format_handling: ResponseFormatHandling,

    #[serde(default)]
    pub thinking_in_content: ThinkingInContent,

    /// Omit `tool_choice = auto` from requests
    #[serde(default)]
    pub override_auto_tool_choice: bool,

    /// Turn `tool_choice = required` into a system instruction
    #[serde(default)]
    pub required_tool_choice_in_prompt: bool,

    /// Skip the availability probe
    #[serde(default)]
    pub assume_available: bool,

    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl ModelConfig {
    pub fn new(provider: ProviderKind, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            description: String::new(),
            api_base: None,
            api_key: None,
            thinking: false,
            temperature: None,
            response_format_handling: ResponseFormatHandling::default(),
            thinking_in_content: ThinkingInContent::default(),
            override_auto_tool_choice: false,
            required_tool_choice_in_prompt: false,
            assume_available: false,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// The endpoint base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        match self.provider {
            ProviderKind::Ollama => OLLAMA_API_BASE,
            ProviderKind::Openai => self.api_base.as_deref().unwrap_or_default(),
        }
    }

    fn validate(&self, id: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::ValidationError(format!("model '{id}': {reason}"));

        if self.model_id.trim().is_empty() {
            return Err(invalid("model_id must not be empty"));
        }
        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(invalid("temperature must be between 0.0 and 2.0"));
        }
        match self.provider {
            ProviderKind::Openai => {
                if self.api_base.as_deref().is_none_or(str::is_empty) {
                    return Err(invalid("openai models need api_base"));
                }
                if self.api_key.as_deref().is_none_or(str::is_empty) {
                    return Err(invalid(
                        "openai models need api_key (or RELAY_API_KEY / OPENAI_API_KEY)",
                    ));
                }
            }
            ProviderKind::Ollama => {
                if self.api_base.is_some() || self.api_key.is_some() {
                    return Err(invalid("ollama models must not set api_base or api_key"));
                }
            }
        }
        Ok(())
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model_id", &self.model_id)
            .field("description", &self.description)
            .field("api_base", &self.api_base)
            .field("api_key", &redact(&self.api_key))
            .field("thinking", &self.thinking)
            .field("temperature", &self.temperature)
            .field("response_format_handling", &self.response_format_handling)
            .field("thinking_in_content", &self.thinking_in_content)
            .field("override_auto_tool_choice", &self.override_auto_tool_choice)
            .field("required_tool_choice_in_prompt", &self.required_tool_choice_in_prompt)
            .field("assume_available", &self.assume_available)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Per-call generation cap passed to every model call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pool id of the summarization model; routed when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Estimated token count below which history is left alone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_threshold: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: None,
            token_threshold: Some(6000),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.relay/config.toml).
    ///
    /// Also checks environment variables:
    /// - `RELAY_API_KEY`, then `OPENAI_API_KEY`, for OpenAI models without a key
    /// - `RELAY_ROUTER_POOL` (comma separated) to replace the router pool
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file path, apply environment
    /// overrides and validate.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::info!("No config file found at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`, which maps a variable
    /// name to its value.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let shared_key = lookup("RELAY_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        if let Some(key) = shared_key.filter(|k| !k.is_empty()) {
            for (id, model) in &mut self.models {
                if model.provider == ProviderKind::Openai && model.api_key.is_none() {
                    tracing::debug!(model = %id, "Using API key from environment");
                    model.api_key = Some(key.clone());
                }
            }
        }

        if let Some(pool) = lookup("RELAY_ROUTER_POOL") {
            self.router_pool = pool
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".relay")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one model must be configured".into(),
            ));
        }
        for (id, model) in &self.models {
            if id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "model ids must not be empty".into(),
                ));
            }
            model.validate(id)?;
        }

        if self.router_pool.is_empty() {
            return Err(ConfigError::ValidationError(
                "router_pool must list at least one model".into(),
            ));
        }
        if !self.router_pool.iter().any(|id| self.models.contains_key(id)) {
            return Err(ConfigError::ValidationError(
                "router_pool must contain at least one configured model".into(),
            ));
        }

        if let Some(model) = &self.summarizer.model
            && !self.models.contains_key(model)
        {
            return Err(ConfigError::ValidationError(format!(
                "summarizer model '{model}' is not configured"
            )));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut local = ModelConfig::new(ProviderKind::Ollama, "qwen3:8b");
        local.description = "Local general purpose model, good at simple tasks".into();
        local.thinking = true;
        local.thinking_in_content = ThinkingInContent::InlineTag;

        Self {
            router_pool: vec!["qwen3".into()],
            models: BTreeMap::from([("qwen3".to_string(), local)]),
            agent: AgentSettings::default(),
            summarizer: SummarizerConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for relay_core::Error {
    fn from(err: ConfigError) -> Self {
        relay_core::Error::Config {
            message: err.to_string(),
        }
    }
}
