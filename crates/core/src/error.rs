//! Error types for the Relay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] aggregates them.

use thiserror::Error;

use crate::message::AssistantMessage;

/// The top-level error type for all Relay operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Transport errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Dependency errors ---
    #[error("Dependency error: {0}")]
    Dependency(#[from] DependencyError),

    // --- Routing errors ---
    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    // --- Refiner errors ---
    #[error("Refiner error: {0}")]
    Refiner(#[from] RefinerError),

    // --- Context errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Control flow ---
    #[error("Agent run was cancelled")]
    Cancelled,
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to a chat-completion endpoint.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures produced by a model call, including the adapter chain.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Transport(#[from] ProviderError),

    /// The reply was cut at the token limit. The partial reply is kept so
    /// callers can recover.
    #[error("Token limit exceeded")]
    TokenLimitExceeded { partial: Box<AssistantMessage> },

    #[error("Invalid completion request: {0}")]
    InvalidRequest(String),

    #[error("Adapter '{adapter}' rejected the response: {reason}")]
    Adapter {
        adapter: &'static str,
        reason: String,
    },

    #[error("Model replied with invalid tool calls: {0}")]
    InvalidToolCalls(#[from] ContextError),

    #[error("Malformed structured output for '{schema}': {reason}")]
    MalformedOutput { schema: String, reason: String },

    #[error("Availability check for '{model}' failed unexpectedly: {reason}")]
    AvailabilityCheck { model: String, reason: String },
}

impl ModelError {
    /// Whether this error means the endpoint could not be reached or refused
    /// the request, as opposed to a problem with the request or reply itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, ModelError::Transport(_))
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool {0} not found")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

/// Caller misconfiguration of the dependency registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("Dependency '{key}' not found")]
    NotFound { key: String },

    #[error("Dependency '{key}' has a bad type: expected {expected}, found {found}")]
    BadType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Invalid router configuration: {0}")]
    InvalidPool(String),

    #[error("No available router model found")]
    NoAvailableRouter,

    #[error("All models are unavailable")]
    AllModelsUnavailable,

    #[error("Router chose unknown model '{0}'")]
    UnknownModel(String),

    #[error("Routing call failed: {0}")]
    Model(#[from] ModelError),
}

#[derive(Debug, Error)]
pub enum RefinerError {
    #[error("No assistant message found to split the context at")]
    NoAssistantMessage,

    #[error("Summarization call failed: {0}")]
    Model(#[from] ModelError),

    #[error("Summarization model routing failed: {0}")]
    Router(#[from] RouterError),
}

/// Violations of the message-log invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Tool message '{tool_call_id}' does not answer any pending tool call")]
    UnmatchedToolMessage { tool_call_id: String },

    #[error("Tool call id '{tool_call_id}' is empty or already in use")]
    InvalidToolCallId { tool_call_id: String },
}
