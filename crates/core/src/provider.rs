//! Transport trait: the abstraction over chat-completion endpoints.
//!
//! A transport knows how to send one chat request to an endpoint and return
//! the first choice. Provider quirks are handled above it by the adapter
//! chain; the transport speaks the plain wire contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::{Message, ToolCall};
use crate::output::ResponseFormat;

/// How the model may use the offered tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    FunctionCall,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::FunctionCall => "function_call",
        }
    }
}

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,

    /// Whether the endpoint must follow the schema exactly
    #[serde(default)]
    pub strict: bool,
}

/// One chat-completion request, as seen after the adapter chain.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The endpoint's model identifier
    pub model: String,

    pub messages: Vec<Message>,

    pub tools: Vec<ToolDefinition>,

    /// Only sent when tools are present
    pub tool_choice: Option<ToolChoice>,

    pub response_format: Option<ResponseFormat>,

    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

/// The first choice of a chat-completion response.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    /// Text content, absent when the model only called tools
    pub content: Option<String>,

    /// Reasoning from a dedicated channel
    pub reasoning: Option<String>,

    pub tool_calls: Vec<ToolCall>,

    pub finish_reason: FinishReason,

    /// Token usage statistics
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core transport trait.
///
/// The HTTP implementation lives in `relay-providers`; tests substitute
/// scripted transports.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// A human-readable name for this transport (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Send a request and return the first choice.
    async fn send(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ProviderError>;
}
