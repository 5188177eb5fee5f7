//! Shared test helpers: a scripted transport with no network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use relay_core::error::ProviderError;
use relay_core::provider::{ChatRequest, ChatResponse, ChatTransport, FinishReason, ToolDefinition};
use serde_json::json;

/// A transport that replays scripted responses.
///
/// One-token requests are availability probes and get the probe reply
/// without consuming the script. Every request is recorded. Panics if more
/// calls are made than responses provided.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    probe_reply: Option<ChatResponse>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<Result<ChatResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            probe_reply: Some(ChatResponse {
                content: Some("yes".into()),
                finish_reason: FinishReason::Length,
                ..Default::default()
            }),
        })
    }

    /// A transport whose probes get `probe_reply`.
    pub fn probing(
        probe_reply: ChatResponse,
        responses: Vec<Result<ChatResponse, ProviderError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            probe_reply: Some(probe_reply),
        })
    }

    /// A transport that fails every request with a network error.
    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            probe_reply: None,
        })
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let is_probe = request.max_tokens == Some(1);
        self.requests.lock().unwrap().push(request);

        let Some(probe_reply) = &self.probe_reply else {
            return Err(ProviderError::Network("connection refused".into()));
        };
        if is_probe {
            return Ok(probe_reply.clone());
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedTransport: no more responses"))
    }
}

/// Create a simple text response (no tool calls).
pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        content: Some(text.into()),
        finish_reason: FinishReason::Stop,
        ..Default::default()
    }
}

/// A tool definition to offer in requests.
pub fn weather_definition() -> ToolDefinition {
    ToolDefinition {
        name: "weather".into(),
        description: "Current weather for a city".into(),
        parameters: json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"],
            "additionalProperties": false
        }),
        strict: true,
    }
}
