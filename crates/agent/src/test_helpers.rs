//! Shared test helpers: a stub model pool and a few small tools.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relay_config::{ModelConfig, ProviderKind};
use relay_core::deps::{DependencyKey, DependencyRegistry, DependencyRequirement};
use relay_core::error::{ProviderError, ToolError};
use relay_core::message::ToolCall;
use relay_core::provider::{ChatRequest, ChatResponse, ChatTransport, FinishReason};
use relay_core::tool::{Tool, ToolArgs, ToolOutput, ToolSchema};
use relay_providers::{Model, Router};
use serde::Deserialize;
use serde_json::{Value, json};

/// A transport standing in for a whole pool member.
///
/// Availability probes always succeed and routing requests always choose
/// `route_to`. Every other request pops the next scripted reply. Panics if
/// more work requests are made than replies provided.
pub struct StubTransport {
    route_to: String,
    replies: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StubTransport {
    pub fn new(route_to: &str, replies: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            route_to: route_to.into(),
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Requests other than probes and routing decisions, in order.
    pub fn work_requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !is_probe(r) && !is_routing(r))
            .cloned()
            .collect()
    }

    /// Routing decisions requested so far.
    pub fn routing_requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| is_routing(r))
            .cloned()
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

fn is_probe(request: &ChatRequest) -> bool {
    request.max_tokens == Some(1)
}

fn is_routing(request: &ChatRequest) -> bool {
    request
        .response_format
        .as_ref()
        .is_some_and(|f| f.name == "ModelChoice")
}

#[async_trait]
impl ChatTransport for StubTransport {
    fn name(&self) -> &str {
        "stub"
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let probe = is_probe(&request);
        let routing = is_routing(&request);
        self.requests.lock().unwrap().push(request);

        if probe {
            return Ok(ChatResponse {
                content: Some("yes".into()),
                finish_reason: FinishReason::Length,
                ..Default::default()
            });
        }
        if routing {
            return Ok(text_reply(&json!({ "model_id": self.route_to }).to_string()));
        }
        let reply = self.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(|| panic!("StubTransport: no more replies")))
    }
}

/// A single-model router whose only model is `main`.
pub fn stub_router(transport: Arc<StubTransport>) -> Arc<Router> {
    let model = Model::new(
        "main",
        ModelConfig::new(ProviderKind::Ollama, "main"),
        transport,
    );
    Arc::new(Router::new(vec![model], vec!["main".into()]).unwrap())
}

pub fn text_reply(text: &str) -> ChatResponse {
    ChatResponse {
        content: Some(text.into()),
        finish_reason: FinishReason::Stop,
        ..Default::default()
    }
}

pub fn tool_calls_reply(calls: Vec<ToolCall>) -> ChatResponse {
    ChatResponse {
        content: None,
        tool_calls: calls,
        finish_reason: FinishReason::ToolCalls,
        ..Default::default()
    }
}

pub fn call(id: &str, name: &str, args: Value) -> ToolCall {
    ToolCall::new(id, name, args.to_string())
}

// ── Tools ──────────────────────────────────────────────────

pub const GREETING: DependencyKey<String> = DependencyKey::new("greeting");

/// Reports 4°C for every city.
pub struct WeatherTool;

#[derive(Deserialize)]
struct CityArgs {
    city: String,
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }
    fn description(&self) -> &str {
        "Current temperature for a city"
    }
    fn parameters(&self) -> ToolSchema {
        ToolSchema::Structured(json!({
            "type": "object",
            "properties": { "city": { "type": "string" } },
            "required": ["city"],
            "additionalProperties": false
        }))
    }
    async fn execute(
        &self,
        _deps: &DependencyRegistry,
        args: ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        let args: CityArgs = args.parse()?;
        Ok(ToolOutput::Structured(
            json!({ "city": args.city, "temperature_c": 4.0 }),
        ))
    }
}

/// Always fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "flaky"
    }
    fn description(&self) -> &str {
        "Reads a sensor that is offline"
    }
    fn parameters(&self) -> ToolSchema {
        ToolSchema::None
    }
    async fn execute(
        &self,
        _deps: &DependencyRegistry,
        _args: ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "flaky".into(),
            reason: "sensor offline".into(),
        })
    }
}

/// Counts how often it ran.
pub struct CountingTool {
    pub calls: AtomicUsize,
}

impl CountingTool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        "counter"
    }
    fn description(&self) -> &str {
        "Counts invocations"
    }
    fn parameters(&self) -> ToolSchema {
        ToolSchema::None
    }
    async fn execute(
        &self,
        _deps: &DependencyRegistry,
        _args: ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ToolOutput::Text(n.to_string()))
    }
}

/// Returns the `greeting` dependency.
pub struct GreeterTool;

#[async_trait]
impl Tool for GreeterTool {
    fn name(&self) -> &str {
        "greeter"
    }
    fn description(&self) -> &str {
        "Says the configured greeting"
    }
    fn parameters(&self) -> ToolSchema {
        ToolSchema::None
    }
    fn dependency(&self) -> Option<DependencyRequirement> {
        Some(GREETING.requirement())
    }
    async fn execute(
        &self,
        deps: &DependencyRegistry,
        _args: ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::Text(deps.get(&GREETING)?.clone()))
    }
}

/// Sleeps for `delay`, then returns its own name.
pub struct SleepyTool {
    name: &'static str,
    delay: Duration,
}

impl SleepyTool {
    pub fn new(name: &'static str, delay: Duration) -> Self {
        Self { name, delay }
    }
}

#[async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        self.name
    }
    fn description(&self) -> &str {
        "Waits, then answers with its name"
    }
    fn parameters(&self) -> ToolSchema {
        ToolSchema::None
    }
    async fn execute(
        &self,
        _deps: &DependencyRegistry,
        _args: ToolArgs,
    ) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(ToolOutput::Text(self.name.to_string()))
    }
}
