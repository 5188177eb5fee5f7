//! OpenAI-compatible chat transport.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Fireworks AI,
//! and any endpoint exposing `/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming)
//! - Tool use / function calling
//! - `json_schema` response formats
//! - Reasoning returned as `reasoning_content` or `reasoning`

use std::time::Duration;

use async_trait::async_trait;
use relay_config::{ModelConfig, ProviderKind};
use relay_core::error::ProviderError;
use relay_core::message::{AssistantMessage, Message, ToolCall};
use relay_core::output::ResponseFormat;
use relay_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible chat transport.
///
/// This handles the vast majority of endpoints since most expose an
/// OpenAI-compatible `/v1/chat/completions` route.
pub struct OpenAiCompatTransport {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatTransport {
    /// Create a new OpenAI-compatible transport.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Create the transport for a pool entry.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ProviderError> {
        let base_url = config.base_url();
        if base_url.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "model '{}' has no api_base",
                config.model_id
            )));
        }
        let api_key = match config.provider {
            ProviderKind::Openai => config.api_key.clone(),
            ProviderKind::Ollama => None,
        };
        Self::new(
            config.provider.as_str(),
            base_url,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| match m {
                Message::System { content } => ApiMessage::plain("system", content, None),
                Message::User { content, name } => {
                    ApiMessage::plain("user", content, name.clone())
                }
                Message::Tool {
                    tool_call_id,
                    content,
                    name,
                } => ApiMessage {
                    tool_call_id: Some(tool_call_id.clone()),
                    ..ApiMessage::plain("tool", content, name.clone())
                },
                Message::Assistant(reply) => Self::to_api_assistant(reply),
            })
            .collect()
    }

    fn to_api_assistant(reply: &AssistantMessage) -> ApiMessage {
        let text = reply.content.as_text();
        let tool_calls: Vec<ApiToolCall> = reply
            .tool_calls
            .iter()
            .map(|tc| ApiToolCall {
                id: tc.id.clone(),
                r#type: "function".into(),
                function: ApiFunction {
                    name: tc.function.name.clone(),
                    arguments: tc.function.arguments.clone(),
                },
            })
            .collect();

        ApiMessage {
            role: "assistant".into(),
            content: if text.is_empty() && !tool_calls.is_empty() {
                None
            } else {
                Some(text.into_owned())
            },
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            tool_call_id: None,
            name: reply.name.clone(),
            reasoning_content: None,
            reasoning: None,
        }
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                    strict: t.strict,
                },
            })
            .collect()
    }

    fn to_api_response_format(format: &ResponseFormat) -> ApiResponseFormat {
        ApiResponseFormat {
            r#type: "json_schema".into(),
            json_schema: ApiJsonSchema {
                name: format.name.clone(),
                schema: format.schema.clone(),
                strict: format.strict,
            },
        }
    }

    /// Build the JSON body for a chat request.
    fn to_api_request(request: &ChatRequest) -> ApiRequest {
        let tools = Self::to_api_tools(&request.tools);
        ApiRequest {
            model: request.model.clone(),
            messages: Self::to_api_messages(&request.messages),
            tool_choice: if tools.is_empty() {
                None
            } else {
                request.tool_choice
            },
            tools,
            response_format: request
                .response_format
                .as_ref()
                .map(Self::to_api_response_format),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }

    fn parse_finish_reason(raw: Option<&str>) -> FinishReason {
        match raw {
            None | Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("tool_calls") => FinishReason::ToolCalls,
            Some("content_filter") => FinishReason::ContentFilter,
            Some("function_call") => FinishReason::FunctionCall,
            Some(other) => {
                warn!(finish_reason = other, "Unknown finish reason, treating as stop");
                FinishReason::Stop
            }
        }
    }

    fn from_api_response(api_response: ApiResponse) -> Result<ChatResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
            .collect();

        Ok(ChatResponse {
            content: choice.message.content,
            reasoning: choice
                .message
                .reasoning_content
                .or(choice.message.reasoning)
                .filter(|r| !r.is_empty()),
            tool_calls,
            finish_reason: Self::parse_finish_reason(choice.finish_reason.as_deref()),
            usage: api_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

#[async_trait]
impl ChatTransport for OpenAiCompatTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::to_api_request(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        Self::from_api_response(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ApiResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing)]
    reasoning_content: Option<String>,
    #[serde(default, skip_serializing)]
    reasoning: Option<String>,
}

impl ApiMessage {
    fn plain(role: &str, content: &str, name: Option<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name,
            reasoning_content: None,
            reasoning: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Serialize)]
struct ApiResponseFormat {
    r#type: String,
    json_schema: ApiJsonSchema,
}

#[derive(Debug, Serialize)]
struct ApiJsonSchema {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
