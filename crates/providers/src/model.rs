//! A configured chat model: endpoint, quirks and the completion contract.

use std::sync::Arc;

use relay_config::ModelConfig;
use relay_core::error::{ModelError, ProviderError};
use relay_core::message::{AssistantContent, AssistantMessage, Message};
use relay_core::output::{ResponseFormat, StructuredOutput};
use relay_core::provider::{
    ChatRequest, ChatTransport, FinishReason, ToolChoice, ToolDefinition, Usage,
};
use tracing::{debug, warn};

use crate::adapters;
use crate::openai_compat::OpenAiCompatTransport;

const AVAILABILITY_PROMPT: &str = "do not think. reply yes";

/// Optional parts of a completion call.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
    pub response_format: Option<ResponseFormat>,
    /// Maximum tokens to generate
    pub token_limit: Option<u32>,
}

impl CompletionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn with_token_limit(mut self, limit: Option<u32>) -> Self {
        self.token_limit = limit;
        self
    }
}

/// The result of a successful completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub message: AssistantMessage,
    pub finish_reason: FinishReason,
    pub usage: Option<Usage>,
}

/// A named endpoint configuration. Immutable; availability is probed on
/// demand.
pub struct Model {
    id: String,
    config: ModelConfig,
    transport: Arc<dyn ChatTransport>,
}

impl Model {
    pub fn new(
        id: impl Into<String>,
        config: ModelConfig,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            id: id.into(),
            config,
            transport,
        }
    }

    /// Build a model talking HTTP to its configured endpoint.
    pub fn from_config(id: impl Into<String>, config: ModelConfig) -> Result<Self, ProviderError> {
        let transport = OpenAiCompatTransport::from_config(&config)?;
        Ok(Self::new(id, config, Arc::new(transport)))
    }

    /// Pool id of this model.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn is_thinking(&self) -> bool {
        self.config.thinking
    }

    /// Send `messages` through the adapter chain and the transport.
    ///
    /// A `length` finish returns the partial reply inside
    /// [`ModelError::TokenLimitExceeded`]. With a response format, the content
    /// is parsed and checked against its schema.
    pub async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionRequest,
    ) -> Result<Completion, ModelError> {
        if options.response_format.is_some() && !options.tools.is_empty() {
            return Err(ModelError::InvalidRequest(
                "response_format cannot be combined with tools".into(),
            ));
        }
        if options.tool_choice == Some(ToolChoice::Required) && options.tools.is_empty() {
            return Err(ModelError::InvalidRequest(
                "tool_choice 'required' needs at least one tool".into(),
            ));
        }

        let mut request = ChatRequest {
            model: self.config.model_id.clone(),
            messages,
            tools: options.tools,
            tool_choice: options.tool_choice,
            response_format: options.response_format.clone(),
            temperature: self.config.temperature,
            max_tokens: options.token_limit,
        };

        let mut chain = adapters::chain_for(&self.config);
        adapters::apply_request(&mut chain, &mut request)?;

        debug!(
            model = %self.id,
            messages = request.messages.len(),
            tools = request.tools.len(),
            adapters = chain.len(),
            "Calling model"
        );

        let mut response = self.transport.send(request).await?;
        adapters::apply_response(&mut chain, &mut response)?;

        let finish_reason = response.finish_reason;
        let text = response.content.unwrap_or_default();
        let mut message = AssistantMessage {
            content: AssistantContent::Text(text),
            reasoning: response.reasoning,
            tool_calls: response.tool_calls,
            name: None,
        };

        debug!(
            model = %self.id,
            finish_reason = finish_reason.as_str(),
            tool_calls = message.tool_calls.len(),
            "Model replied"
        );

        if finish_reason == FinishReason::Length {
            warn!(model = %self.id, "Reply cut at token limit");
            return Err(ModelError::TokenLimitExceeded {
                partial: Box::new(message),
            });
        }

        message.check_tool_call_ids()?;

        if let Some(format) = &options.response_format {
            let value = format.parse(&message.content.as_text())?;
            message.content = AssistantContent::Structured(value);
        }

        Ok(Completion {
            message,
            finish_reason,
            usage: response.usage,
        })
    }

    /// Complete with `T`'s schema and decode the reply into `T`.
    pub async fn complete_structured<T: StructuredOutput>(
        &self,
        messages: Vec<Message>,
        token_limit: Option<u32>,
    ) -> Result<T, ModelError> {
        let completion = self
            .complete(
                messages,
                CompletionRequest::new()
                    .with_response_format(T::response_format())
                    .with_token_limit(token_limit),
            )
            .await?;
        T::from_content(&completion.message.content)
    }

    /// Probe the endpoint with a one-token request.
    ///
    /// Transport failures mean unavailable; any other failure is returned.
    pub async fn is_available(&self) -> Result<bool, ModelError> {
        if self.config.assume_available {
            return Ok(true);
        }

        let probe = self
            .complete(
                vec![Message::user(AVAILABILITY_PROMPT)],
                CompletionRequest::new().with_token_limit(Some(1)),
            )
            .await;

        match probe {
            Ok(_) | Err(ModelError::TokenLimitExceeded { .. }) => Ok(true),
            Err(ModelError::Transport(e)) => {
                debug!(model = %self.id, error = %e, "Model unavailable");
                Ok(false)
            }
            Err(e) => Err(ModelError::AvailabilityCheck {
                model: self.id.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.id)
            .field("transport", &self.transport.name())
            .field("config", &self.config)
            .finish()
    }
}
