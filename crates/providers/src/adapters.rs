//! Model adapters: per-endpoint quirks applied around the wire call.
//!
//! A chain is built fresh for every call from the model's configuration.
//! Requests pass through the adapters in order; responses come back through
//! them in reverse, so each adapter sees the reply in the shape it produced
//! the request for.
//!
//! | Order | Adapter | Enabled by |
//! |-------|---------|------------|
//! | 1 | [`InlineReasoning`] | `thinking_in_content = "inline_tag"` |
//! | 2 | [`StructuredAsToolCall`] | `response_format_handling = "tool_call"` |
//! | 2 | [`StructuredInSystemPrompt`] | `response_format_handling = "system_prompt"` |
//! | 3 | [`AutoToolChoiceAsNone`] | `override_auto_tool_choice` |
//! | 4 | [`RequiredToolChoiceAsInstruction`] | `required_tool_choice_in_prompt` |

use relay_config::{ModelConfig, ResponseFormatHandling, ThinkingInContent};
use relay_core::error::ModelError;
use relay_core::message::Message;
use relay_core::provider::{ChatRequest, ChatResponse, FinishReason, ToolChoice, ToolDefinition};

/// Name of the tool that carries structured output.
pub const FINAL_OUTPUT_TOOL: &str = "final_output";

const FINAL_OUTPUT_INSTRUCTION: &str = "You MUST provide your response by using the \
'final_output' tool call. Put your whole answer in its arguments and do not reply with \
plain text.";

const REQUIRED_TOOL_INSTRUCTION: &str = "You MUST call at least one of the available \
tools in your reply. Do not answer with plain text only.";

/// One step of the adapter chain.
pub trait ModelAdapter: Send {
    fn name(&self) -> &'static str;

    /// Rewrite the outgoing request.
    fn adjust_request(&mut self, _request: &mut ChatRequest) -> Result<(), ModelError> {
        Ok(())
    }

    /// Rewrite the incoming response.
    fn adjust_response(&mut self, _response: &mut ChatResponse) -> Result<(), ModelError> {
        Ok(())
    }
}

/// Build the ordered chain for a model.
pub fn chain_for(config: &ModelConfig) -> Vec<Box<dyn ModelAdapter>> {
    let mut chain: Vec<Box<dyn ModelAdapter>> = Vec::new();

    if config.thinking_in_content == ThinkingInContent::InlineTag {
        chain.push(Box::new(InlineReasoning));
    }
    match config.response_format_handling {
        ResponseFormatHandling::None => {}
        ResponseFormatHandling::ToolCall => chain.push(Box::new(StructuredAsToolCall::default())),
        ResponseFormatHandling::SystemPrompt => chain.push(Box::new(StructuredInSystemPrompt)),
    }
    if config.override_auto_tool_choice {
        chain.push(Box::new(AutoToolChoiceAsNone));
    }
    if config.required_tool_choice_in_prompt {
        chain.push(Box::new(RequiredToolChoiceAsInstruction));
    }
    chain
}

/// Run every adapter's request hook, in order.
pub fn apply_request(
    chain: &mut [Box<dyn ModelAdapter>],
    request: &mut ChatRequest,
) -> Result<(), ModelError> {
    for adapter in chain.iter_mut() {
        adapter.adjust_request(request)?;
    }
    Ok(())
}

/// Run every adapter's response hook, in reverse order.
pub fn apply_response(
    chain: &mut [Box<dyn ModelAdapter>],
    response: &mut ChatResponse,
) -> Result<(), ModelError> {
    for adapter in chain.iter_mut().rev() {
        adapter.adjust_response(response)?;
    }
    Ok(())
}

// ── Reasoning ──

/// Splits `<think>...</think>answer` content into reasoning and answer.
pub struct InlineReasoning;

impl ModelAdapter for InlineReasoning {
    fn name(&self) -> &'static str {
        "inline_reasoning"
    }

    fn adjust_response(&mut self, response: &mut ChatResponse) -> Result<(), ModelError> {
        if response.reasoning.is_some() {
            return Ok(());
        }
        let Some(content) = response.content.as_deref().filter(|c| !c.is_empty()) else {
            return Ok(());
        };

        let parts: Vec<&str> = content.split("</think>").collect();
        let (reasoning, answer) = match parts.as_slice() {
            [_] => return Ok(()),
            [thinking, answer] => {
                let thinking = thinking.trim_start();
                let thinking = thinking.strip_prefix("<think>").unwrap_or(thinking);
                (thinking.trim().to_string(), answer.trim().to_string())
            }
            _ => {
                return Err(ModelError::Adapter {
                    adapter: self.name(),
                    reason: format!(
                        "expected at most one </think> tag, found {}",
                        parts.len() - 1
                    ),
                });
            }
        };
        response.reasoning = Some(reasoning);
        response.content = Some(answer);
        Ok(())
    }
}

// ── Structured output ──

/// Emulates `response_format` with a single mandatory `final_output` tool.
#[derive(Default)]
pub struct StructuredAsToolCall {
    active: bool,
}

impl ModelAdapter for StructuredAsToolCall {
    fn name(&self) -> &'static str {
        "structured_as_tool_call"
    }

    fn adjust_request(&mut self, request: &mut ChatRequest) -> Result<(), ModelError> {
        let Some(format) = request.response_format.take() else {
            return Ok(());
        };
        if !request.tools.is_empty() {
            return Err(ModelError::InvalidRequest(
                "response_format cannot be combined with tools".into(),
            ));
        }

        request.tools = vec![ToolDefinition {
            name: FINAL_OUTPUT_TOOL.into(),
            description: format!("Submit the final output ({}).", format.name),
            parameters: format.schema,
            strict: format.strict,
        }];
        request.tool_choice = Some(ToolChoice::Required);
        request
            .messages
            .insert(0, Message::system(FINAL_OUTPUT_INSTRUCTION));
        self.active = true;
        Ok(())
    }

    fn adjust_response(&mut self, response: &mut ChatResponse) -> Result<(), ModelError> {
        if !self.active || response.finish_reason == FinishReason::Length {
            return Ok(());
        }

        let arguments = match response.tool_calls.as_slice() {
            [call] if call.function.name == FINAL_OUTPUT_TOOL => call.function.arguments.trim(),
            calls => {
                return Err(ModelError::Adapter {
                    adapter: self.name(),
                    reason: format!(
                        "expected exactly one '{FINAL_OUTPUT_TOOL}' call, got [{}]",
                        calls
                            .iter()
                            .map(|c| c.function.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                });
            }
        };
        if arguments.is_empty() {
            return Err(ModelError::Adapter {
                adapter: self.name(),
                reason: format!("'{FINAL_OUTPUT_TOOL}' was called without arguments"),
            });
        }

        response.content = Some(arguments.to_string());
        response.tool_calls.clear();
        response.finish_reason = FinishReason::Stop;
        Ok(())
    }
}

/// Describes the schema in a system message instead of `response_format`.
pub struct StructuredInSystemPrompt;

impl ModelAdapter for StructuredInSystemPrompt {
    fn name(&self) -> &'static str {
        "structured_in_system_prompt"
    }

    fn adjust_request(&mut self, request: &mut ChatRequest) -> Result<(), ModelError> {
        let Some(format) = request.response_format.take() else {
            return Ok(());
        };
        let schema = serde_json::to_string_pretty(&format.schema)
            .unwrap_or_else(|_| format.schema.to_string());
        request.messages.insert(
            0,
            Message::system(format!(
                "Reply only with a JSON object named '{}' that conforms to this JSON schema. \
                 Do not wrap it in markdown or add any other text.\n{schema}",
                format.name
            )),
        );
        Ok(())
    }
}

// ── Tool choice ──

/// Drops `tool_choice = auto` from the request.
pub struct AutoToolChoiceAsNone;

impl ModelAdapter for AutoToolChoiceAsNone {
    fn name(&self) -> &'static str {
        "auto_tool_choice_as_none"
    }

    fn adjust_request(&mut self, request: &mut ChatRequest) -> Result<(), ModelError> {
        if request.tool_choice == Some(ToolChoice::Auto) {
            request.tool_choice = None;
        }
        Ok(())
    }
}

/// Replaces `tool_choice = required` with `auto` plus a system instruction.
pub struct RequiredToolChoiceAsInstruction;

impl ModelAdapter for RequiredToolChoiceAsInstruction {
    fn name(&self) -> &'static str {
        "required_tool_choice_as_instruction"
    }

    fn adjust_request(&mut self, request: &mut ChatRequest) -> Result<(), ModelError> {
        if request.tool_choice == Some(ToolChoice::Required) {
            request.tool_choice = Some(ToolChoice::Auto);
            request
                .messages
                .insert(0, Message::system(REQUIRED_TOOL_INSTRUCTION));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_config::ProviderKind;
    use relay_core::message::{Role, ToolCall};
    use relay_core::output::ResponseFormat;
    use serde_json::json;

    fn two_field_format() -> ResponseFormat {
        ResponseFormat::new(
            "WeatherReport",
            json!({
                "type": "object",
                "properties": {
                    "city": {"type": "string"},
                    "temperature": {"type": "number"}
                },
                "required": ["city", "temperature"],
                "additionalProperties": false
            }),
        )
    }

    fn structured_request() -> ChatRequest {
        ChatRequest {
            model: "m".into(),
            messages: vec![Message::user("weather?")],
            response_format: Some(two_field_format()),
            ..Default::default()
        }
    }

    fn text_response(content: &str) -> ChatResponse {
        ChatResponse {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    #[test]
    fn chain_follows_configuration_order() {
        let mut config = ModelConfig::new(ProviderKind::Ollama, "m");
        assert!(chain_for(&config).is_empty());

        config.thinking_in_content = ThinkingInContent::InlineTag;
        config.response_format_handling = ResponseFormatHandling::ToolCall;
        config.override_auto_tool_choice = true;
        config.required_tool_choice_in_prompt = true;
        let names: Vec<_> = chain_for(&config).iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            vec![
                "inline_reasoning",
                "structured_as_tool_call",
                "auto_tool_choice_as_none",
                "required_tool_choice_as_instruction"
            ]
        );
    }

    #[test]
    fn inline_reasoning_splits_on_closing_tag() {
        let mut response = text_response("<think>\nIt is cold there.\n</think>\n\nFour degrees.");
        InlineReasoning.adjust_response(&mut response).unwrap();
        assert_eq!(response.reasoning.as_deref(), Some("It is cold there."));
        assert_eq!(response.content.as_deref(), Some("Four degrees."));
    }

    #[test]
    fn inline_reasoning_leaves_untagged_or_reasoned_content() {
        let mut plain = text_response("just an answer");
        InlineReasoning.adjust_response(&mut plain).unwrap();
        assert!(plain.reasoning.is_none());
        assert_eq!(plain.content.as_deref(), Some("just an answer"));

        let mut reasoned = text_response("a</think>b");
        reasoned.reasoning = Some("channel".into());
        InlineReasoning.adjust_response(&mut reasoned).unwrap();
        assert_eq!(reasoned.content.as_deref(), Some("a</think>b"));
    }

    #[test]
    fn inline_reasoning_rejects_two_closing_tags() {
        let mut response = text_response("a</think>b</think>c");
        let err = InlineReasoning.adjust_response(&mut response).unwrap_err();
        assert!(matches!(err, ModelError::Adapter { adapter: "inline_reasoning", .. }));
    }

    #[test]
    fn tool_call_handling_rewrites_request() {
        let mut adapter = StructuredAsToolCall::default();
        let mut request = structured_request();
        adapter.adjust_request(&mut request).unwrap();

        assert!(request.response_format.is_none());
        assert_eq!(request.tool_choice, Some(ToolChoice::Required));
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].name, FINAL_OUTPUT_TOOL);
        assert_eq!(request.tools[0].parameters["required"][1], "temperature");
        assert_eq!(request.messages[0].role(), Role::System);
        assert!(request.messages[0].text().contains("final_output"));
    }

    #[test]
    fn tool_call_handling_moves_arguments_into_content() {
        let mut adapter = StructuredAsToolCall::default();
        adapter.adjust_request(&mut structured_request()).unwrap();

        let args = r#"{"city":"Jerusalem","temperature":4}"#;
        let mut response = ChatResponse {
            tool_calls: vec![ToolCall::new("c1", FINAL_OUTPUT_TOOL, args)],
            finish_reason: FinishReason::ToolCalls,
            ..Default::default()
        };
        adapter.adjust_response(&mut response).unwrap();

        assert_eq!(response.content.as_deref(), Some(args));
        assert!(response.tool_calls.is_empty());
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn tool_call_handling_rejects_wrong_shapes() {
        let shapes = vec![
            vec![],
            vec![
                ToolCall::new("c1", FINAL_OUTPUT_TOOL, "{}"),
                ToolCall::new("c2", FINAL_OUTPUT_TOOL, "{}"),
            ],
            vec![ToolCall::new("c1", "weather", "{}")],
            vec![ToolCall::new("c1", FINAL_OUTPUT_TOOL, "  ")],
        ];
        for calls in shapes {
            let mut adapter = StructuredAsToolCall::default();
            adapter.adjust_request(&mut structured_request()).unwrap();
            let mut response = ChatResponse {
                tool_calls: calls,
                ..Default::default()
            };
            assert!(adapter.adjust_response(&mut response).is_err());
        }
    }

    #[test]
    fn tool_call_handling_is_inert_without_response_format() {
        let mut adapter = StructuredAsToolCall::default();
        let mut request = ChatRequest {
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        adapter.adjust_request(&mut request).unwrap();
        assert!(request.tools.is_empty());
        assert_eq!(request.messages.len(), 1);

        let mut response = text_response("hello");
        adapter.adjust_response(&mut response).unwrap();
        assert_eq!(response.content.as_deref(), Some("hello"));
    }

    #[test]
    fn system_prompt_handling_embeds_schema() {
        let mut request = structured_request();
        StructuredInSystemPrompt.adjust_request(&mut request).unwrap();
        assert!(request.response_format.is_none());
        assert!(request.tools.is_empty());
        let instruction = request.messages[0].text();
        assert!(instruction.contains("WeatherReport"));
        assert!(instruction.contains("\"temperature\""));
    }

    #[test]
    fn auto_tool_choice_is_dropped() {
        let mut request = ChatRequest {
            tool_choice: Some(ToolChoice::Auto),
            ..Default::default()
        };
        AutoToolChoiceAsNone.adjust_request(&mut request).unwrap();
        assert_eq!(request.tool_choice, None);

        request.tool_choice = Some(ToolChoice::Required);
        AutoToolChoiceAsNone.adjust_request(&mut request).unwrap();
        assert_eq!(request.tool_choice, Some(ToolChoice::Required));
    }

    #[test]
    fn required_tool_choice_becomes_instruction() {
        let mut request = ChatRequest {
            messages: vec![Message::user("go")],
            tool_choice: Some(ToolChoice::Required),
            ..Default::default()
        };
        RequiredToolChoiceAsInstruction
            .adjust_request(&mut request)
            .unwrap();
        assert_eq!(request.tool_choice, Some(ToolChoice::Auto));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role(), Role::System);
    }
}
