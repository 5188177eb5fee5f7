//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, plus a fixed
//! per-message overhead. Good enough to decide when a context is worth
//! summarizing; never used for hard limits.

use relay_core::message::Message;
use relay_core::provider::ToolDefinition;

/// Tokens charged per message for role names and delimiters.
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message including per-message overhead.
///
/// Tool call arguments count toward the assistant message that made them.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let calls: usize = message
        .tool_calls()
        .iter()
        .map(|call| estimate_tokens(&call.function.name) + estimate_tokens(&call.function.arguments))
        .sum();
    MESSAGE_OVERHEAD + estimate_tokens(&message.text()) + calls
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Estimate tokens for a tool definition (serialized as JSON).
pub fn estimate_tool_tokens(tool: &ToolDefinition) -> usize {
    let json = serde_json::to_string(tool).unwrap_or_default();
    estimate_tokens(&json)
}
