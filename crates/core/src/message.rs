//! Message and Context domain types.
//!
//! These are the core value objects that flow through the entire system:
//! the caller seeds a [`Context`] → the agent loop sends its refined view to a
//! model → the reply and tool results are appended → refiners rewrite the view.

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ContextError;

/// Unique identifier for a context, used in log fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub String);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user (or a synthetic user turn)
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique ID for this tool call, echoed by the tool message answering it
    pub id: String,

    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON text, untyped at this layer
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function: ToolCallFunction {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Assistant content: free text or a validated structured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssistantContent {
    Text(String),
    Structured(serde_json::Value),
}

impl Default for AssistantContent {
    fn default() -> Self {
        AssistantContent::Text(String::new())
    }
}

impl AssistantContent {
    /// Render as text. Structured content is serialized as compact JSON.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            AssistantContent::Text(text) => Cow::Borrowed(text),
            AssistantContent::Structured(value) => Cow::Owned(value.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AssistantContent::Text(text) => text.is_empty(),
            AssistantContent::Structured(value) => value.is_null(),
        }
    }
}

/// A reply produced by a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: AssistantContent,

    /// Reasoning emitted on a separate channel or extracted from the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Tool calls, present only when the model requests calls
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AssistantMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: AssistantContent::Text(content.into()),
            ..Default::default()
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Every tool call id must be non-empty and unique within the reply.
    pub fn check_tool_call_ids(&self) -> Result<(), ContextError> {
        let mut seen = HashSet::with_capacity(self.tool_calls.len());
        for call in &self.tool_calls {
            if call.id.is_empty() || !seen.insert(call.id.as_str()) {
                return Err(ContextError::InvalidToolCallId {
                    tool_call_id: call.id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A single message in a context, tagged by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Assistant(AssistantMessage),
    Tool {
        tool_call_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
            name: None,
        }
    }

    /// Create a user message attributed to a named participant.
    pub fn user_named(content: impl Into<String>, name: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
            name: Some(name.into()),
        }
    }

    /// Create a plain-text assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant(AssistantMessage::text(content))
    }

    /// Create a tool result message.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            name,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant(_) => Role::Assistant,
            Message::Tool { .. } => Role::Tool,
        }
    }

    /// The message content rendered as text.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Message::System { content }
            | Message::User { content, .. }
            | Message::Tool { content, .. } => Cow::Borrowed(content),
            Message::Assistant(reply) => reply.content.as_text(),
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Message::Assistant(reply) => Some(reply),
            _ => None,
        }
    }

    /// Tool calls carried by an assistant message; empty for other roles.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant(reply) => &reply.tool_calls,
            _ => &[],
        }
    }
}

/// The message log for one task.
///
/// `raw` is append-only. `refined` is the view sent to models; appends go to
/// both, while refiners may replace `refined` wholesale. Every tool message
/// must answer a tool call that an earlier assistant message emitted and that
/// no other tool message has answered yet.
#[derive(Debug, Clone)]
pub struct Context {
    id: ContextId,
    raw: Vec<Message>,
    refined: Vec<Message>,
    pending: HashSet<String>,
}

impl Context {
    /// An empty context.
    pub fn empty() -> Self {
        Self {
            id: ContextId::new(),
            raw: Vec::new(),
            refined: Vec::new(),
            pending: HashSet::new(),
        }
    }

    /// Build a context from seed messages, checking the tool-call invariant.
    pub fn new(messages: Vec<Message>) -> Result<Self, ContextError> {
        let mut context = Self::empty();
        context.extend(messages)?;
        Ok(context)
    }

    /// A context holding an optional system prompt followed by a user prompt.
    pub fn simple(prompt: impl Into<String>, system_prompt: Option<&str>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(Message::system(system));
        }
        messages.push(Message::user(prompt));
        Self {
            id: ContextId::new(),
            raw: messages.clone(),
            refined: messages,
            pending: HashSet::new(),
        }
    }

    pub fn id(&self) -> &ContextId {
        &self.id
    }

    /// The refined view, sent to models.
    pub fn messages(&self) -> &[Message] {
        &self.refined
    }

    /// The full append-only history.
    pub fn raw_messages(&self) -> &[Message] {
        &self.raw
    }

    /// Append one message to both timelines.
    pub fn push(&mut self, message: Message) -> Result<(), ContextError> {
        match &message {
            Message::Tool { tool_call_id, .. } => {
                if !self.pending.remove(tool_call_id) {
                    return Err(ContextError::UnmatchedToolMessage {
                        tool_call_id: tool_call_id.clone(),
                    });
                }
            }
            Message::Assistant(reply) => {
                reply.check_tool_call_ids()?;
                if let Some(call) = reply
                    .tool_calls
                    .iter()
                    .find(|call| self.pending.contains(&call.id))
                {
                    return Err(ContextError::InvalidToolCallId {
                        tool_call_id: call.id.clone(),
                    });
                }
                self.pending
                    .extend(reply.tool_calls.iter().map(|call| call.id.clone()));
            }
            _ => {}
        }
        self.raw.push(message.clone());
        self.refined.push(message);
        Ok(())
    }

    /// Append several messages in order. Stops at the first violation.
    pub fn extend(
        &mut self,
        messages: impl IntoIterator<Item = Message>,
    ) -> Result<(), ContextError> {
        for message in messages {
            self.push(message)?;
        }
        Ok(())
    }

    /// Replace the refined view. The raw history is untouched.
    pub fn override_refined(&mut self, messages: Vec<Message>) {
        self.refined = messages;
    }

    /// Tool call ids emitted by the model and not yet answered.
    pub fn pending_tool_calls(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// The most recent assistant reply in the raw history.
    pub fn last_reply(&self) -> Option<&AssistantMessage> {
        self.raw.iter().rev().find_map(Message::as_assistant)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_with_calls(ids: &[&str]) -> Message {
        Message::Assistant(AssistantMessage::default().with_tool_calls(
            ids.iter()
                .map(|id| ToolCall::new(*id, "lookup", "{}"))
                .collect(),
        ))
    }

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.text(), "Hello, agent!");
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn message_serializes_with_role_tag() {
        let msg = Message::tool_result("call_1", "42", Some("lookup".into()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn structured_assistant_content_renders_as_json() {
        let msg = Message::Assistant(AssistantMessage {
            content: AssistantContent::Structured(serde_json::json!({"city": "Paris"})),
            ..Default::default()
        });
        assert_eq!(msg.text(), r#"{"city":"Paris"}"#);
    }

    #[test]
    fn simple_context_has_system_then_user() {
        let ctx = Context::simple("What's the weather?", Some("Be brief."));
        let roles: Vec<Role> = ctx.messages().iter().map(Message::role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);
        assert_eq!(ctx.raw_messages(), ctx.messages());
    }

    #[test]
    fn tool_message_must_answer_pending_call() {
        let mut ctx = Context::simple("hi", None);
        let err = ctx
            .push(Message::tool_result("call_1", "x", None))
            .unwrap_err();
        assert_eq!(
            err,
            ContextError::UnmatchedToolMessage {
                tool_call_id: "call_1".into()
            }
        );
        assert_eq!(ctx.raw_messages().len(), 1);
    }

    #[test]
    fn tool_call_can_only_be_answered_once() {
        let mut ctx = Context::simple("hi", None);
        ctx.push(reply_with_calls(&["a", "b"])).unwrap();
        ctx.push(Message::tool_result("b", "ok", None)).unwrap();
        assert_eq!(ctx.pending_tool_calls().collect::<Vec<_>>(), vec!["a"]);

        assert!(ctx.push(Message::tool_result("b", "again", None)).is_err());
        ctx.push(Message::tool_result("a", "ok", None)).unwrap();
        assert_eq!(ctx.pending_tool_calls().count(), 0);
    }

    #[test]
    fn duplicate_or_empty_call_ids_are_rejected_whole() {
        let mut ctx = Context::simple("hi", None);

        let err = ctx.push(reply_with_calls(&["call_0", "call_0"])).unwrap_err();
        assert_eq!(
            err,
            ContextError::InvalidToolCallId {
                tool_call_id: "call_0".into()
            }
        );
        assert!(ctx.push(reply_with_calls(&["a", ""])).is_err());
        assert_eq!(ctx.raw_messages().len(), 1);
        assert_eq!(ctx.pending_tool_calls().count(), 0);

        ctx.push(reply_with_calls(&["a"])).unwrap();
        assert!(ctx.push(reply_with_calls(&["a"])).is_err());
        assert_eq!(ctx.raw_messages().len(), 2);
    }

    #[test]
    fn seed_messages_are_validated() {
        let err = Context::new(vec![
            Message::user("hi"),
            Message::tool_result("ghost", "boo", None),
        ])
        .unwrap_err();
        assert!(matches!(err, ContextError::UnmatchedToolMessage { .. }));
    }

    #[test]
    fn override_replaces_only_refined() {
        let mut ctx = Context::simple("first", None);
        ctx.push(Message::assistant("answer")).unwrap();
        ctx.override_refined(vec![Message::user("summary")]);

        assert_eq!(ctx.messages().len(), 1);
        assert_eq!(ctx.raw_messages().len(), 2);

        ctx.push(Message::user("next")).unwrap();
        assert_eq!(ctx.messages().len(), 2);
        assert_eq!(ctx.raw_messages().len(), 3);
        assert_eq!(ctx.last_reply().unwrap().content.as_text(), "answer");
    }
}
