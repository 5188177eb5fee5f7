//! # Relay Core
//!
//! Domain types, traits, and error definitions for the Relay agent engine.
//! This crate has **no framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping chat endpoints without touching the agent loop
//! - Easy testing with scripted transports and stub tools
//! - Clean dependency graph (all crates depend inward on core)

pub mod deps;
pub mod error;
pub mod message;
pub mod output;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use deps::{DependencyKey, DependencyRegistry, DependencyRequirement};
pub use error::{
    ContextError, DependencyError, Error, ModelError, ProviderError, RefinerError, Result,
    RouterError, ToolError,
};
pub use message::{
    AssistantContent, AssistantMessage, Context, ContextId, Message, Role, ToolCall,
    ToolCallFunction,
};
pub use output::{OutputFormat, ResponseFormat, StructuredOutput};
pub use provider::{ChatRequest, ChatResponse, ChatTransport, FinishReason, ToolChoice, ToolDefinition, Usage};
pub use tool::{Tool, ToolArgs, ToolOutput, ToolSchema, ToolSet};
