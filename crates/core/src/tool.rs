//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world: read
//! project files, search them, query services. Each tool declares its
//! parameter and result shapes and, optionally, one dependency it needs
//! from the caller's [`DependencyRegistry`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::deps::{DependencyRegistry, DependencyRequirement};
use crate::error::{DependencyError, ToolError};
use crate::provider::ToolDefinition;

/// Shape of a tool's parameters or results.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolSchema {
    /// Nothing is passed or returned.
    None,
    /// A raw string.
    Text,
    /// A JSON object described by a JSON schema.
    Structured(Value),
}

impl ToolSchema {
    /// The JSON schema exported to the model.
    pub fn to_json_schema(&self) -> Value {
        match self {
            ToolSchema::None => json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
            ToolSchema::Text => json!({ "type": "string" }),
            ToolSchema::Structured(schema) => schema.clone(),
        }
    }

    /// Interpret the raw argument text a model produced.
    pub fn parse_arguments(&self, raw: &str) -> Result<ToolArgs, ToolError> {
        match self {
            ToolSchema::None => Ok(ToolArgs::None),
            ToolSchema::Text => Ok(ToolArgs::Text(raw.to_string())),
            ToolSchema::Structured(_) => {
                let value: Value = serde_json::from_str(raw)
                    .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
                if !value.is_object() {
                    return Err(ToolError::InvalidArguments(format!(
                        "expected a JSON object, got {raw}"
                    )));
                }
                Ok(ToolArgs::Structured(value))
            }
        }
    }
}

/// Arguments handed to [`Tool::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum ToolArgs {
    None,
    Text(String),
    Structured(Value),
}

impl ToolArgs {
    /// Decode structured arguments into a typed value.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        match self {
            ToolArgs::Structured(value) => T::deserialize(value)
                .map_err(|e| ToolError::InvalidArguments(e.to_string())),
            ToolArgs::Text(text) => serde_json::from_str(text)
                .map_err(|e| ToolError::InvalidArguments(e.to_string())),
            ToolArgs::None => Err(ToolError::InvalidArguments(
                "tool takes no arguments".into(),
            )),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolArgs::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// What a tool returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    None,
    Text(String),
    Structured(Value),
}

impl ToolOutput {
    /// Serialize a typed result.
    pub fn structured<T: Serialize>(value: &T) -> Result<Self, ToolError> {
        serde_json::to_value(value)
            .map(ToolOutput::Structured)
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "<serialize>".into(),
                reason: e.to_string(),
            })
    }

    /// The text placed in the tool message.
    pub fn render(&self) -> String {
        match self {
            ToolOutput::None => String::new(),
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Structured(value) => value.to_string(),
        }
    }
}

/// The core Tool trait.
///
/// Tools are collected in a [`ToolSet`] and offered to the model by the agent
/// loop. `execute` receives the caller's dependency registry; tools that
/// declare a [`dependency`](Tool::dependency) can rely on it having been
/// verified before they run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file", "find").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    fn parameters(&self) -> ToolSchema;

    fn results(&self) -> ToolSchema {
        ToolSchema::None
    }

    /// The registry entry this tool needs, if any.
    fn dependency(&self) -> Option<DependencyRequirement> {
        None
    }

    /// Execute the tool with parsed arguments.
    async fn execute(
        &self,
        deps: &DependencyRegistry,
        args: ToolArgs,
    ) -> std::result::Result<ToolOutput, ToolError>;

    /// Check this tool's requirement against a registry.
    fn verify_dependencies(&self, deps: &DependencyRegistry) -> Result<(), DependencyError> {
        match self.dependency() {
            Some(requirement) => deps.verify(&requirement),
            None => Ok(()),
        }
    }

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().to_json_schema(),
            strict: true,
        }
    }
}

/// An ordered set of tools with unique names.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Verify every tool's dependency requirement.
    pub fn verify_dependencies(&self, deps: &DependencyRegistry) -> Result<(), DependencyError> {
        self.tools
            .iter()
            .try_for_each(|tool| tool.verify_dependencies(deps))
    }
}

impl Extend<Arc<dyn Tool>> for ToolSet {
    fn extend<I: IntoIterator<Item = Arc<dyn Tool>>>(&mut self, iter: I) {
        for tool in iter {
            self.register(tool);
        }
    }
}

impl FromIterator<Arc<dyn Tool>> for ToolSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Tool>>>(iter: I) -> Self {
        let mut set = ToolSet::new();
        set.extend(iter);
        set
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
