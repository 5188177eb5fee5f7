//! Structured output: target shapes a model reply must conform to.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ModelError;
use crate::message::AssistantContent;

/// A named JSON schema requested as the reply format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFormat {
    pub name: String,
    pub schema: Value,
    pub strict: bool,
}

impl ResponseFormat {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            strict: true,
        }
    }

    /// Parse reply text as JSON and check it against the schema's top-level
    /// shape: an object schema needs an object carrying every required key.
    pub fn parse(&self, text: &str) -> Result<Value, ModelError> {
        let value: Value =
            serde_json::from_str(text.trim()).map_err(|e| self.malformed(e.to_string()))?;
        self.check(&value)?;
        Ok(value)
    }

    fn check(&self, value: &Value) -> Result<(), ModelError> {
        if self.schema.get("type").and_then(Value::as_str) != Some("object") {
            return Ok(());
        }
        let Some(object) = value.as_object() else {
            return Err(self.malformed("expected a JSON object".into()));
        };
        let required = self
            .schema
            .get("required")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(self.malformed(format!("missing required field '{key}'")));
            }
        }
        Ok(())
    }

    fn malformed(&self, reason: String) -> ModelError {
        ModelError::MalformedOutput {
            schema: self.name.clone(),
            reason,
        }
    }
}

/// What the agent loop should produce at the end of a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OutputFormat {
    /// Free text.
    #[default]
    Text,
    /// A reply validated against the given schema.
    Structured(ResponseFormat),
}

impl OutputFormat {
    pub fn response_format(&self) -> Option<&ResponseFormat> {
        match self {
            OutputFormat::Text => None,
            OutputFormat::Structured(format) => Some(format),
        }
    }
}

/// A Rust type usable as a structured reply.
///
/// The schema is written by hand next to the type so the wire contract stays
/// visible in one place.
pub trait StructuredOutput: Serialize + DeserializeOwned + Send + 'static {
    /// Schema name sent to the endpoint.
    const NAME: &'static str;

    /// JSON schema of the type, strict-mode compatible.
    fn json_schema() -> Value;

    fn response_format() -> ResponseFormat {
        ResponseFormat::new(Self::NAME, Self::json_schema())
    }

    fn output_format() -> OutputFormat {
        OutputFormat::Structured(Self::response_format())
    }

    /// Decode assistant content into the type.
    fn from_content(content: &AssistantContent) -> Result<Self, ModelError> {
        let decoded = match content {
            AssistantContent::Structured(value) => Self::deserialize(value),
            AssistantContent::Text(text) => serde_json::from_str(text),
        };
        decoded.map_err(|e| ModelError::MalformedOutput {
            schema: Self::NAME.to_string(),
            reason: e.to_string(),
        })
    }
}
