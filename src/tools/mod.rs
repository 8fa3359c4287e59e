//! Tool definitions, the executor trait, and name-based dispatch.

pub mod weather;

pub use weather::WeatherTool;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use thiserror::Error;

use crate::logging;
use crate::models::ToolDefinition;

// === Errors ===

/// Error raised inside a tool executor.
///
/// Never escapes the registry: [`ToolRegistry::dispatch`] converts it into a
/// structured `{"error": …}` payload so a turn can continue.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed(message.into())
    }
}

/// Fetch a required string field from a tool's input object.
pub fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ToolError::invalid_input(format!("missing required field '{key}'")))
}

// === ToolSpec ===

/// One executable tool: schema for the model, executor for the orchestrator.
#[async_trait]
pub trait ToolSpec: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> Value;
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

// === ToolRegistry ===

/// Static mapping from tool name to schema and executor.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn ToolSpec>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tool set.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(WeatherTool::new()));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn ToolSpec>) {
        self.tools.push(tool);
    }

    /// Tool definitions to advertise to the model.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// Execute a tool by name. Total at this interface: an unknown name or
    /// an executor fault comes back as a `{"error": …}` payload, never as
    /// an error the turn has to abort on.
    pub async fn dispatch(&self, name: &str, input: Value) -> Value {
        let Some(tool) = self.tools.iter().find(|tool| tool.name() == name) else {
            logging::warn(format!("Model requested unknown tool: {name}"));
            return json!({"error": format!("unknown tool: {name}")});
        };
        match tool.execute(input).await {
            Ok(result) => result,
            Err(err) => {
                logging::warn(format!("Tool {name} failed: {err}"));
                json!({"error": err.to_string()})
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl ToolSpec for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo the input text back."
        }

        fn parameters(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, input: Value) -> Result<Value, ToolError> {
            let text = required_str(&input, "text")?;
            Ok(json!({"echo": text}))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry
    }

    #[tokio::test]
    async fn dispatch_runs_registered_tool() {
        let result = registry().dispatch("echo", json!({"text": "hi"})).await;
        assert_eq!(result, json!({"echo": "hi"}));
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_returns_error_payload() {
        let result = registry().dispatch("nope", json!({})).await;
        assert_eq!(result["error"], "unknown tool: nope");
    }

    #[tokio::test]
    async fn executor_fault_becomes_error_payload() {
        let result = registry().dispatch("echo", json!({})).await;
        assert!(
            result["error"]
                .as_str()
                .unwrap()
                .contains("missing required field 'text'")
        );
    }

    #[test]
    fn definitions_expose_schema() {
        let definitions = registry().definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].name, "echo");
        assert_eq!(definitions[0].parameters["required"][0], "text");
    }
}
