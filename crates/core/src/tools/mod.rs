//! Tool execution for model-initiated function calls.

mod mcp;
mod router;

pub use mcp::{McpToolBridge, serve_in_process};
pub use router::ToolCallRouter;

use async_trait::async_trait;
use gemini_realtime::FunctionDeclaration;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolBridgeError {
    #[error("MCP transport failed: {0}")]
    Transport(String),
    #[error("Tool '{name}' failed: {message}")]
    Tool { name: String, message: String },
    #[error("Arguments for '{0}' must be a JSON object")]
    InvalidArguments(String),
}

/// The executor behind model tool calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolBridge: Send + Sync {
    /// Starts a fresh tool session and returns the tools to declare to the model.
    async fn reset(&self) -> Result<Vec<FunctionDeclaration>, ToolBridgeError>;

    async fn execute(&self, name: &str, arguments: Value) -> Result<Value, ToolBridgeError>;
}

/// Shapes an execution outcome into the `response` object sent to the model.
///
/// Objects pass through; other values are wrapped as `{"output": ..}` and
/// failures as `{"error": ..}`.
pub fn response_payload(outcome: Result<Value, ToolBridgeError>) -> Value {
    match outcome {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(value) => json!({ "output": value }),
        Err(e) => json!({ "error": e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shapes() {
        assert_eq!(response_payload(Ok(json!({"a": 1}))), json!({"a": 1}));
        assert_eq!(response_payload(Ok(json!("done"))), json!({"output": "done"}));
        assert_eq!(
            response_payload(Err(ToolBridgeError::InvalidArguments("take_note".into()))),
            json!({"error": "Arguments for 'take_note' must be a JSON object"})
        );
    }
}
