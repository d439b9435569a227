use async_trait::async_trait;
use gemini_realtime::FunctionDeclaration;
use rmcp::{
    ServerHandler, ServiceExt,
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{ToolBridge, ToolBridgeError};

const DUPLEX_BUFFER: usize = 4096;

/// A [`ToolBridge`] backed by an MCP client session.
pub struct McpToolBridge {
    client: RunningService<RoleClient, ()>,
    reset_tool: Option<String>,
    server: Option<JoinHandle<()>>,
}

impl McpToolBridge {
    pub fn new(client: RunningService<RoleClient, ()>) -> Self {
        Self {
            client,
            reset_tool: None,
            server: None,
        }
    }

    /// Tool invoked by `reset()` to clear server-side session state.
    pub fn with_reset_tool(mut self, name: impl Into<String>) -> Self {
        self.reset_tool = Some(name.into());
        self
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolBridgeError> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            _ => return Err(ToolBridgeError::InvalidArguments(name.to_string())),
        };
        let result = self
            .client
            .peer()
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments,
            })
            .await
            .map_err(|e| ToolBridgeError::Transport(e.to_string()))?;

        let text = result
            .content
            .unwrap_or_default()
            .into_iter()
            .filter_map(|content| match content.raw {
                RawContent::Text(text_content) => Some(text_content.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if result.is_error == Some(true) {
            return Err(ToolBridgeError::Tool {
                name: name.to_string(),
                message: text,
            });
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[async_trait]
impl ToolBridge for McpToolBridge {
    async fn reset(&self) -> Result<Vec<FunctionDeclaration>, ToolBridgeError> {
        if let Some(reset_tool) = &self.reset_tool {
            self.call(reset_tool, Value::Null).await?;
            debug!(tool = %reset_tool, "Tool session reset");
        }
        let tools = self
            .client
            .list_all_tools()
            .await
            .map_err(|e| ToolBridgeError::Transport(e.to_string()))?;

        Ok(tools
            .into_iter()
            .map(|tool| {
                let mut schema = Value::Object((*tool.input_schema).clone());
                let has_properties = schema
                    .get("properties")
                    .and_then(Value::as_object)
                    .is_some_and(|properties| !properties.is_empty());
                if let Some(schema) = schema.as_object_mut() {
                    schema.remove("$schema");
                    schema.remove("title");
                }
                FunctionDeclaration {
                    name: tool.name.to_string(),
                    description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
                    parameters: has_properties.then_some(schema),
                }
            })
            .collect())
    }

    async fn execute(&self, name: &str, arguments: Value) -> Result<Value, ToolBridgeError> {
        info!(tool = %name, "Executing tool");
        self.call(name, arguments).await
    }
}

impl Drop for McpToolBridge {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

/// Runs `service` as an MCP server on an in-memory pipe and connects a bridge to it.
pub async fn serve_in_process<S: ServerHandler>(
    service: S,
) -> Result<McpToolBridge, ToolBridgeError> {
    let (server_transport, client_transport) = tokio::io::duplex(DUPLEX_BUFFER);

    let server = tokio::spawn(async move {
        match service.serve(server_transport).await {
            Ok(running) => {
                let _ = running.waiting().await;
            }
            Err(e) => warn!(error = %e, "In-process MCP server failed to start"),
        }
    });
    let client = ()
        .serve(client_transport)
        .await
        .map_err(|e| ToolBridgeError::Transport(e.to_string()))?;

    let mut bridge = McpToolBridge::new(client);
    bridge.server = Some(server);
    Ok(bridge)
}
