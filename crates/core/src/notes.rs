//! Notes Tool Service
//!
//! An MCP tool server the model can use during a voice session to jot down
//! things the user asks it to remember. The notes live as long as the service
//! and are cleared whenever a new session resets the tool bridge.

use chrono::Utc;
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Name of the tool that clears all notes; used as the bridge's reset tool.
pub const CLEAR_NOTES_TOOL: &str = "clear_notes";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Note {
    pub text: String,
    /// RFC 3339 timestamp of when the note was taken.
    pub taken_at: String,
}

/// Arguments for the `take_note` tool.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct TakeNoteArgs {
    #[schemars(description = "The note to remember, as a short self-contained sentence")]
    pub text: String,
}

/// MCP service exposing note-taking tools to the model.
#[derive(Clone)]
pub struct NotesService {
    notes: Arc<Mutex<Vec<Note>>>,
    tool_router: ToolRouter<Self>,
}

impl Default for NotesService {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for NotesService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some("Tools for keeping notes during a voice conversation.".into()),
            ..Default::default()
        }
    }
}

#[tool_router]
impl NotesService {
    pub fn new() -> Self {
        Self {
            notes: Arc::new(Mutex::new(Vec::new())),
            tool_router: Self::tool_router(),
        }
    }

    /// Current notes, oldest first.
    pub async fn notes(&self) -> Vec<Note> {
        self.notes.lock().await.clone()
    }

    #[tool(description = "Save a note the user asked you to remember.")]
    pub async fn take_note(&self, args: Parameters<TakeNoteArgs>) -> Result<String, String> {
        let text = args.0.text.trim();
        if text.is_empty() {
            return Err("Note text must not be empty.".to_string());
        }
        info!(len = text.len(), "Executing tool 'take_note'");
        let mut notes = self.notes.lock().await;
        notes.push(Note {
            text: text.to_string(),
            taken_at: Utc::now().to_rfc3339(),
        });
        Ok(json!({ "saved": true, "count": notes.len() }).to_string())
    }

    #[tool(description = "List every note saved during this conversation.")]
    pub async fn list_notes(&self) -> Result<String, String> {
        info!("Executing tool 'list_notes'");
        let notes = self.notes.lock().await;
        serde_json::to_string(&json!({ "notes": *notes }))
            .map_err(|e| format!("Failed to serialize notes: {}", e))
    }

    #[tool(description = "Delete all saved notes.")]
    pub async fn clear_notes(&self) -> Result<String, String> {
        let mut notes = self.notes.lock().await;
        info!(count = notes.len(), "Executing tool 'clear_notes'");
        notes.clear();
        Ok(json!({ "cleared": true }).to_string())
    }
}
