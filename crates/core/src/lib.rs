//! Voice session core: orchestration of a Gemini Live connection, the audio
//! device, model tool calls and the conversation transcript.

pub mod audio;
pub mod controller;
pub mod error;
pub mod history;
pub mod message;
pub mod notes;
pub mod settings;
pub mod throttle;
pub mod tools;
pub mod transcript;

pub use audio::{AudioError, AudioIo, PcmChunker};
pub use controller::{Reply, SessionController, SessionSnapshot};
pub use error::SessionError;
pub use history::{HistoryStore, MemoryHistoryStore};
pub use message::{ChatMessage, Role, SessionRecord, derive_title};
pub use settings::SessionSettings;
pub use tools::{McpToolBridge, ToolBridge, ToolBridgeError, ToolCallRouter, serve_in_process};
pub use transcript::TranscriptAccumulator;
