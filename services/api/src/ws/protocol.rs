//! Defines the WebSocket message protocol between the browser client and the API server.
//!
//! Microphone audio travels as binary frames (PCM16 mono at 24 kHz) and is not
//! part of this enum.

use lumen_core::SessionSnapshot;
use serde::{Deserialize, Serialize};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Connects to the model and starts capturing microphone audio.
    StartSession,
    /// Ends the conversation and archives it.
    StopSession,
    /// A typed user turn.
    UserMessage { text: String },
    /// A base64 JPEG camera frame; frames faster than the configured rate are dropped.
    VideoFrame { data: String },
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The complete session state, pushed whenever it changes.
    State { snapshot: SessionSnapshot },
    /// A chunk of model speech (base64 PCM16 mono at 24 kHz).
    AudioChunk { data: String },
    /// Drop everything queued for playback; the user interrupted the model.
    PlaybackStop,
    /// Reports a failure to the client.
    Error { message: String },
}
