//! Connection state and the event stream emitted by the client.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ToolCall;

/// Lifecycle of a single Live connection instance.
///
/// `Disconnected` and `Error` are terminal for an instance; the next
/// `connect()` starts a fresh one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    SettingUp,
    Ready,
    Error(String),
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }

    /// Whether a new connection instance may be started from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Error(_))
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::SettingUp => write!(f, "SettingUp"),
            ConnectionState::Ready => write!(f, "Ready"),
            ConnectionState::Error(reason) => write!(f, "Error({})", reason),
        }
    }
}

/// Everything the receive loop reports, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// The handshake finished; the connection is `Ready`.
    SetupComplete,
    /// The server will close the socket soon.
    GoAway { seconds: Option<f64> },
    /// The model's speech was cut off by the user.
    Interrupted,
    /// Decoded PCM16 mono audio to play back.
    AudioChunk { data: Bytes, sample_rate: u32 },
    /// The model finished its turn; all audio of the turn was already emitted.
    TurnComplete,
    /// Partial transcription of the user's speech.
    InputTranscription(String),
    /// Partial transcription of the model's speech.
    OutputTranscription(String),
    ToolCall(Vec<ToolCall>),
    ToolCallCancellation(Vec<String>),
    /// The connection ended after the handshake had already been reported.
    Disconnected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_state_display() {
        assert_eq!(ConnectionState::Ready.to_string(), "Ready");
        assert_eq!(ConnectionState::SettingUp.to_string(), "SettingUp");
        assert_eq!(
            ConnectionState::Error("timed out".into()).to_string(),
            "Error(timed out)"
        );
    }

    #[test]
    fn only_disconnected_and_error_are_terminal() {
        assert!(ConnectionState::Disconnected.is_terminal());
        assert!(ConnectionState::Error("x".into()).is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(!ConnectionState::SettingUp.is_terminal());
        assert!(!ConnectionState::Ready.is_terminal());
    }

    #[test]
    fn connection_state_serializes_tagged() {
        let json = serde_json::to_string(&ConnectionState::Error("boom".into())).unwrap();
        assert_eq!(json, r#"{"status":"error","message":"boom"}"#);
        let json = serde_json::to_string(&ConnectionState::Ready).unwrap();
        assert_eq!(json, r#"{"status":"ready"}"#);
    }
}
