use gemini_realtime::RealtimeError;
use thiserror::Error;

use crate::{audio::AudioError, tools::ToolBridgeError};

/// Errors surfaced by a session start, as one human-readable message each.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Could not connect: {0}")]
    Connection(#[from] RealtimeError),

    #[error(transparent)]
    Device(#[from] AudioError),

    #[error("Tool bridge failed: {0}")]
    ToolBridge(#[from] ToolBridgeError),

    /// The session was stopped while it was still starting.
    #[error("Session was stopped while starting")]
    Stopped,

    #[error("Session controller is no longer running")]
    ControllerClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_errors_keep_the_cause() {
        let err = SessionError::from(RealtimeError::HandshakeTimeout);
        assert_eq!(err.to_string(), "Could not connect: timed out");
    }

    #[test]
    fn device_errors_read_as_is() {
        let err = SessionError::from(AudioError::Device("no microphone".into()));
        assert_eq!(err.to_string(), "Audio device unavailable: no microphone");
    }
}
