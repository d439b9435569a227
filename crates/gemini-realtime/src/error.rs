use thiserror::Error;

use crate::ConnectionState;

/// Errors surfaced by the Live connection lifecycle.
///
/// Decode and encode failures of single frames never show up here; they are
/// logged and dropped inside the connection task.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The transport could not be opened or the setup frame could not be written.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No `setupComplete` arrived before the handshake deadline.
    #[error("timed out")]
    HandshakeTimeout,

    /// The server closed the socket.
    #[error("Connection closed: {0}")]
    Closed(String),

    /// The server announced an imminent close.
    #[error("Server is closing the connection ({0})")]
    GoAway(String),

    /// Read or write failure on an open socket.
    #[error("Transport error: {0}")]
    Transport(String),

    /// `connect()` was called while a connection instance is still live.
    #[error("Cannot connect while {0}")]
    InvalidState(ConnectionState),

    /// `disconnect()` was called before the handshake finished.
    #[error("Connection cancelled")]
    Cancelled,
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_reads_as_timed_out() {
        assert_eq!(RealtimeError::HandshakeTimeout.to_string(), "timed out");
    }

    #[test]
    fn invalid_state_names_the_state() {
        let err = RealtimeError::InvalidState(ConnectionState::Ready);
        assert_eq!(err.to_string(), "Cannot connect while Ready");
    }
}
