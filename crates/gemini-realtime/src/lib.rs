//! Client for the Gemini Live bidirectional streaming API.
//!
//! [`GeminiLiveClient`] owns one connection instance at a time. It performs the
//! `setup` handshake, exposes the connection state through a watch channel and
//! reports everything the server streams back as [`LiveEvent`]s on a single
//! receiver.

mod client;
mod config;
mod connection;
mod error;
mod pending;
mod state;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::GeminiLiveClient;
pub use config::{DEFAULT_ENDPOINT, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MODEL, LiveConfig};
pub use error::{RealtimeError, RealtimeResult};
pub use state::{ConnectionState, LiveEvent};
pub use types::{FunctionDeclaration, ResponseModality, ToolCall, ToolResponse};
