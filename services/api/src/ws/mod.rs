//! WebSocket Session Management
//!
//! Each browser connection drives its own voice session controller:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle and forwards commands.
//! - `audio`: Bridges browser microphone and speaker to the controller's audio device.

pub mod audio;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
