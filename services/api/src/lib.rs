//! Lumen API Library Crate
//!
//! The web service around the voice session core: configuration, session
//! history storage, REST handlers, the browser WebSocket bridge, and routing.
//! The binaries are thin wrappers around this library.

pub mod audio_utils;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
