//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the database pool and configuration.

use crate::{config::Config, db::Db};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub config: Arc<Config>,
    /// Instruction given to the model at setup, if `system_prompt.md` exists.
    pub system_prompt: Option<Arc<String>>,
}
