use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

use crate::error::{RealtimeError, RealtimeResult};

/// Single-slot handshake outcome. Only the first `resolve` is delivered.
#[derive(Debug)]
pub(crate) struct PendingConnect {
    slot: Mutex<Option<oneshot::Sender<RealtimeResult<()>>>>,
}

impl PendingConnect {
    pub(crate) fn new() -> (Self, oneshot::Receiver<RealtimeResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// An already-resolved slot, used before the first `connect()`.
    pub(crate) fn resolved() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Delivers `outcome` if nobody resolved the slot yet.
    ///
    /// Returns `false` when this call was a no-op.
    pub(crate) fn resolve(&self, outcome: RealtimeResult<()>) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => {
                // The waiting `connect()` may already be gone; the slot still counts as resolved.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    pub(crate) fn fail(&self, err: RealtimeError) -> bool {
        self.resolve(Err(err))
    }
}
