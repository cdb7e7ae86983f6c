//! Single-assignment slot for probe outcomes.
//!
//! A probe has several independent ways to finish (response, transport
//! error, deadline). Each holds a clone of the slot; the first `fill` wins
//! and every later one is dropped.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use super::types::Outcome;

#[derive(Debug, Clone)]
pub struct OutcomeSlot {
    sender: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl OutcomeSlot {
    /// Create an empty slot and the receiver its outcome is delivered to
    pub fn new() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { sender: Arc::new(Mutex::new(Some(tx))) }, rx)
    }

    /// Deliver `outcome` if nothing has been delivered yet.
    ///
    /// Returns `true` only for the call that claimed the slot.
    pub fn fill(&self, outcome: Outcome) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            Some(tx) => {
                // A dropped receiver means nobody is waiting anymore; the slot is still spent
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}
