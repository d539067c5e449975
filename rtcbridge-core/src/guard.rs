//! Disposal fence for outbound deliveries
//!
//! Every event and every asynchronous command result leaving a connection
//! goes through [`DisposalGuard::deliver`]. Once [`DisposalGuard::dispose`]
//! returns, nothing else is delivered.

use parking_lot::ReentrantMutex;
use std::cell::Cell;
use tracing::debug;

/// Mutual-exclusion fence between disposal and delivery.
///
/// The lock is re-entrant: a delivery callback may dispose the connection it
/// is being called for. Deliveries attempted afterwards are dropped.
#[derive(Debug, Default)]
pub struct DisposalGuard {
    disposed: ReentrantMutex<Cell<bool>>,
}

impl DisposalGuard {
    /// Create a guard in the live state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark disposed. Returns `true` only for the call that flipped the flag.
    pub fn dispose(&self) -> bool {
        let disposed = self.disposed.lock();
        !disposed.replace(true)
    }

    /// Whether [`DisposalGuard::dispose`] was called
    pub fn is_disposed(&self) -> bool {
        self.disposed.lock().get()
    }

    /// Run `deliver` unless disposed, holding the fence for its duration.
    ///
    /// Returns whether `deliver` ran.
    pub fn deliver<F: FnOnce()>(&self, deliver: F) -> bool {
        let disposed = self.disposed.lock();
        if disposed.get() {
            debug!("Dropping delivery after dispose");
            return false;
        }
        deliver();
        true
    }
}
