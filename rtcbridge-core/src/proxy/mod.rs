//! Proxy graph over native engine objects
//!
//! A proxy keeps a stable identity for the application while the engine is
//! free to swap the native object underneath it. Each proxy holds its current
//! native handle in a [`NativeSlot`]; `replace` installs a new handle and
//! `resync` re-derives every cached field and child proxy from it.
//!
//! Ownership:
//! - [`TransceiverProxy`] owns its [`SenderProxy`] and [`ReceiverProxy`]
//! - [`SenderProxy`] and [`ReceiverProxy`] share their [`TrackProxy`]
//! - [`PeerConnectionProxy`] owns the ordered list of transceivers

pub mod peer;
pub mod receiver;
pub mod sender;
pub mod track;
pub mod transceiver;

pub use peer::PeerConnectionProxy;
pub use receiver::ReceiverProxy;
pub use sender::SenderProxy;
pub use track::{TrackProxy, TrackSettings};
pub use transceiver::TransceiverProxy;

use parking_lot::RwLock;
use std::sync::Arc;

/// Wrapper kept in sync with a swappable native object
pub trait Proxy {
    /// Native object type
    type Native: ?Sized;

    /// Current native handle
    fn native(&self) -> Arc<Self::Native>;

    /// Install a new native handle and resync from it
    fn replace(&self, native: Arc<Self::Native>);

    /// Re-derive cached state and children from the current native handle
    fn resync(&self);
}

/// Indirection cell holding the current native handle of a proxy
pub struct NativeSlot<T: ?Sized> {
    current: RwLock<Arc<T>>,
}

impl<T: ?Sized> NativeSlot<T> {
    /// Create a slot holding `native`
    pub fn new(native: Arc<T>) -> Self {
        Self {
            current: RwLock::new(native),
        }
    }

    /// Clone out the current handle
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a new handle, returning the previous one
    pub fn set(&self, native: Arc<T>) -> Arc<T> {
        std::mem::replace(&mut *self.current.write(), native)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_slot_swap() {
        let slot = NativeSlot::new(Arc::new(1u32));
        assert_eq!(*slot.get(), 1);

        let previous = slot.set(Arc::new(2));
        assert_eq!(*previous, 1);
        assert_eq!(*slot.get(), 2);
    }
}
