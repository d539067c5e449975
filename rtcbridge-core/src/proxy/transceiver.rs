//! Transceiver proxy

use super::{NativeSlot, Proxy, ReceiverProxy, SenderProxy};
use crate::direction::{next_direction_for_recv, next_direction_for_send, Direction};
use crate::model::MediaType;
use crate::native::NativeTransceiver;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Proxy around a native RTP transceiver.
///
/// Owns its sender and receiver proxies for its whole lifetime; renegotiation
/// only swaps the native objects inside them.
pub struct TransceiverProxy {
    id: u64,
    native: NativeSlot<dyn NativeTransceiver>,
    sender: Arc<SenderProxy>,
    receiver: Arc<ReceiverProxy>,
    mid: RwLock<Option<String>>,
    /// Serializes read-modify-write of the native direction
    direction_lock: Mutex<()>,
    stopped: AtomicBool,
}

impl TransceiverProxy {
    /// Wrap a native transceiver under the given proxy ID
    pub fn new(id: u64, native: Arc<dyn NativeTransceiver>) -> Arc<Self> {
        let sender = SenderProxy::new(native.sender());
        let receiver = ReceiverProxy::new(native.receiver());
        let mid = native.mid();
        Arc::new(Self {
            id,
            native: NativeSlot::new(native),
            sender,
            receiver,
            mid: RwLock::new(mid),
            direction_lock: Mutex::new(()),
            stopped: AtomicBool::new(false),
        })
    }

    /// Proxy ID, unique within the owning peer connection
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Sender proxy
    pub fn sender(&self) -> Arc<SenderProxy> {
        Arc::clone(&self.sender)
    }

    /// Receiver proxy
    pub fn receiver(&self) -> Arc<ReceiverProxy> {
        Arc::clone(&self.receiver)
    }

    /// Negotiated media ID.
    ///
    /// Picked up from the native transceiver on first read after
    /// negotiation assigns it.
    pub fn mid(&self) -> Option<String> {
        let cached = self.mid.read().clone();
        if cached.is_some() {
            return cached;
        }
        self.sync_mid(self.native.get().as_ref());
        self.mid.read().clone()
    }

    /// Media kind
    pub fn media_type(&self) -> MediaType {
        self.native.get().media_type()
    }

    /// Current direction, read from the native transceiver
    pub fn direction(&self) -> Direction {
        self.native.get().direction()
    }

    /// Whether [`TransceiverProxy::stop`] was called
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Set the preferred direction
    pub fn set_direction(&self, direction: Direction) {
        let _guard = self.direction_lock.lock();
        self.native.get().set_direction(direction);
    }

    /// Turn sending on or off, keeping the receive side as it is.
    ///
    /// Returns the direction written to the native transceiver.
    pub fn set_send(&self, send: bool) -> Direction {
        self.update_direction(|current| next_direction_for_send(current, send))
    }

    /// Turn receiving on or off, keeping the send side as it is.
    ///
    /// Returns the direction written to the native transceiver.
    pub fn set_recv(&self, recv: bool) -> Direction {
        self.update_direction(|current| next_direction_for_recv(current, recv))
    }

    fn update_direction(&self, next: impl FnOnce(Direction) -> Direction) -> Direction {
        let _guard = self.direction_lock.lock();
        let native = self.native.get();
        let current = native.direction();
        let next = next(current);
        if next != current {
            debug!(
                "🔄 Transceiver {} direction: {} -> {}",
                self.id, current, next
            );
            native.set_direction(next);
        }
        next
    }

    /// Stop the transceiver.
    ///
    /// Marks the receiver removed and the sender disposed before stopping
    /// the native transceiver. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("⏹️ Stopping transceiver {} (mid {:?})", self.id, self.mid());
        self.receiver.notify_removed();
        self.sender.set_disposed();
        self.native.get().stop();
    }

    fn sync_mid(&self, native: &dyn NativeTransceiver) {
        let mut mid = self.mid.write();
        if mid.is_none() {
            *mid = native.mid();
        }
    }
}

impl Proxy for TransceiverProxy {
    type Native = dyn NativeTransceiver;

    fn native(&self) -> Arc<dyn NativeTransceiver> {
        self.native.get()
    }

    fn replace(&self, native: Arc<dyn NativeTransceiver>) {
        {
            // No direction update may straddle the swap
            let _guard = self.direction_lock.lock();
            self.native.set(native);
        }
        self.resync();
    }

    fn resync(&self) {
        let native = self.native.get();
        self.sync_mid(native.as_ref());
        self.sender.replace(native.sender());
        self.receiver.replace(native.receiver());
    }
}

impl fmt::Debug for TransceiverProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransceiverProxy")
            .field("id", &self.id)
            .field("mid", &*self.mid.read())
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
