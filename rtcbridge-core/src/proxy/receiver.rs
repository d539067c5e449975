//! Receiver proxy

use super::{NativeSlot, Proxy, TrackProxy};
use crate::native::NativeReceiver;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Proxy around a native RTP receiver.
///
/// Once removed, the receiver ignores every `replace`/`resync`.
pub struct ReceiverProxy {
    native: NativeSlot<dyn NativeReceiver>,
    track: RwLock<Arc<TrackProxy>>,
    removed: AtomicBool,
}

impl ReceiverProxy {
    /// Wrap a native receiver
    pub fn new(native: Arc<dyn NativeReceiver>) -> Arc<Self> {
        let track = TrackProxy::remote(native.track());
        Arc::new(Self {
            native: NativeSlot::new(native),
            track: RwLock::new(track),
            removed: AtomicBool::new(false),
        })
    }

    /// Receiver ID read from the native receiver
    pub fn id(&self) -> String {
        self.native.get().id()
    }

    /// Track being received
    pub fn track(&self) -> Arc<TrackProxy> {
        Arc::clone(&self.track.read())
    }

    /// Whether the engine removed this receiver
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Mark this receiver removed. Returns `true` on the first call only.
    pub fn notify_removed(&self) -> bool {
        let first = !self.removed.swap(true, Ordering::AcqRel);
        if first {
            debug!("📴 Receiver {} removed", self.id());
        }
        first
    }
}

impl Proxy for ReceiverProxy {
    type Native = dyn NativeReceiver;

    fn native(&self) -> Arc<dyn NativeReceiver> {
        self.native.get()
    }

    fn replace(&self, native: Arc<dyn NativeReceiver>) {
        if self.is_removed() {
            return;
        }
        self.native.set(native);
        self.resync();
    }

    fn resync(&self) {
        if self.is_removed() {
            return;
        }
        let native_track = self.native.get().track();
        self.track.read().replace(native_track);
    }
}

impl fmt::Debug for ReceiverProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverProxy")
            .field("id", &self.id())
            .field("track", &self.track.read().id())
            .field("removed", &self.is_removed())
            .finish()
    }
}
