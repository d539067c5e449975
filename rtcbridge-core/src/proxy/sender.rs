//! Sender proxy

use super::{NativeSlot, Proxy, TrackProxy};
use crate::error::BridgeError;
use crate::native::NativeSender;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Proxy around a native RTP sender.
///
/// The sent track is shared: dropping or disposing the sender only releases
/// this sender's reference to it.
pub struct SenderProxy {
    native: NativeSlot<dyn NativeSender>,
    track: RwLock<Option<Arc<TrackProxy>>>,
    disposed: AtomicBool,
}

impl SenderProxy {
    /// Wrap a native sender
    pub fn new(native: Arc<dyn NativeSender>) -> Arc<Self> {
        let this = Arc::new(Self {
            native: NativeSlot::new(native),
            track: RwLock::new(None),
            disposed: AtomicBool::new(false),
        });
        this.resync();
        this
    }

    /// Sender ID read from the native sender
    pub fn id(&self) -> String {
        self.native.get().id()
    }

    /// Track currently being sent
    pub fn track(&self) -> Option<Arc<TrackProxy>> {
        self.track.read().clone()
    }

    /// Whether this sender was disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Mark this sender disposed. Further mutations become no-ops.
    pub fn set_disposed(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            debug!("🗑️ Sender {} disposed", self.id());
        }
    }

    /// Replace the sent track.
    ///
    /// Does nothing on a disposed sender. On success the sender keeps the
    /// given proxy instance; on rejection the previous track is kept and
    /// [`BridgeError::ReplaceTrackFailed`] is returned.
    pub fn replace_track(&self, track: Option<Arc<TrackProxy>>) -> Result<(), BridgeError> {
        if self.is_disposed() {
            let err = BridgeError::OperationOnDisposed {
                operation: "replaceTrack".to_string(),
            };
            debug!("{}", err);
            return Ok(());
        }

        let native = self.native.get();
        let native_track = track.as_ref().map(|t| t.native());
        if !native.set_track(native_track) {
            let sender_id = native.id();
            warn!("❌ Engine rejected track replacement on sender {}", sender_id);
            return Err(BridgeError::ReplaceTrackFailed { sender_id });
        }

        *self.track.write() = track;
        Ok(())
    }
}

impl Proxy for SenderProxy {
    type Native = dyn NativeSender;

    fn native(&self) -> Arc<dyn NativeSender> {
        self.native.get()
    }

    fn replace(&self, native: Arc<dyn NativeSender>) {
        if self.is_disposed() {
            return;
        }
        self.native.set(native);
        self.resync();
    }

    fn resync(&self) {
        let native_track = self.native.get().track();
        let mut track = self.track.write();
        match (native_track, track.as_ref()) {
            (None, _) => {
                if track.take().is_some() {
                    debug!("Sender {} lost its track", self.native.get().id());
                }
            }
            (Some(native_track), Some(current)) => current.replace(native_track),
            (Some(native_track), None) => {
                *track = Some(TrackProxy::remote(native_track));
            }
        }
    }
}

impl fmt::Debug for SenderProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderProxy")
            .field("id", &self.id())
            .field("track", &self.track.read().as_ref().map(|t| t.id()))
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeSender, FakeTrack};
    use crate::model::MediaType;

    #[test]
    fn test_track_absence_drops_reference() {
        let native = FakeSender::new("s1");
        native.swap_track(Some(FakeTrack::new("t1", MediaType::Audio)));
        let sender = SenderProxy::new(native.clone());
        assert!(sender.track().is_some());

        native.swap_track(None);
        sender.resync();
        assert!(sender.track().is_none());
    }

    #[test]
    fn test_resync_reuses_track_proxy() {
        let native = FakeSender::new("s1");
        native.swap_track(Some(FakeTrack::new("t1", MediaType::Video)));
        let sender = SenderProxy::new(native.clone());
        let before = sender.track().unwrap();

        native.swap_track(Some(FakeTrack::new("t2", MediaType::Video)));
        sender.resync();
        let after = sender.track().unwrap();

        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.id(), "t2");
    }

    #[test]
    fn test_replace_track_keeps_caller_instance() {
        let sender = SenderProxy::new(FakeSender::new("s1"));
        let track = TrackProxy::local(FakeTrack::new("cam", MediaType::Video), "cam");

        sender.replace_track(Some(Arc::clone(&track))).unwrap();
        assert!(Arc::ptr_eq(&sender.track().unwrap(), &track));

        sender.replace_track(None).unwrap();
        assert!(sender.track().is_none());
    }

    #[test]
    fn test_rejected_replace_track() {
        let native = FakeSender::new("s1");
        let sender = SenderProxy::new(native.clone());
        let first = TrackProxy::local(FakeTrack::new("a", MediaType::Audio), "mic");
        sender.replace_track(Some(Arc::clone(&first))).unwrap();

        native.reject_track_changes(true);
        let second = TrackProxy::local(FakeTrack::new("b", MediaType::Audio), "mic");
        let err = sender.replace_track(Some(second)).unwrap_err();

        assert_eq!(
            err,
            BridgeError::ReplaceTrackFailed {
                sender_id: "s1".to_string()
            }
        );
        assert!(Arc::ptr_eq(&sender.track().unwrap(), &first));
        assert_eq!(native.track().unwrap().id(), "a");
    }

    #[test]
    fn test_disposed_sender_ignores_replace_track() {
        let native = FakeSender::new("s1");
        let sender = SenderProxy::new(native.clone());
        sender.set_disposed();

        let track = TrackProxy::local(FakeTrack::new("cam", MediaType::Video), "cam");
        assert!(sender.replace_track(Some(track)).is_ok());
        assert!(native.track().is_none());
        assert!(sender.track().is_none());
        assert_eq!(native.set_track_calls(), 0);
    }

    #[test]
    fn test_release_sender_keeps_track_alive() {
        let native_track = FakeTrack::new("cam", MediaType::Video);
        let track = TrackProxy::local(native_track.clone(), "cam");
        let sender = SenderProxy::new(FakeSender::new("s1"));
        sender.replace_track(Some(Arc::clone(&track))).unwrap();
        assert_eq!(Arc::strong_count(&track), 2);

        drop(sender);
        assert_eq!(Arc::strong_count(&track), 1);
        assert_eq!(track.state(), crate::model::TrackState::Live);
    }
}
