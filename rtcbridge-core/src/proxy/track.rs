//! Track proxy

use super::{NativeSlot, Proxy};
use crate::model::{MediaType, TrackState};
use crate::native::NativeTrack;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Device ID recorded for tracks the engine created on the receiving side
pub const REMOTE_DEVICE_ID: &str = "remote";

/// Snapshot of a track's settings as of the last resync
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSettings {
    /// Track ID
    pub id: String,
    /// Device the track originates from, [`REMOTE_DEVICE_ID`] for received media
    pub device_id: String,
    /// Media kind
    pub kind: MediaType,
    /// Whether the track is enabled
    pub enabled: bool,
    /// Life-cycle state
    pub state: TrackState,
}

/// Shared proxy around a native media track.
///
/// Always handled as `Arc<TrackProxy>`: a track may be referenced by a
/// sender, a receiver and the application at the same time, and only the
/// last holder's release drops the native track.
pub struct TrackProxy {
    native: NativeSlot<dyn NativeTrack>,
    settings: RwLock<TrackSettings>,
}

impl TrackProxy {
    /// Wrap a track captured from a local device
    pub fn local(native: Arc<dyn NativeTrack>, device_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::with_device(native, device_id.into()))
    }

    /// Wrap a track the engine created for received media
    pub fn remote(native: Arc<dyn NativeTrack>) -> Arc<Self> {
        Arc::new(Self::with_device(native, REMOTE_DEVICE_ID.to_string()))
    }

    fn with_device(native: Arc<dyn NativeTrack>, device_id: String) -> Self {
        let settings = Self::read_settings(native.as_ref(), device_id);
        Self {
            native: NativeSlot::new(native),
            settings: RwLock::new(settings),
        }
    }

    fn read_settings(native: &dyn NativeTrack, device_id: String) -> TrackSettings {
        TrackSettings {
            id: native.id(),
            device_id,
            kind: native.kind(),
            enabled: native.enabled(),
            state: native.state(),
        }
    }

    /// Track ID as of the last resync
    pub fn id(&self) -> String {
        self.settings.read().id.clone()
    }

    /// Media kind
    pub fn kind(&self) -> MediaType {
        self.settings.read().kind
    }

    /// Settings snapshot
    pub fn settings(&self) -> TrackSettings {
        self.settings.read().clone()
    }

    /// Enable or disable the native track
    pub fn set_enabled(&self, enabled: bool) {
        self.native.get().set_enabled(enabled);
        self.settings.write().enabled = enabled;
    }

    /// Live state read from the native track
    pub fn state(&self) -> TrackState {
        self.native.get().state()
    }

    /// Stop the native track
    pub fn stop(&self) {
        debug!("⏹️ Stopping track {}", self.id());
        self.native.get().stop();
        self.settings.write().state = TrackState::Ended;
    }
}

impl Proxy for TrackProxy {
    type Native = dyn NativeTrack;

    fn native(&self) -> Arc<dyn NativeTrack> {
        self.native.get()
    }

    fn replace(&self, native: Arc<dyn NativeTrack>) {
        self.native.set(native);
        self.resync();
    }

    fn resync(&self) {
        let native = self.native.get();
        let mut settings = self.settings.write();
        let device_id = std::mem::take(&mut settings.device_id);
        *settings = Self::read_settings(native.as_ref(), device_id);
    }
}

impl fmt::Debug for TrackProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackProxy")
            .field("settings", &*self.settings.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeTrack;

    #[test]
    fn test_remote_track_settings() {
        let native = FakeTrack::new("t1", MediaType::Video);
        let track = TrackProxy::remote(native);
        let settings = track.settings();
        assert_eq!(settings.id, "t1");
        assert_eq!(settings.device_id, REMOTE_DEVICE_ID);
        assert_eq!(settings.kind, MediaType::Video);
        assert_eq!(settings.state, TrackState::Live);
    }

    #[test]
    fn test_replace_keeps_device_id() {
        let track = TrackProxy::local(FakeTrack::new("mic-1", MediaType::Audio), "mic");
        track.replace(FakeTrack::new("mic-2", MediaType::Audio));
        let settings = track.settings();
        assert_eq!(settings.id, "mic-2");
        assert_eq!(settings.device_id, "mic");
    }

    #[test]
    fn test_stop_and_enable() {
        let native = FakeTrack::new("cam", MediaType::Video);
        let track = TrackProxy::local(native.clone(), "cam");

        track.set_enabled(false);
        assert!(!native.enabled());
        assert!(!track.settings().enabled);

        track.stop();
        assert_eq!(native.state(), TrackState::Ended);
        assert_eq!(track.state(), TrackState::Ended);
    }
}
