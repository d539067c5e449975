//! Binding to the native RTC engine
//!
//! These traits are the only way the rest of the crate touches engine
//! objects. Every native object is handed around as an `Arc<dyn ...>`: the
//! engine owns its lifetime and may swap or mutate it at any moment, so
//! nothing here caches state. Implementations must be callable from any
//! thread.

use crate::capabilities::{RtpCapabilities, VideoCodecInfo};
use crate::direction::Direction;
use crate::model::{
    IceCandidate, IceConnectionState, IceGatheringState, MediaType, OfferAnswerOptions,
    PeerConnectionConfiguration, PeerConnectionState, SessionDescription, SignalingState,
    TrackState, TransceiverInit,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by the native engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct NativeError {
    /// Engine-provided message
    pub message: String,
}

impl NativeError {
    /// Create a new native error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Native media track
pub trait NativeTrack: Send + Sync {
    /// Track ID
    fn id(&self) -> String;
    /// Media kind
    fn kind(&self) -> MediaType;
    /// Whether the track is enabled
    fn enabled(&self) -> bool;
    /// Enable or disable the track
    fn set_enabled(&self, enabled: bool);
    /// Life-cycle state
    fn state(&self) -> TrackState;
    /// Stop the track permanently
    fn stop(&self);
}

/// Native RTP sender
pub trait NativeSender: Send + Sync {
    /// Sender ID
    fn id(&self) -> String;
    /// Track currently being sent, if any
    fn track(&self) -> Option<Arc<dyn NativeTrack>>;
    /// Swap the sent track. Returns `false` when the engine rejects it.
    fn set_track(&self, track: Option<Arc<dyn NativeTrack>>) -> bool;
}

/// Native RTP receiver
pub trait NativeReceiver: Send + Sync {
    /// Receiver ID
    fn id(&self) -> String;
    /// Track being received. The engine always provides one.
    fn track(&self) -> Arc<dyn NativeTrack>;
}

/// Native RTP transceiver
pub trait NativeTransceiver: Send + Sync {
    /// Negotiated media ID, `None` before negotiation
    fn mid(&self) -> Option<String>;
    /// Media kind
    fn media_type(&self) -> MediaType;
    /// Current preferred direction
    fn direction(&self) -> Direction;
    /// Set preferred direction
    fn set_direction(&self, direction: Direction);
    /// Current sender
    fn sender(&self) -> Arc<dyn NativeSender>;
    /// Current receiver
    fn receiver(&self) -> Arc<dyn NativeReceiver>;
    /// Stop the transceiver permanently
    fn stop(&self);
}

/// Native peer connection
#[async_trait]
pub trait NativePeerConnection: Send + Sync {
    /// Create an SDP offer
    async fn create_offer(
        &self,
        options: OfferAnswerOptions,
    ) -> Result<SessionDescription, NativeError>;

    /// Create an SDP answer
    async fn create_answer(
        &self,
        options: OfferAnswerOptions,
    ) -> Result<SessionDescription, NativeError>;

    /// Apply a local description. `None` lets the engine pick one.
    async fn set_local_description(
        &self,
        description: Option<SessionDescription>,
    ) -> Result<(), NativeError>;

    /// Apply a remote description
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NativeError>;

    /// Add a remote ICE candidate
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NativeError>;

    /// Create a transceiver
    fn add_transceiver(
        &self,
        media_type: MediaType,
        init: TransceiverInit,
    ) -> Result<Arc<dyn NativeTransceiver>, NativeError>;

    /// Transceivers in creation order
    fn transceivers(&self) -> Vec<Arc<dyn NativeTransceiver>>;

    /// Request new ICE credentials on the next negotiation
    fn restart_ice(&self);

    /// Close the connection
    fn close(&self);
}

/// Hooks the native engine invokes on its own threads.
///
/// One instance is registered per peer connection at creation time.
pub trait NativePeerObserver: Send + Sync {
    /// Signaling state changed
    fn on_signaling_state_change(&self, state: SignalingState);
    /// ICE connection state changed
    fn on_ice_connection_state_change(&self, state: IceConnectionState);
    /// Aggregate connection state changed
    fn on_connection_state_change(&self, state: PeerConnectionState);
    /// ICE gathering state changed
    fn on_ice_gathering_state_change(&self, state: IceGatheringState);
    /// Local ICE candidate gathered
    fn on_ice_candidate(&self, candidate: IceCandidate);
    /// Transceiver started receiving media
    fn on_track(&self, transceiver: Arc<dyn NativeTransceiver>);
    /// Receiver removed by a remote description
    fn on_remove_track(&self, receiver: Arc<dyn NativeReceiver>);
    /// Renegotiation is needed
    fn on_renegotiation_needed(&self);
}

/// Native peer connection factory
pub trait NativeFactory: Send + Sync {
    /// Create a peer connection reporting to `observer`
    fn create_peer_connection(
        &self,
        configuration: &PeerConnectionConfiguration,
        observer: Arc<dyn NativePeerObserver>,
    ) -> Result<Arc<dyn NativePeerConnection>, NativeError>;

    /// Sender capabilities for a media kind
    fn rtp_sender_capabilities(&self, kind: MediaType) -> RtpCapabilities;

    /// Available video encoders
    fn video_encoders(&self) -> Vec<VideoCodecInfo>;

    /// Available video decoders
    fn video_decoders(&self) -> Vec<VideoCodecInfo>;
}
