//! Events delivered to the application observer of a peer connection

use crate::model::{
    IceCandidate, IceConnectionState, IceGatheringState, PeerConnectionState, SignalingState,
};
use crate::proxy::{ReceiverProxy, TrackProxy, TransceiverProxy};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Event raised by a peer connection
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// Signaling state changed
    SignalingStateChanged {
        /// New state
        state: SignalingState,
    },
    /// ICE connection state changed
    IceConnectionStateChanged {
        /// New state
        state: IceConnectionState,
    },
    /// Aggregate connection state changed
    ConnectionStateChanged {
        /// New state
        state: PeerConnectionState,
    },
    /// ICE gathering state changed
    IceGatheringStateChanged {
        /// New state
        state: IceGatheringState,
    },
    /// A local ICE candidate was gathered
    IceCandidateGenerated {
        /// Candidate to signal to the remote peer
        candidate: IceCandidate,
    },
    /// Media started arriving on a transceiver
    TrackStarted {
        /// Receiver track, resynced from the engine
        track: Arc<TrackProxy>,
        /// Transceiver owning the receiver
        transceiver: Arc<TransceiverProxy>,
    },
    /// A receiver was removed by the remote description
    ReceiverRemoved {
        /// Receiver, already marked removed
        receiver: Arc<ReceiverProxy>,
        /// Transceiver owning the receiver
        transceiver: Arc<TransceiverProxy>,
    },
    /// The connection must be renegotiated
    NegotiationNeeded,
}

impl PeerEvent {
    /// Event name used on the wire
    pub fn event_type(&self) -> &'static str {
        match self {
            PeerEvent::SignalingStateChanged { .. } => "onSignalingStateChange",
            PeerEvent::IceConnectionStateChanged { .. } => "onIceConnectionStateChange",
            PeerEvent::ConnectionStateChanged { .. } => "onConnectionStateChange",
            PeerEvent::IceGatheringStateChanged { .. } => "onIceGatheringStateChange",
            PeerEvent::IceCandidateGenerated { .. } => "onIceCandidate",
            PeerEvent::TrackStarted { .. } => "onTrack",
            PeerEvent::ReceiverRemoved { .. } => "onRemoveTrack",
            PeerEvent::NegotiationNeeded => "onNegotiationNeeded",
        }
    }
}

/// Single consumer of a connection's events.
///
/// Called on the connection's dispatch task, one event at a time.
pub trait EventObserver: Send + Sync {
    /// Handle one event
    fn on_event(&self, event: PeerEvent);
}

impl EventObserver for mpsc::UnboundedSender<PeerEvent> {
    fn on_event(&self, event: PeerEvent) {
        // Receiver gone means nobody listens anymore
        let _ = self.send(event);
    }
}
