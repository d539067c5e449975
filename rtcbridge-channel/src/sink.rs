//! Event sink and the observer that serializes peer events into it

use crate::handler::TransceiverChannels;
use crate::protocol::{encode, ChannelError, ChannelEvent, EventPayload};
use rtcbridge_core::{EventObserver, PeerEvent};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Destination of serialized channel events
pub trait EventSink: Send + Sync {
    /// Emit `payload` on `channel`
    fn emit(&self, channel: &str, payload: Value);
}

impl EventSink for mpsc::UnboundedSender<ChannelEvent> {
    fn emit(&self, channel: &str, payload: Value) {
        let event = ChannelEvent {
            channel: channel.to_string(),
            payload,
        };
        if self.send(event).is_err() {
            debug!("Event sink closed, dropping event for {}", channel);
        }
    }
}

/// Serializes the events of one connection onto its event channel
pub struct PeerEventForwarder {
    channel: String,
    sink: Arc<dyn EventSink>,
    transceivers: Arc<TransceiverChannels>,
}

impl PeerEventForwarder {
    /// Create a forwarder emitting on `channel`
    pub fn new(
        channel: String,
        sink: Arc<dyn EventSink>,
        transceivers: Arc<TransceiverChannels>,
    ) -> Self {
        Self {
            channel,
            sink,
            transceivers,
        }
    }

    fn payload(&self, event: PeerEvent) -> Result<EventPayload, ChannelError> {
        let payload = match event {
            PeerEvent::SignalingStateChanged { state } => {
                EventPayload::SignalingStateChange { state }
            }
            PeerEvent::IceConnectionStateChanged { state } => {
                EventPayload::IceConnectionStateChange { state }
            }
            PeerEvent::ConnectionStateChanged { state } => {
                EventPayload::ConnectionStateChange { state }
            }
            PeerEvent::IceGatheringStateChanged { state } => {
                EventPayload::IceGatheringStateChange { state }
            }
            PeerEvent::IceCandidateGenerated { candidate } => {
                EventPayload::IceCandidate { candidate }
            }
            PeerEvent::TrackStarted { track, transceiver } => EventPayload::Track {
                track: track.settings(),
                transceiver: self.transceivers.info(&transceiver)?,
            },
            PeerEvent::ReceiverRemoved {
                receiver,
                transceiver,
            } => EventPayload::RemoveTrack {
                receiver_id: receiver.id(),
                transceiver: self.transceivers.info(&transceiver)?,
            },
            PeerEvent::NegotiationNeeded => EventPayload::NegotiationNeeded,
        };
        Ok(payload)
    }
}

impl EventObserver for PeerEventForwarder {
    fn on_event(&self, event: PeerEvent) {
        match self.payload(event).and_then(|payload| encode(&payload)) {
            Ok(payload) => self.sink.emit(&self.channel, payload),
            Err(e) => error!("Failed to serialize event for {}: {}", self.channel, e),
        }
    }
}
