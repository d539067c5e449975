//! # rtcbridge channel
//!
//! Transport-agnostic method channels over rtcbridge peer connections.
//! Method calls come in as JSON, are parsed into typed requests and routed
//! to the handler registered for the channel name; results and events go
//! back out as JSON.
//!
//! Channel names follow `"<Kind>/<id>"`:
//! - `PeerConnectionFactory/0` creates connections and answers capability
//!   queries
//! - `PeerConnection/<id>` runs signaling commands
//! - `PeerConnectionEvent/<id>` carries the events of that connection
//! - `RtpTransceiver/<id>` controls one transceiver

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod handler;
pub mod protocol;
pub mod registry;
pub mod sink;

// Re-export main types
pub use handler::{
    FactoryHandler, PeerHandler, TransceiverChannels, TransceiverHandler, FACTORY_CHANNEL,
    PEER_CHANNEL, PEER_EVENT_CHANNEL, TRANSCEIVER_CHANNEL,
};
pub use protocol::{
    ChannelError, ChannelEvent, ErrorReply, EventPayload, FactoryRequest, MethodCall,
    MethodResult, PeerConnectionInfo, PeerRequest, ReceiverInfo, SenderInfo, TransceiverInfo,
    TransceiverRequest,
};
pub use registry::{channel_name, ChannelRegistry, MethodHandler, Reply};
pub use sink::{EventSink, PeerEventForwarder};
