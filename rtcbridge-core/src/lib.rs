//! # rtcbridge core
//!
//! Keeps an application-facing proxy graph (transceivers, senders,
//! receivers, tracks) in sync with native RTC engine objects that the engine
//! replaces or mutates on its own, computes transceiver direction changes
//! from send/receive intents, and delivers native callbacks to a single
//! observer per connection with nothing delivered after disposal.
//!
//! The engine is reached only through the traits in [`native`]. The `fake`
//! module, behind the `fake` feature, provides an in-memory implementation
//! of them.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod capabilities;
pub mod controller;
pub mod direction;
pub mod error;
pub mod event;
pub mod factory;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod guard;
pub mod model;
pub mod native;
pub mod proxy;

// Re-export main types
pub use bridge::{EventBridge, NativeCallback, PeerObserver};
pub use capabilities::{
    CodecCapability, HeaderExtensionCapability, RtpCapabilities, VideoCodec, VideoCodecInfo,
};
pub use controller::{PeerConnectionController, ResultCallback};
pub use direction::{next_direction_for_recv, next_direction_for_send, Direction};
pub use error::BridgeError;
pub use event::{EventObserver, PeerEvent};
pub use factory::PeerConnectionFactoryProxy;
pub use guard::DisposalGuard;
pub use model::{
    Encoding, IceCandidate, IceConnectionState, IceGatheringState, IceServer, IceTransportType,
    MediaType, OfferAnswerOptions, PeerConnectionConfiguration, PeerConnectionState, SdpType,
    SessionDescription, SignalingState, TrackState, TransceiverInit,
};
pub use native::{
    NativeError, NativeFactory, NativePeerConnection, NativePeerObserver, NativeReceiver,
    NativeSender, NativeTrack, NativeTransceiver,
};
pub use proxy::{
    PeerConnectionProxy, Proxy, ReceiverProxy, SenderProxy, TrackProxy, TrackSettings,
    TransceiverProxy,
};
