//! Plain data exchanged with the native engine and the application layer

use crate::direction::Direction;
use serde::{Deserialize, Serialize};

/// Kind of media carried by a track or transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaType {
    /// Audio media
    Audio,
    /// Video media
    Video,
}

/// Signaling state of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalingState {
    /// No offer/answer exchange in progress
    Stable,
    /// Local offer applied
    HaveLocalOffer,
    /// Local provisional answer applied
    HaveLocalPrAnswer,
    /// Remote offer applied
    HaveRemoteOffer,
    /// Remote provisional answer applied
    HaveRemotePrAnswer,
    /// Connection closed
    Closed,
}

/// ICE connection state of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IceConnectionState {
    /// Gathering addresses or waiting for remote candidates
    New,
    /// Checking candidate pairs
    Checking,
    /// A usable pair was found
    Connected,
    /// Checks finished
    Completed,
    /// No usable pair
    Failed,
    /// Connectivity lost
    Disconnected,
    /// ICE agent shut down
    Closed,
}

/// Aggregate connection state of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeerConnectionState {
    /// Nothing started yet
    New,
    /// Transports are connecting
    Connecting,
    /// All transports connected
    Connected,
    /// At least one transport disconnected
    Disconnected,
    /// At least one transport failed
    Failed,
    /// Connection closed
    Closed,
}

/// ICE gathering state of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IceGatheringState {
    /// Gathering not started
    New,
    /// Gathering in progress
    Gathering,
    /// Gathering finished
    Complete,
}

/// Type of a session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SdpType {
    /// Offer
    Offer,
    /// Provisional answer
    PrAnswer,
    /// Final answer
    Answer,
    /// Rollback to the last stable state
    Rollback,
}

/// SDP session description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescription {
    /// Description type
    #[serde(rename = "type")]
    pub kind: SdpType,
    /// SDP body
    pub sdp: String,
}

impl SessionDescription {
    /// Create a new session description
    pub fn new(kind: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }
}

/// ICE candidate exchanged between peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Media stream identification tag of the media line
    pub sdp_mid: String,
    /// Index of the media line
    pub sdp_m_line_index: u32,
    /// Candidate attribute line
    pub candidate: String,
}

/// Encoding parameters of a sending transceiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encoding {
    /// RTP stream ID
    pub rid: String,
    /// Whether this encoding is sent
    pub active: bool,
    /// Maximum bitrate in bits per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bitrate: Option<u32>,
    /// Maximum frame rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_framerate: Option<f64>,
    /// Downscale factor applied to the source resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_resolution_down_by: Option<f64>,
    /// Scalability mode, e.g. `L1T3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalability_mode: Option<String>,
}

/// Parameters for creating a transceiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransceiverInit {
    /// Initial preferred direction
    pub direction: Direction,
    /// Send encodings, empty for the engine default
    #[serde(default)]
    pub send_encodings: Vec<Encoding>,
}

impl TransceiverInit {
    /// Transceiver init with the given direction and default encodings
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            send_encodings: Vec::new(),
        }
    }
}

/// STUN/TURN server description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    /// Server URLs
    pub urls: Vec<String>,
    /// TURN username
    #[serde(default)]
    pub username: Option<String>,
    /// TURN credential
    #[serde(default)]
    pub password: Option<String>,
}

/// Which candidates the ICE agent may use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IceTransportType {
    /// Any candidate
    #[default]
    All,
    /// Relay candidates only
    Relay,
    /// Everything except host candidates
    NoHost,
    /// No candidates
    None,
}

/// Configuration of a new peer connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConnectionConfiguration {
    /// ICE servers
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
    /// ICE candidate policy
    #[serde(default)]
    pub ice_transport_type: IceTransportType,
}

/// Options for offer and answer creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferAnswerOptions {
    /// Enable voice activity detection
    #[serde(default = "default_true")]
    pub voice_activity_detection: bool,
    /// Gather fresh ICE credentials
    #[serde(default)]
    pub ice_restart: bool,
    /// Bundle media over one transport
    #[serde(default = "default_true")]
    pub use_rtp_mux: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OfferAnswerOptions {
    fn default() -> Self {
        Self {
            voice_activity_detection: true,
            ice_restart: false,
            use_rtp_mux: true,
        }
    }
}

/// Life-cycle state of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackState {
    /// Track is producing or accepting media
    Live,
    /// Track was stopped and will never produce media again
    Ended,
}
