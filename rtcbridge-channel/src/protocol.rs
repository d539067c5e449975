//! Channel protocol: method calls, typed requests, replies and event payloads

use rtcbridge_core::{
    BridgeError, Direction, IceCandidate, IceConnectionState, IceGatheringState, MediaType,
    OfferAnswerOptions, PeerConnectionConfiguration, PeerConnectionState, SessionDescription,
    SignalingState, TrackSettings, TransceiverInit,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Inbound method call on a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Method name
    pub method: String,
    /// Arguments, `null` when the method takes none
    #[serde(default)]
    pub args: Value,
}

impl MethodCall {
    /// Create a method call
    pub fn new(method: impl Into<String>, args: Value) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }

    /// Create a method call without arguments
    pub fn bare(method: impl Into<String>) -> Self {
        Self::new(method, Value::Null)
    }

    /// Decode the arguments. `null` decodes like an empty object.
    pub fn args<T: DeserializeOwned>(&self) -> Result<T, ChannelError> {
        let args = match &self.args {
            Value::Null => Value::Object(Default::default()),
            args => args.clone(),
        };
        serde_json::from_value(args).map_err(|e| ChannelError::InvalidArguments {
            method: self.method.clone(),
            reason: e.to_string(),
        })
    }
}

/// Result of a method call
pub type MethodResult = Result<Value, ChannelError>;

/// Error replied to a method call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    /// No handler for the method
    #[error("Method {method} is not implemented")]
    NotImplemented {
        /// Method name
        method: String,
    },

    /// Arguments could not be decoded
    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArguments {
        /// Method name
        method: String,
        /// Decoder message
        reason: String,
    },

    /// No handler registered under the channel name
    #[error("Channel {channel} not found")]
    ChannelNotFound {
        /// Channel name
        channel: String,
    },

    /// Result could not be encoded
    #[error("Serialization failed: {reason}")]
    Serialization {
        /// Encoder message
        reason: String,
    },

    /// Core operation failed
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl ChannelError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> String {
        match self {
            ChannelError::NotImplemented { .. } => "NOT_IMPLEMENTED".to_string(),
            ChannelError::InvalidArguments { .. } => "INVALID_ARGUMENTS".to_string(),
            ChannelError::ChannelNotFound { .. } => "CHANNEL_NOT_FOUND".to_string(),
            ChannelError::Serialization { .. } => "SERIALIZATION_FAILED".to_string(),
            ChannelError::Bridge(err) => err.error_code(),
        }
    }

    /// Structured error object sent back to the caller
    pub fn to_reply(&self) -> ErrorReply {
        ErrorReply {
            code: self.error_code(),
            message: self.to_string(),
        }
    }
}

/// Wire form of a failed method call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Encode a reply value
pub fn encode<T: Serialize>(value: &T) -> MethodResult {
    serde_json::to_value(value).map_err(|e| ChannelError::Serialization {
        reason: e.to_string(),
    })
}

#[derive(Deserialize)]
struct KindArgs {
    kind: MediaType,
}

#[derive(Deserialize)]
struct LocalDescriptionArgs {
    #[serde(default)]
    description: Option<SessionDescription>,
}

#[derive(Deserialize)]
struct RemoteDescriptionArgs {
    description: SessionDescription,
}

#[derive(Deserialize)]
struct CandidateArgs {
    candidate: IceCandidate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTransceiverArgs {
    media_type: MediaType,
    init: TransceiverInit,
}

#[derive(Deserialize)]
struct DirectionArgs {
    direction: Direction,
}

#[derive(Deserialize)]
struct RecvArgs {
    recv: bool,
}

#[derive(Deserialize)]
struct SendArgs {
    send: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplaceTrackArgs {
    #[serde(default)]
    track_id: Option<String>,
}

/// Method on the factory channel
#[derive(Debug, Clone, PartialEq)]
pub enum FactoryRequest {
    /// Create a peer connection
    Create(PeerConnectionConfiguration),
    /// Sender capabilities for a media kind
    GetRtpSenderCapabilities {
        /// Media kind
        kind: MediaType,
    },
    /// Available video encoders
    VideoEncoders,
    /// Available video decoders
    VideoDecoders,
    /// Detach the factory channel
    Dispose,
}

impl FactoryRequest {
    /// Parse a factory method call
    pub fn parse(call: &MethodCall) -> Result<Self, ChannelError> {
        let request = match call.method.as_str() {
            "create" => FactoryRequest::Create(call.args()?),
            "getRtpSenderCapabilities" => {
                let KindArgs { kind } = call.args()?;
                FactoryRequest::GetRtpSenderCapabilities { kind }
            }
            "videoEncoders" => FactoryRequest::VideoEncoders,
            "videoDecoders" => FactoryRequest::VideoDecoders,
            "dispose" => FactoryRequest::Dispose,
            _ => return Err(not_implemented(call)),
        };
        Ok(request)
    }
}

/// Method on a peer connection channel
#[derive(Debug, Clone, PartialEq)]
pub enum PeerRequest {
    /// Create an SDP offer
    CreateOffer(OfferAnswerOptions),
    /// Create an SDP answer
    CreateAnswer(OfferAnswerOptions),
    /// Apply a local description, engine-generated when absent
    SetLocalDescription {
        /// Description to apply
        description: Option<SessionDescription>,
    },
    /// Apply a remote description
    SetRemoteDescription {
        /// Description to apply
        description: SessionDescription,
    },
    /// Add a remote ICE candidate
    AddIceCandidate {
        /// Candidate to add
        candidate: IceCandidate,
    },
    /// Create a transceiver
    AddTransceiver {
        /// Media kind
        media_type: MediaType,
        /// Initial parameters
        init: TransceiverInit,
    },
    /// List transceivers
    GetTransceivers,
    /// Request an ICE restart
    RestartIce,
    /// Dispose the connection
    Dispose,
}

impl PeerRequest {
    /// Parse a peer connection method call
    pub fn parse(call: &MethodCall) -> Result<Self, ChannelError> {
        let request = match call.method.as_str() {
            "createOffer" => PeerRequest::CreateOffer(call.args()?),
            "createAnswer" => PeerRequest::CreateAnswer(call.args()?),
            "setLocalDescription" => {
                let LocalDescriptionArgs { description } = call.args()?;
                PeerRequest::SetLocalDescription { description }
            }
            "setRemoteDescription" => {
                let RemoteDescriptionArgs { description } = call.args()?;
                PeerRequest::SetRemoteDescription { description }
            }
            "addIceCandidate" => {
                let CandidateArgs { candidate } = call.args()?;
                PeerRequest::AddIceCandidate { candidate }
            }
            "addTransceiver" => {
                let AddTransceiverArgs { media_type, init } = call.args()?;
                PeerRequest::AddTransceiver { media_type, init }
            }
            "getTransceivers" => PeerRequest::GetTransceivers,
            "restartIce" => PeerRequest::RestartIce,
            "dispose" => PeerRequest::Dispose,
            _ => return Err(not_implemented(call)),
        };
        Ok(request)
    }
}

/// Method on a transceiver channel
#[derive(Debug, Clone, PartialEq)]
pub enum TransceiverRequest {
    /// Set the preferred direction
    SetDirection {
        /// New direction
        direction: Direction,
    },
    /// Turn receiving on or off
    SetRecv {
        /// Desired receive flag
        recv: bool,
    },
    /// Turn sending on or off
    SetSend {
        /// Desired send flag
        send: bool,
    },
    /// Negotiated media ID
    GetMid,
    /// Current direction
    GetDirection,
    /// Stop the transceiver
    Stop,
    /// Replace the sender's track with a registered local track
    ReplaceTrack {
        /// Registered track ID, `None` to send nothing
        track_id: Option<String>,
    },
}

impl TransceiverRequest {
    /// Parse a transceiver method call
    pub fn parse(call: &MethodCall) -> Result<Self, ChannelError> {
        let request = match call.method.as_str() {
            "setDirection" => {
                let DirectionArgs { direction } = call.args()?;
                TransceiverRequest::SetDirection { direction }
            }
            "setRecv" => {
                let RecvArgs { recv } = call.args()?;
                TransceiverRequest::SetRecv { recv }
            }
            "setSend" => {
                let SendArgs { send } = call.args()?;
                TransceiverRequest::SetSend { send }
            }
            "getMid" => TransceiverRequest::GetMid,
            "getDirection" => TransceiverRequest::GetDirection,
            "stop" => TransceiverRequest::Stop,
            "replaceTrack" => {
                let ReplaceTrackArgs { track_id } = call.args()?;
                TransceiverRequest::ReplaceTrack { track_id }
            }
            _ => return Err(not_implemented(call)),
        };
        Ok(request)
    }
}

fn not_implemented(call: &MethodCall) -> ChannelError {
    ChannelError::NotImplemented {
        method: call.method.clone(),
    }
}

/// Reply to `create`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerConnectionInfo {
    /// ID of the `PeerConnection/<id>` and `PeerConnectionEvent/<id>` channels
    pub channel_id: u64,
    /// Connection ID
    pub id: u64,
}

/// Sender as seen by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
    /// Native sender ID
    pub id: String,
    /// Track being sent
    pub track: Option<TrackSettings>,
}

/// Receiver as seen by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverInfo {
    /// Native receiver ID
    pub id: String,
    /// Track being received
    pub track: TrackSettings,
    /// Whether the remote side removed it
    pub removed: bool,
}

/// Transceiver as seen by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransceiverInfo {
    /// ID of the `RtpTransceiver/<id>` channel
    pub channel_id: u64,
    /// Transceiver ID within its connection
    pub id: u64,
    /// Negotiated media ID
    pub mid: Option<String>,
    /// Current direction
    pub direction: Direction,
    /// Media kind
    pub media_type: MediaType,
    /// Sender
    pub sender: SenderInfo,
    /// Receiver
    pub receiver: ReceiverInfo,
}

/// Event sent on a `PeerConnectionEvent/<id>` channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum EventPayload {
    /// Signaling state changed
    #[serde(rename = "onSignalingStateChange")]
    SignalingStateChange {
        /// New state
        state: SignalingState,
    },
    /// ICE connection state changed
    #[serde(rename = "onIceConnectionStateChange")]
    IceConnectionStateChange {
        /// New state
        state: IceConnectionState,
    },
    /// Connection state changed
    #[serde(rename = "onConnectionStateChange")]
    ConnectionStateChange {
        /// New state
        state: PeerConnectionState,
    },
    /// ICE gathering state changed
    #[serde(rename = "onIceGatheringStateChange")]
    IceGatheringStateChange {
        /// New state
        state: IceGatheringState,
    },
    /// Local candidate gathered
    #[serde(rename = "onIceCandidate")]
    IceCandidate {
        /// Candidate
        candidate: IceCandidate,
    },
    /// Remote media started
    #[serde(rename = "onTrack")]
    Track {
        /// Receiver track
        track: TrackSettings,
        /// Owning transceiver
        transceiver: TransceiverInfo,
    },
    /// Receiver removed
    #[serde(rename = "onRemoveTrack")]
    RemoveTrack {
        /// Removed receiver ID
        #[serde(rename = "receiverId")]
        receiver_id: String,
        /// Owning transceiver
        transceiver: TransceiverInfo,
    },
    /// Renegotiation needed
    #[serde(rename = "onNegotiationNeeded")]
    NegotiationNeeded,
}

/// Event emitted on a named channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    /// Channel name
    pub channel: String,
    /// Serialized event
    pub payload: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcbridge_core::SdpType;
    use serde_json::json;

    #[test]
    fn test_parse_peer_requests() {
        let call = MethodCall::new(
            "setRemoteDescription",
            json!({"description": {"type": "offer", "sdp": "v=0"}}),
        );
        assert_eq!(
            PeerRequest::parse(&call).unwrap(),
            PeerRequest::SetRemoteDescription {
                description: SessionDescription::new(SdpType::Offer, "v=0"),
            }
        );

        let call = MethodCall::new(
            "addTransceiver",
            json!({"mediaType": "video", "init": {"direction": "sendRecv"}}),
        );
        assert_eq!(
            PeerRequest::parse(&call).unwrap(),
            PeerRequest::AddTransceiver {
                media_type: MediaType::Video,
                init: TransceiverInit::new(Direction::SendRecv),
            }
        );

        assert_eq!(
            PeerRequest::parse(&MethodCall::bare("createOffer")).unwrap(),
            PeerRequest::CreateOffer(OfferAnswerOptions::default())
        );
    }

    #[test]
    fn test_bare_set_local_description() {
        for call in [
            MethodCall::bare("setLocalDescription"),
            MethodCall::new("setLocalDescription", json!({"description": null})),
        ] {
            assert_eq!(
                PeerRequest::parse(&call).unwrap(),
                PeerRequest::SetLocalDescription { description: None }
            );
        }
    }

    #[test]
    fn test_unknown_method() {
        let err = TransceiverRequest::parse(&MethodCall::bare("setCodecPreferences")).unwrap_err();
        assert_eq!(err.error_code(), "NOT_IMPLEMENTED");
        assert_eq!(
            err.to_reply(),
            ErrorReply {
                code: "NOT_IMPLEMENTED".to_string(),
                message: "Method setCodecPreferences is not implemented".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_arguments() {
        let err = TransceiverRequest::parse(&MethodCall::new("setSend", json!({"send": "yes"})))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENTS");

        let err = FactoryRequest::parse(&MethodCall::bare("getRtpSenderCapabilities"))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENTS");
    }

    #[test]
    fn test_bridge_error_code_passes_through() {
        let err: ChannelError = BridgeError::ReplaceTrackFailed {
            sender_id: "s1".to_string(),
        }
        .into();
        assert_eq!(err.to_reply().code, "REPLACE_TRACK_FAILED");
    }

    #[test]
    fn test_event_payload_wire_format() {
        let payload = encode(&EventPayload::SignalingStateChange {
            state: SignalingState::HaveRemoteOffer,
        })
        .unwrap();
        assert_eq!(
            payload,
            json!({"event": "onSignalingStateChange", "state": "haveRemoteOffer"})
        );
        assert_eq!(
            encode(&EventPayload::NegotiationNeeded).unwrap(),
            json!({"event": "onNegotiationNeeded"})
        );
    }
}
