//! Codec and header extension capabilities reported by the native factory

use crate::model::MediaType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Capability of an RTP header extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderExtensionCapability {
    /// Extension URI, as defined in RFC 8285
    pub uri: String,
    /// Preferred ID in the packet
    pub preferred_id: u16,
    /// Whether the value is preferably encrypted
    pub preferred_encrypted: bool,
}

/// Static capability of a codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecCapability {
    /// Default payload type
    pub preferred_payload_type: u8,
    /// MIME subtype
    pub name: String,
    /// MIME top-level type
    pub kind: MediaType,
    /// Clock rate in Hz
    pub clock_rate: u32,
    /// Audio channels, unset for video
    #[serde(default)]
    pub num_channels: Option<u8>,
    /// `a=fmtp` parameters
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// `type/subtype` MIME string
    pub mime_type: String,
}

/// Static capabilities of an endpoint for one media kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    /// Supported codecs
    pub codecs: Vec<CodecCapability>,
    /// Supported header extensions
    pub header_extensions: Vec<HeaderExtensionCapability>,
}

/// Video codecs the engine may expose encoders/decoders for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCodec {
    /// VP8
    VP8,
    /// VP9
    VP9,
    /// AV1
    AV1,
    /// H.264
    H264,
}

/// Availability of one video encoder or decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCodecInfo {
    /// Whether it runs on dedicated hardware
    pub is_hardware_accelerated: bool,
    /// Codec
    pub codec: VideoCodec,
}

impl VideoCodecInfo {
    /// Software VP8/VP9/AV1 and hardware H.264, as shipped by libwebrtc
    /// builds on mobile targets.
    pub fn platform_defaults() -> Vec<Self> {
        vec![
            Self {
                is_hardware_accelerated: false,
                codec: VideoCodec::VP8,
            },
            Self {
                is_hardware_accelerated: false,
                codec: VideoCodec::VP9,
            },
            Self {
                is_hardware_accelerated: false,
                codec: VideoCodec::AV1,
            },
            Self {
                is_hardware_accelerated: true,
                codec: VideoCodec::H264,
            },
        ]
    }
}
