//! In-memory reference engine
//!
//! Implements every native binding trait without any media or network
//! stack. Besides backing tests, it lets a host script engine-side behaviour:
//! firing observer callbacks from arbitrary threads, swapping the native
//! objects under a proxy, rejecting track swaps and holding offers until
//! they are resolved by hand.

use crate::capabilities::{
    CodecCapability, HeaderExtensionCapability, RtpCapabilities, VideoCodecInfo,
};
use crate::direction::Direction;
use crate::model::{
    IceCandidate, IceConnectionState, IceGatheringState, MediaType, OfferAnswerOptions,
    PeerConnectionConfiguration, PeerConnectionState, SdpType, SessionDescription,
    SignalingState, TrackState, TransceiverInit,
};
use crate::native::{
    NativeError, NativeFactory, NativePeerConnection, NativePeerObserver, NativeReceiver,
    NativeSender, NativeTrack, NativeTransceiver,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

type OfferResult = Result<SessionDescription, NativeError>;

/// Media track with no media behind it
pub struct FakeTrack {
    id: String,
    kind: MediaType,
    enabled: AtomicBool,
    ended: AtomicBool,
}

impl FakeTrack {
    /// Create a live, enabled track
    pub fn new(id: impl Into<String>, kind: MediaType) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            kind,
            enabled: AtomicBool::new(true),
            ended: AtomicBool::new(false),
        })
    }

    /// Create a track with a random ID
    pub fn random(kind: MediaType) -> Arc<Self> {
        Self::new(Uuid::new_v4().to_string(), kind)
    }
}

impl NativeTrack for FakeTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> MediaType {
        self.kind
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn state(&self) -> TrackState {
        if self.ended.load(Ordering::Acquire) {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }

    fn stop(&self) {
        self.ended.store(true, Ordering::Release);
    }
}

/// RTP sender
pub struct FakeSender {
    id: String,
    track: RwLock<Option<Arc<dyn NativeTrack>>>,
    reject: AtomicBool,
    set_track_calls: AtomicUsize,
}

impl FakeSender {
    /// Create a sender with no track
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            track: RwLock::new(None),
            reject: AtomicBool::new(false),
            set_track_calls: AtomicUsize::new(0),
        })
    }

    /// Change the track from the engine side
    pub fn swap_track(&self, track: Option<Arc<dyn NativeTrack>>) {
        *self.track.write() = track;
    }

    /// Make every following `set_track` fail
    pub fn reject_track_changes(&self, reject: bool) {
        self.reject.store(reject, Ordering::Release);
    }

    /// Number of `set_track` calls received
    pub fn set_track_calls(&self) -> usize {
        self.set_track_calls.load(Ordering::Acquire)
    }
}

impl NativeSender for FakeSender {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn track(&self) -> Option<Arc<dyn NativeTrack>> {
        self.track.read().clone()
    }

    fn set_track(&self, track: Option<Arc<dyn NativeTrack>>) -> bool {
        self.set_track_calls.fetch_add(1, Ordering::AcqRel);
        if self.reject.load(Ordering::Acquire) {
            return false;
        }
        *self.track.write() = track;
        true
    }
}

/// RTP receiver
pub struct FakeReceiver {
    id: String,
    track: RwLock<Arc<dyn NativeTrack>>,
}

impl FakeReceiver {
    /// Create a receiver for `track`
    pub fn new(id: impl Into<String>, track: Arc<dyn NativeTrack>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            track: RwLock::new(track),
        })
    }

    /// Change the track from the engine side
    pub fn swap_track(&self, track: Arc<dyn NativeTrack>) {
        *self.track.write() = track;
    }
}

impl NativeReceiver for FakeReceiver {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn track(&self) -> Arc<dyn NativeTrack> {
        Arc::clone(&self.track.read())
    }
}

/// RTP transceiver
pub struct FakeTransceiver {
    media_type: MediaType,
    mid: RwLock<Option<String>>,
    direction: RwLock<Direction>,
    sender: RwLock<Arc<dyn NativeSender>>,
    receiver: RwLock<Arc<dyn NativeReceiver>>,
    stop_calls: AtomicUsize,
}

impl FakeTransceiver {
    /// Create a transceiver with a fresh sender and a receiver holding a
    /// fresh remote track
    pub fn new(media_type: MediaType, direction: Direction) -> Arc<Self> {
        let sender: Arc<dyn NativeSender> = FakeSender::new(Uuid::new_v4().to_string());
        let receiver: Arc<dyn NativeReceiver> =
            FakeReceiver::new(Uuid::new_v4().to_string(), FakeTrack::random(media_type));
        Arc::new(Self {
            media_type,
            mid: RwLock::new(None),
            direction: RwLock::new(direction),
            sender: RwLock::new(sender),
            receiver: RwLock::new(receiver),
            stop_calls: AtomicUsize::new(0),
        })
    }

    /// Replace the sender from the engine side
    pub fn swap_sender(&self, sender: Arc<dyn NativeSender>) {
        *self.sender.write() = sender;
    }

    /// Replace the receiver from the engine side
    pub fn swap_receiver(&self, receiver: Arc<dyn NativeReceiver>) {
        *self.receiver.write() = receiver;
    }

    /// Set the negotiated media ID, overriding any previous one
    pub fn assign_mid(&self, mid: &str) {
        *self.mid.write() = Some(mid.to_string());
    }

    /// Whether `stop` was called
    pub fn is_stopped(&self) -> bool {
        self.stop_calls() > 0
    }

    /// Number of `stop` calls received
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::Acquire)
    }
}

impl NativeTransceiver for FakeTransceiver {
    fn mid(&self) -> Option<String> {
        self.mid.read().clone()
    }

    fn media_type(&self) -> MediaType {
        self.media_type
    }

    fn direction(&self) -> Direction {
        *self.direction.read()
    }

    fn set_direction(&self, direction: Direction) {
        *self.direction.write() = direction;
    }

    fn sender(&self) -> Arc<dyn NativeSender> {
        Arc::clone(&self.sender.read())
    }

    fn receiver(&self) -> Arc<dyn NativeReceiver> {
        Arc::clone(&self.receiver.read())
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::AcqRel);
        *self.direction.write() = Direction::Inactive;
    }
}

/// Peer connection that negotiates with nobody
pub struct FakePeerConnection {
    configuration: PeerConnectionConfiguration,
    observer: Arc<dyn NativePeerObserver>,
    transceivers: RwLock<Vec<Arc<FakeTransceiver>>>,
    local_description: RwLock<Option<SessionDescription>>,
    remote_description: RwLock<Option<SessionDescription>>,
    remote_candidates: Mutex<Vec<IceCandidate>>,
    hold_offers: AtomicBool,
    pending_offers: Mutex<VecDeque<oneshot::Sender<OfferResult>>>,
    add_transceiver_failure: Mutex<Option<String>>,
    restart_ice_calls: AtomicUsize,
    closed: AtomicBool,
}

impl FakePeerConnection {
    /// Create a connection reporting to `observer`
    pub fn new(
        configuration: PeerConnectionConfiguration,
        observer: Arc<dyn NativePeerObserver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            configuration,
            observer,
            transceivers: RwLock::new(Vec::new()),
            local_description: RwLock::new(None),
            remote_description: RwLock::new(None),
            remote_candidates: Mutex::new(Vec::new()),
            hold_offers: AtomicBool::new(false),
            pending_offers: Mutex::new(VecDeque::new()),
            add_transceiver_failure: Mutex::new(None),
            restart_ice_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Configuration the connection was created with
    pub fn configuration(&self) -> &PeerConnectionConfiguration {
        &self.configuration
    }

    /// Keep `create_offer` pending until [`FakePeerConnection::resolve_offer`]
    pub fn hold_offers(&self, hold: bool) {
        self.hold_offers.store(hold, Ordering::Release);
    }

    /// Number of offers waiting to be resolved
    pub fn pending_offers(&self) -> usize {
        self.pending_offers
            .lock()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// Complete the oldest held offer. Returns `false` when none is waiting.
    pub fn resolve_offer(&self, result: OfferResult) -> bool {
        let mut pending = self.pending_offers.lock();
        let mut result = Some(result);
        while let Some(tx) = pending.pop_front() {
            if let Some(value) = result.take() {
                match tx.send(value) {
                    Ok(()) => return true,
                    Err(value) => result = Some(value),
                }
            }
        }
        false
    }

    /// Make the next `add_transceiver` fail with `reason`
    pub fn fail_next_add_transceiver(&self, reason: impl Into<String>) {
        *self.add_transceiver_failure.lock() = Some(reason.into());
    }

    /// Create a transceiver the way a remote offer would
    pub fn add_remote_transceiver(
        &self,
        media_type: MediaType,
        direction: Direction,
    ) -> Arc<FakeTransceiver> {
        let transceiver = FakeTransceiver::new(media_type, direction);
        self.transceivers.write().push(Arc::clone(&transceiver));
        transceiver
    }

    /// Transceiver at `index` in creation order
    pub fn transceiver(&self, index: usize) -> Option<Arc<FakeTransceiver>> {
        self.transceivers.read().get(index).cloned()
    }

    /// Last applied local description
    pub fn local_description(&self) -> Option<SessionDescription> {
        self.local_description.read().clone()
    }

    /// Last applied remote description
    pub fn remote_description(&self) -> Option<SessionDescription> {
        self.remote_description.read().clone()
    }

    /// Remote candidates added so far
    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.remote_candidates.lock().clone()
    }

    /// Number of `restart_ice` calls received
    pub fn restart_ice_calls(&self) -> usize {
        self.restart_ice_calls.load(Ordering::Acquire)
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fire a signaling state change
    pub fn fire_signaling_state(&self, state: SignalingState) {
        self.observer.on_signaling_state_change(state);
    }

    /// Fire an ICE connection state change
    pub fn fire_ice_connection_state(&self, state: IceConnectionState) {
        self.observer.on_ice_connection_state_change(state);
    }

    /// Fire a connection state change
    pub fn fire_connection_state(&self, state: PeerConnectionState) {
        self.observer.on_connection_state_change(state);
    }

    /// Fire an ICE gathering state change
    pub fn fire_ice_gathering_state(&self, state: IceGatheringState) {
        self.observer.on_ice_gathering_state_change(state);
    }

    /// Fire a gathered local candidate
    pub fn fire_ice_candidate(&self, candidate: IceCandidate) {
        self.observer.on_ice_candidate(candidate);
    }

    /// Fire track-started for `transceiver`
    pub fn fire_track(&self, transceiver: Arc<FakeTransceiver>) {
        self.observer.on_track(transceiver);
    }

    /// Fire receiver removal for `receiver`
    pub fn fire_remove_track(&self, receiver: Arc<dyn NativeReceiver>) {
        self.observer.on_remove_track(receiver);
    }

    /// Fire negotiation-needed
    pub fn fire_negotiation_needed(&self) {
        self.observer.on_renegotiation_needed();
    }

    fn ensure_open(&self) -> Result<(), NativeError> {
        if self.is_closed() {
            Err(NativeError::new("peer connection is closed"))
        } else {
            Ok(())
        }
    }

    fn render_sdp(&self, kind: SdpType) -> String {
        let transceivers = self.transceivers.read();
        let mut sdp = format!("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns={:?}\r\n", kind);
        for (index, transceiver) in transceivers.iter().enumerate() {
            let media = match transceiver.media_type() {
                MediaType::Audio => "audio",
                MediaType::Video => "video",
            };
            sdp.push_str(&format!(
                "m={} 9 UDP/TLS/RTP/SAVPF 0\r\na=mid:{}\r\na={}\r\n",
                media,
                index,
                transceiver.direction()
            ));
        }
        sdp
    }

    fn negotiate_mids(&self) {
        for (index, transceiver) in self.transceivers.read().iter().enumerate() {
            if transceiver.mid().is_none() {
                transceiver.assign_mid(&index.to_string());
            }
        }
    }
}

#[async_trait]
impl NativePeerConnection for FakePeerConnection {
    async fn create_offer(&self, _options: OfferAnswerOptions) -> OfferResult {
        self.ensure_open()?;
        if self.hold_offers.load(Ordering::Acquire) {
            let (tx, rx) = oneshot::channel();
            self.pending_offers.lock().push_back(tx);
            debug!("Holding offer until resolved");
            return rx
                .await
                .map_err(|_| NativeError::new("offer abandoned"))?;
        }
        Ok(SessionDescription::new(
            SdpType::Offer,
            self.render_sdp(SdpType::Offer),
        ))
    }

    async fn create_answer(&self, _options: OfferAnswerOptions) -> OfferResult {
        self.ensure_open()?;
        if self.remote_description.read().is_none() {
            return Err(NativeError::new("no remote description to answer"));
        }
        Ok(SessionDescription::new(
            SdpType::Answer,
            self.render_sdp(SdpType::Answer),
        ))
    }

    async fn set_local_description(
        &self,
        description: Option<SessionDescription>,
    ) -> Result<(), NativeError> {
        self.ensure_open()?;
        let description = match description {
            Some(description) => description,
            None => {
                let kind = if self.remote_description.read().is_some() {
                    SdpType::Answer
                } else {
                    SdpType::Offer
                };
                SessionDescription::new(kind, self.render_sdp(kind))
            }
        };
        *self.local_description.write() = Some(description);
        self.negotiate_mids();
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NativeError> {
        self.ensure_open()?;
        if description.sdp.is_empty() {
            return Err(NativeError::new("empty session description"));
        }
        *self.remote_description.write() = Some(description);
        self.negotiate_mids();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NativeError> {
        self.ensure_open()?;
        if self.remote_description.read().is_none() {
            return Err(NativeError::new(
                "remote description must be set before adding candidates",
            ));
        }
        self.remote_candidates.lock().push(candidate);
        Ok(())
    }

    fn add_transceiver(
        &self,
        media_type: MediaType,
        init: TransceiverInit,
    ) -> Result<Arc<dyn NativeTransceiver>, NativeError> {
        self.ensure_open()?;
        if let Some(reason) = self.add_transceiver_failure.lock().take() {
            return Err(NativeError::new(reason));
        }
        let transceiver = FakeTransceiver::new(media_type, init.direction);
        self.transceivers.write().push(Arc::clone(&transceiver));
        Ok(transceiver)
    }

    fn transceivers(&self) -> Vec<Arc<dyn NativeTransceiver>> {
        self.transceivers
            .read()
            .iter()
            .map(|t| Arc::clone(t) as Arc<dyn NativeTransceiver>)
            .collect()
    }

    fn restart_ice(&self) {
        self.restart_ice_calls.fetch_add(1, Ordering::AcqRel);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Factory handing out [`FakePeerConnection`]s
#[derive(Default)]
pub struct FakeFactory {
    peers: Mutex<Vec<Arc<FakePeerConnection>>>,
    creation_failure: Mutex<Option<String>>,
}

impl FakeFactory {
    /// Create a factory
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every connection created so far
    pub fn peers(&self) -> Vec<Arc<FakePeerConnection>> {
        self.peers.lock().clone()
    }

    /// Most recently created connection
    pub fn last_peer(&self) -> Option<Arc<FakePeerConnection>> {
        self.peers.lock().last().cloned()
    }

    /// Make the next `create_peer_connection` fail with `reason`
    pub fn fail_next_creation(&self, reason: impl Into<String>) {
        *self.creation_failure.lock() = Some(reason.into());
    }
}

impl NativeFactory for FakeFactory {
    fn create_peer_connection(
        &self,
        configuration: &PeerConnectionConfiguration,
        observer: Arc<dyn NativePeerObserver>,
    ) -> Result<Arc<dyn NativePeerConnection>, NativeError> {
        if let Some(reason) = self.creation_failure.lock().take() {
            return Err(NativeError::new(reason));
        }
        let peer = FakePeerConnection::new(configuration.clone(), observer);
        self.peers.lock().push(Arc::clone(&peer));
        Ok(peer)
    }

    fn rtp_sender_capabilities(&self, kind: MediaType) -> RtpCapabilities {
        let codecs = match kind {
            MediaType::Audio => vec![CodecCapability {
                preferred_payload_type: 111,
                name: "opus".to_string(),
                kind,
                clock_rate: 48_000,
                num_channels: Some(2),
                parameters: HashMap::from([
                    ("minptime".to_string(), "10".to_string()),
                    ("useinbandfec".to_string(), "1".to_string()),
                ]),
                mime_type: "audio/opus".to_string(),
            }],
            MediaType::Video => vec![
                CodecCapability {
                    preferred_payload_type: 96,
                    name: "VP8".to_string(),
                    kind,
                    clock_rate: 90_000,
                    num_channels: None,
                    parameters: HashMap::new(),
                    mime_type: "video/VP8".to_string(),
                },
                CodecCapability {
                    preferred_payload_type: 102,
                    name: "H264".to_string(),
                    kind,
                    clock_rate: 90_000,
                    num_channels: None,
                    parameters: HashMap::from([(
                        "profile-level-id".to_string(),
                        "42e01f".to_string(),
                    )]),
                    mime_type: "video/H264".to_string(),
                },
            ],
        };
        RtpCapabilities {
            codecs,
            header_extensions: vec![HeaderExtensionCapability {
                uri: "urn:ietf:params:rtp-hdrext:sdes:mid".to_string(),
                preferred_id: 4,
                preferred_encrypted: false,
            }],
        }
    }

    fn video_encoders(&self) -> Vec<VideoCodecInfo> {
        VideoCodecInfo::platform_defaults()
    }

    fn video_decoders(&self) -> Vec<VideoCodecInfo> {
        VideoCodecInfo::platform_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullObserver;

    impl NativePeerObserver for NullObserver {
        fn on_signaling_state_change(&self, _: SignalingState) {}
        fn on_ice_connection_state_change(&self, _: IceConnectionState) {}
        fn on_connection_state_change(&self, _: PeerConnectionState) {}
        fn on_ice_gathering_state_change(&self, _: IceGatheringState) {}
        fn on_ice_candidate(&self, _: IceCandidate) {}
        fn on_track(&self, _: Arc<dyn NativeTransceiver>) {}
        fn on_remove_track(&self, _: Arc<dyn NativeReceiver>) {}
        fn on_renegotiation_needed(&self) {}
    }

    fn peer() -> Arc<FakePeerConnection> {
        FakePeerConnection::new(PeerConnectionConfiguration::default(), Arc::new(NullObserver))
    }

    #[tokio::test]
    async fn test_held_offer_resolves() {
        let peer = peer();
        peer.hold_offers(true);

        let pending = {
            let peer = Arc::clone(&peer);
            tokio::spawn(async move { peer.create_offer(OfferAnswerOptions::default()).await })
        };
        while peer.pending_offers() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(peer.resolve_offer(Ok(SessionDescription::new(SdpType::Offer, "v=0"))));
        let offer = pending.await.unwrap().unwrap();
        assert_eq!(offer.sdp, "v=0");
        assert!(!peer.resolve_offer(Ok(SessionDescription::new(SdpType::Offer, "v=0"))));
    }

    #[tokio::test]
    async fn test_negotiation_assigns_mids() {
        let peer = peer();
        peer.add_transceiver(MediaType::Audio, TransceiverInit::new(Direction::SendRecv))
            .unwrap();
        assert!(peer.transceiver(0).unwrap().mid().is_none());

        peer.set_local_description(None).await.unwrap();
        assert_eq!(peer.transceiver(0).unwrap().mid().as_deref(), Some("0"));
        assert_eq!(peer.local_description().unwrap().kind, SdpType::Offer);
    }

    #[tokio::test]
    async fn test_candidates_need_remote_description() {
        let peer = peer();
        let candidate = IceCandidate {
            sdp_mid: "0".to_string(),
            sdp_m_line_index: 0,
            candidate: "candidate:1 1 udp 1 10.0.0.1 9 typ host".to_string(),
        };
        assert!(peer.add_ice_candidate(candidate.clone()).await.is_err());

        peer.set_remote_description(SessionDescription::new(SdpType::Offer, "v=0"))
            .await
            .unwrap();
        peer.add_ice_candidate(candidate).await.unwrap();
        assert_eq!(peer.remote_candidates().len(), 1);
    }

    #[test]
    fn test_closed_peer_refuses_transceivers() {
        let peer = peer();
        peer.close();
        assert!(peer
            .add_transceiver(MediaType::Video, TransceiverInit::new(Direction::SendOnly))
            .is_err());
    }
}
