//! Event bridge from native observer callbacks to the application observer
//!
//! The engine calls [`PeerObserver`] on its own threads. The observer only
//! enqueues the raw callback; one dispatch task per connection drains the
//! queue in order, resyncs the proxy graph and hands the translated
//! [`PeerEvent`] to the application through the [`DisposalGuard`].

use crate::error::BridgeError;
use crate::event::{EventObserver, PeerEvent};
use crate::guard::DisposalGuard;
use crate::model::{
    IceCandidate, IceConnectionState, IceGatheringState, PeerConnectionState, SignalingState,
};
use crate::native::{NativePeerObserver, NativeReceiver, NativeTransceiver};
use crate::proxy::PeerConnectionProxy;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Raw callback as raised by the engine
pub enum NativeCallback {
    /// Signaling state changed
    SignalingState(SignalingState),
    /// ICE connection state changed
    IceConnectionState(IceConnectionState),
    /// Aggregate connection state changed
    ConnectionState(PeerConnectionState),
    /// ICE gathering state changed
    IceGatheringState(IceGatheringState),
    /// Local candidate gathered
    IceCandidate(IceCandidate),
    /// Transceiver started receiving
    Track(Arc<dyn NativeTransceiver>),
    /// Receiver removed
    RemoveTrack(Arc<dyn NativeReceiver>),
    /// Renegotiation needed
    RenegotiationNeeded,
}

impl fmt::Debug for NativeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeCallback::SignalingState(state) => write!(f, "SignalingState({:?})", state),
            NativeCallback::IceConnectionState(state) => {
                write!(f, "IceConnectionState({:?})", state)
            }
            NativeCallback::ConnectionState(state) => write!(f, "ConnectionState({:?})", state),
            NativeCallback::IceGatheringState(state) => {
                write!(f, "IceGatheringState({:?})", state)
            }
            NativeCallback::IceCandidate(candidate) => {
                write!(f, "IceCandidate({})", candidate.sdp_mid)
            }
            NativeCallback::Track(transceiver) => {
                write!(f, "Track(receiver {})", transceiver.receiver().id())
            }
            NativeCallback::RemoveTrack(receiver) => write!(f, "RemoveTrack({})", receiver.id()),
            NativeCallback::RenegotiationNeeded => write!(f, "RenegotiationNeeded"),
        }
    }
}

/// Observer registered with the native engine for one connection
#[derive(Debug)]
pub struct PeerObserver {
    connection_id: u64,
    queue: mpsc::UnboundedSender<NativeCallback>,
}

impl PeerObserver {
    /// Create an observer feeding `queue`
    pub fn new(connection_id: u64, queue: mpsc::UnboundedSender<NativeCallback>) -> Self {
        Self {
            connection_id,
            queue,
        }
    }

    /// Connection the observer reports for
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    fn enqueue(&self, callback: NativeCallback) {
        if let Err(mpsc::error::SendError(callback)) = self.queue.send(callback) {
            debug!(
                "Connection {} dispatch stopped, dropping {:?}",
                self.connection_id, callback
            );
        }
    }
}

impl NativePeerObserver for PeerObserver {
    fn on_signaling_state_change(&self, state: SignalingState) {
        self.enqueue(NativeCallback::SignalingState(state));
    }

    fn on_ice_connection_state_change(&self, state: IceConnectionState) {
        self.enqueue(NativeCallback::IceConnectionState(state));
    }

    fn on_connection_state_change(&self, state: PeerConnectionState) {
        self.enqueue(NativeCallback::ConnectionState(state));
    }

    fn on_ice_gathering_state_change(&self, state: IceGatheringState) {
        self.enqueue(NativeCallback::IceGatheringState(state));
    }

    fn on_ice_candidate(&self, candidate: IceCandidate) {
        self.enqueue(NativeCallback::IceCandidate(candidate));
    }

    fn on_track(&self, transceiver: Arc<dyn NativeTransceiver>) {
        self.enqueue(NativeCallback::Track(transceiver));
    }

    fn on_remove_track(&self, receiver: Arc<dyn NativeReceiver>) {
        self.enqueue(NativeCallback::RemoveTrack(receiver));
    }

    fn on_renegotiation_needed(&self) {
        self.enqueue(NativeCallback::RenegotiationNeeded);
    }
}

/// Translates native callbacks of one connection into [`PeerEvent`]s
pub struct EventBridge {
    peer: Arc<PeerConnectionProxy>,
    observer: Arc<dyn EventObserver>,
    guard: Arc<DisposalGuard>,
}

impl EventBridge {
    /// Create a bridge delivering to `observer`
    pub fn new(
        peer: Arc<PeerConnectionProxy>,
        observer: Arc<dyn EventObserver>,
        guard: Arc<DisposalGuard>,
    ) -> Self {
        Self {
            peer,
            observer,
            guard,
        }
    }

    /// Translate and deliver one callback.
    ///
    /// Returns whether an event reached the observer.
    pub fn dispatch(&self, callback: NativeCallback) -> bool {
        if self.guard.is_disposed() {
            debug!(
                "Connection {} disposed, ignoring {:?}",
                self.peer.id(),
                callback
            );
            return false;
        }

        let event = match self.translate(callback) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    "⚠️ Connection {} suppressed callback: {} ({})",
                    self.peer.id(),
                    err,
                    err.error_code()
                );
                return false;
            }
        };

        debug!(
            "📨 Connection {} delivering {}",
            self.peer.id(),
            event.event_type()
        );
        self.guard.deliver(|| self.observer.on_event(event))
    }

    fn translate(&self, callback: NativeCallback) -> Result<PeerEvent, BridgeError> {
        let event = match callback {
            NativeCallback::SignalingState(state) => PeerEvent::SignalingStateChanged { state },
            NativeCallback::IceConnectionState(state) => {
                PeerEvent::IceConnectionStateChanged { state }
            }
            NativeCallback::ConnectionState(state) => PeerEvent::ConnectionStateChanged { state },
            NativeCallback::IceGatheringState(state) => {
                PeerEvent::IceGatheringStateChanged { state }
            }
            NativeCallback::IceCandidate(candidate) => {
                PeerEvent::IceCandidateGenerated { candidate }
            }
            NativeCallback::Track(native) => {
                let receiver_id = native.receiver().id();
                // Syncing replaces every native receiver, so the matched
                // receiver's track is already resynced
                let transceiver = self
                    .peer
                    .transceivers()
                    .into_iter()
                    .find(|t| t.receiver().id() == receiver_id)
                    .ok_or(BridgeError::NativeCallbackRaceMiss { receiver_id })?;
                PeerEvent::TrackStarted {
                    track: transceiver.receiver().track(),
                    transceiver,
                }
            }
            NativeCallback::RemoveTrack(native) => {
                let receiver_id = native.id();
                let transceiver = self
                    .peer
                    .transceivers()
                    .into_iter()
                    .find(|t| t.receiver().id() == receiver_id)
                    .ok_or(BridgeError::NativeCallbackRaceMiss { receiver_id })?;
                let receiver = transceiver.receiver();
                receiver.notify_removed();
                PeerEvent::ReceiverRemoved {
                    receiver,
                    transceiver,
                }
            }
            NativeCallback::RenegotiationNeeded => PeerEvent::NegotiationNeeded,
        };
        Ok(event)
    }

    /// Drain `queue` until it closes
    pub async fn run(self, mut queue: mpsc::UnboundedReceiver<NativeCallback>) {
        while let Some(callback) = queue.recv().await {
            self.dispatch(callback);
        }
        debug!("Connection {} event queue closed", self.peer.id());
    }

    /// Spawn the dispatch task on `runtime`
    pub fn spawn(
        self,
        runtime: &Handle,
        queue: mpsc::UnboundedReceiver<NativeCallback>,
    ) -> JoinHandle<()> {
        runtime.spawn(self.run(queue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction;
    use crate::fake::{FakePeerConnection, FakeReceiver, FakeTrack, FakeTransceiver};
    use crate::model::{MediaType, PeerConnectionConfiguration, TransceiverInit};
    use crate::native::NativePeerConnection;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<PeerEvent>>,
    }

    impl EventObserver for Recorder {
        fn on_event(&self, event: PeerEvent) {
            self.events.lock().push(event);
        }
    }

    fn bridge() -> (Arc<FakePeerConnection>, EventBridge, Arc<Recorder>) {
        let (tx, _rx) = mpsc::unbounded_channel();
        let native = FakePeerConnection::new(
            PeerConnectionConfiguration::default(),
            Arc::new(PeerObserver::new(0, tx)),
        );
        let peer = PeerConnectionProxy::new(0, native.clone());
        let recorder = Arc::new(Recorder::default());
        let bridge = EventBridge::new(
            peer,
            recorder.clone(),
            Arc::new(DisposalGuard::new()),
        );
        (native, bridge, recorder)
    }

    #[test]
    fn test_track_started_carries_resynced_track() {
        let (native, bridge, recorder) = bridge();
        native
            .add_transceiver(MediaType::Video, TransceiverInit::new(Direction::RecvOnly))
            .unwrap();
        // Proxy exists before the engine swaps in the real remote track
        bridge.peer.transceivers();
        let fake = native.transceiver(0).unwrap();
        let receiver_id = fake.receiver().id();
        fake.swap_receiver(FakeReceiver::new(
            receiver_id,
            FakeTrack::new("remote-video", MediaType::Video),
        ));

        assert!(bridge.dispatch(NativeCallback::Track(fake)));

        let events = recorder.events.lock();
        match &events[..] {
            [PeerEvent::TrackStarted { track, transceiver }] => {
                assert_eq!(track.id(), "remote-video");
                assert!(Arc::ptr_eq(track, &transceiver.receiver().track()));
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_receiver_is_suppressed() {
        let (_native, bridge, recorder) = bridge();
        let stray = FakeTransceiver::new(MediaType::Audio, Direction::RecvOnly);

        assert!(!bridge.dispatch(NativeCallback::Track(stray.clone())));
        assert!(!bridge.dispatch(NativeCallback::RemoveTrack(stray.receiver())));
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn test_receiver_removed_before_notify() {
        let (native, bridge, recorder) = bridge();
        native.add_remote_transceiver(MediaType::Audio, Direction::RecvOnly);
        let transceiver = bridge.peer.transceivers().remove(0);

        let receiver = native.transceiver(0).unwrap().receiver();
        assert!(bridge.dispatch(NativeCallback::RemoveTrack(receiver)));

        assert!(transceiver.receiver().is_removed());
        let events = recorder.events.lock();
        assert!(matches!(
            &events[..],
            [PeerEvent::ReceiverRemoved { receiver, .. }] if receiver.is_removed()
        ));
    }

    #[test]
    fn test_removal_of_never_listed_transceiver() {
        let (native, bridge, recorder) = bridge();
        // Negotiation added it but nothing has listed transceivers yet
        let remote = native.add_remote_transceiver(MediaType::Video, Direction::RecvOnly);

        assert!(bridge.dispatch(NativeCallback::RemoveTrack(remote.receiver())));
        assert!(bridge.dispatch(NativeCallback::RenegotiationNeeded));

        let events = recorder.events.lock();
        match &events[..] {
            [PeerEvent::ReceiverRemoved { receiver, transceiver }, PeerEvent::NegotiationNeeded] => {
                assert!(receiver.is_removed());
                assert!(transceiver.receiver().is_removed());
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_disposed_bridge_delivers_nothing() {
        let (_native, bridge, recorder) = bridge();
        bridge.guard.dispose();
        assert!(!bridge.dispatch(NativeCallback::RenegotiationNeeded));
        assert!(recorder.events.lock().is_empty());
    }
}
