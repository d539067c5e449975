//! Integration tests for peer connection lifecycle, event delivery and
//! disposal fencing against the in-memory engine

use rtcbridge_core::fake::{FakeFactory, FakePeerConnection, FakeTransceiver};
use rtcbridge_core::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

struct Harness {
    native: Arc<FakeFactory>,
    factory: PeerConnectionFactoryProxy,
}

impl Harness {
    fn new() -> Self {
        let native = FakeFactory::new();
        let factory = PeerConnectionFactoryProxy::new(native.clone(), Handle::current());
        Self { native, factory }
    }

    fn connect(
        &self,
    ) -> (
        Arc<PeerConnectionController>,
        Arc<FakePeerConnection>,
        mpsc::UnboundedReceiver<PeerEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = self
            .factory
            .create(&PeerConnectionConfiguration::default(), Arc::new(tx))
            .unwrap();
        let native = self.native.last_peer().unwrap();
        (controller, native, rx)
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<PeerEvent>) -> PeerEvent {
    timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

fn candidate(n: u32) -> IceCandidate {
    IceCandidate {
        sdp_mid: "0".to_string(),
        sdp_m_line_index: 0,
        candidate: format!("candidate:{} 1 udp 2122260223 192.168.1.{} 54400 typ host", n, n),
    }
}

#[tokio::test]
async fn test_events_arrive_in_engine_order() {
    let harness = Harness::new();
    let (_controller, native, mut events) = harness.connect();

    native.fire_signaling_state(SignalingState::HaveLocalOffer);
    native.fire_ice_connection_state(IceConnectionState::Checking);
    native.fire_ice_candidate(candidate(1));

    assert!(matches!(
        next_event(&mut events).await,
        PeerEvent::SignalingStateChanged {
            state: SignalingState::HaveLocalOffer
        }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        PeerEvent::IceConnectionStateChanged {
            state: IceConnectionState::Checking
        }
    ));
    match next_event(&mut events).await {
        PeerEvent::IceCandidateGenerated { candidate: c } => assert_eq!(c, candidate(1)),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_callbacks_from_many_threads_keep_per_thread_order() {
    let harness = Harness::new();
    let (_controller, native, mut events) = harness.connect();

    let threads: Vec<_> = (0..4)
        .map(|t| {
            let native = Arc::clone(&native);
            std::thread::spawn(move || {
                for i in 0..25 {
                    native.fire_ice_candidate(candidate(t * 100 + i));
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    let mut last_seen = [None::<u32>; 4];
    for _ in 0..100 {
        match next_event(&mut events).await {
            PeerEvent::IceCandidateGenerated { candidate } => {
                let n: u32 = candidate
                    .candidate
                    .split(&[':', ' '][..])
                    .nth(1)
                    .unwrap()
                    .parse()
                    .unwrap();
                let (thread, index) = ((n / 100) as usize, n % 100);
                if let Some(previous) = last_seen[thread] {
                    assert!(index > previous);
                }
                last_seen[thread] = Some(index);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_no_offer_delivered_after_dispose() {
    let harness = Harness::new();
    let (controller, native, _events) = harness.connect();
    native.hold_offers(true);

    let (tx, mut rx) = oneshot::channel();
    controller.create_offer(OfferAnswerOptions::default(), move |result| {
        let _ = tx.send(result);
    });
    while native.pending_offers() == 0 {
        tokio::task::yield_now().await;
    }

    assert!(controller.dispose());
    assert!(native.resolve_offer(Ok(SessionDescription::new(SdpType::Offer, "v=0"))));
    settle().await;

    // Callback dropped without running
    assert!(matches!(
        rx.try_recv(),
        Err(oneshot::error::TryRecvError::Closed)
    ));
}

#[tokio::test]
async fn test_no_event_delivered_after_dispose() {
    let harness = Harness::new();
    let (controller, native, mut events) = harness.connect();

    native.fire_negotiation_needed();
    assert!(matches!(
        next_event(&mut events).await,
        PeerEvent::NegotiationNeeded
    ));

    controller.dispose();
    native.fire_negotiation_needed();
    native.fire_connection_state(PeerConnectionState::Closed);
    settle().await;

    // Dispatch task is gone and took the observer with it
    let closed = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("event stream should close after dispose");
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_observer_may_dispose_from_inside_delivery() {
    struct DisposeOnFirstEvent {
        controller: parking_lot::Mutex<Option<Arc<PeerConnectionController>>>,
        delivered: std::sync::atomic::AtomicUsize,
    }

    impl EventObserver for DisposeOnFirstEvent {
        fn on_event(&self, _event: PeerEvent) {
            self.delivered
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if let Some(controller) = self.controller.lock().take() {
                assert!(controller.dispose());
            }
        }
    }

    let harness = Harness::new();
    let observer = Arc::new(DisposeOnFirstEvent {
        controller: parking_lot::Mutex::new(None),
        delivered: std::sync::atomic::AtomicUsize::new(0),
    });
    let controller = harness
        .factory
        .create(&PeerConnectionConfiguration::default(), observer.clone())
        .unwrap();
    *observer.controller.lock() = Some(Arc::clone(&controller));
    let native = harness.native.last_peer().unwrap();

    native.fire_negotiation_needed();
    native.fire_negotiation_needed();
    settle().await;

    assert!(controller.is_disposed());
    assert_eq!(
        observer.delivered.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn test_track_started_without_transceiver_is_suppressed() {
    let harness = Harness::new();
    let (_controller, native, mut events) = harness.connect();

    native.fire_track(FakeTransceiver::new(MediaType::Video, Direction::RecvOnly));
    native.fire_negotiation_needed();

    // Only the event after the stray callback comes through
    assert!(matches!(
        next_event(&mut events).await,
        PeerEvent::NegotiationNeeded
    ));
}

#[tokio::test]
async fn test_remote_track_lifecycle() {
    let harness = Harness::new();
    let (controller, native, mut events) = harness.connect();

    let remote = native.add_remote_transceiver(MediaType::Audio, Direction::RecvOnly);
    native.fire_track(remote.clone());

    let started = match next_event(&mut events).await {
        PeerEvent::TrackStarted { track, transceiver } => {
            assert_eq!(track.settings().device_id, "remote");
            assert_eq!(transceiver.media_type(), MediaType::Audio);
            transceiver
        }
        other => panic!("unexpected event: {:?}", other),
    };
    let listed = controller.transceivers().unwrap();
    assert!(Arc::ptr_eq(&listed[0], &started));

    native.fire_remove_track(remote.receiver());
    match next_event(&mut events).await {
        PeerEvent::ReceiverRemoved {
            receiver,
            transceiver,
        } => {
            assert!(receiver.is_removed());
            assert!(Arc::ptr_eq(&transceiver, &started));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_signaling_round_trip_assigns_mids() {
    let harness = Harness::new();
    let (controller, _native, _events) = harness.connect();
    let transceiver = controller
        .add_transceiver(MediaType::Video, TransceiverInit::new(Direction::SendRecv))
        .unwrap();
    assert!(transceiver.mid().is_none());

    let (tx, rx) = oneshot::channel();
    controller.create_offer(OfferAnswerOptions::default(), move |result| {
        let _ = tx.send(result);
    });
    let offer = rx.await.unwrap().unwrap();
    assert_eq!(offer.kind, SdpType::Offer);
    assert!(offer.sdp.contains("m=video"));

    let (tx, rx) = oneshot::channel();
    controller.set_local_description(Some(offer), move |result| {
        let _ = tx.send(result);
    });
    rx.await.unwrap().unwrap();
    assert_eq!(transceiver.mid().as_deref(), Some("0"));
}

#[tokio::test]
async fn test_native_failure_is_reported_to_caller() {
    let harness = Harness::new();
    let (controller, _native, _events) = harness.connect();

    let (tx, rx) = oneshot::channel();
    controller.add_ice_candidate(candidate(1), move |result| {
        let _ = tx.send(result);
    });
    let err = rx.await.unwrap().unwrap_err();
    assert_eq!(err.error_code(), "NATIVE_OPERATION_FAILED");
    assert!(matches!(
        err,
        BridgeError::Native { ref operation, .. } if operation == "addIceCandidate"
    ));
}

#[tokio::test]
async fn test_sync_commands_after_dispose() {
    let harness = Harness::new();
    let (controller, native, _events) = harness.connect();
    controller.dispose();

    let err = controller.restart_ice().unwrap_err();
    assert!(err.is_suppressed());
    assert_eq!(native.restart_ice_calls(), 0);
    assert!(controller
        .add_transceiver(MediaType::Audio, TransceiverInit::new(Direction::SendRecv))
        .unwrap_err()
        .is_suppressed());
    assert!(native.is_closed());
    assert!(!harness.factory.has_observer(controller.id()));
}

#[tokio::test]
async fn test_add_transceiver_failure_surfaces() {
    let harness = Harness::new();
    let (controller, native, _events) = harness.connect();
    native.fail_next_add_transceiver("codec unavailable");

    let err = controller
        .add_transceiver(MediaType::Video, TransceiverInit::new(Direction::SendOnly))
        .unwrap_err();
    assert_eq!(err.error_code(), "ADD_TRANSCEIVER_FAILED");
    assert!(!err.is_suppressed());
}
