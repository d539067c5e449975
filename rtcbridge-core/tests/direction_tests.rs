//! Direction negotiation through transceiver proxies

use rtcbridge_core::fake::{FakeFactory, FakePeerConnection};
use rtcbridge_core::*;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

fn connect() -> (Arc<PeerConnectionController>, Arc<FakePeerConnection>) {
    let native = FakeFactory::new();
    let factory = PeerConnectionFactoryProxy::new(native.clone(), Handle::current());
    let (tx, _rx) = mpsc::unbounded_channel::<PeerEvent>();
    let controller = factory
        .create(&PeerConnectionConfiguration::default(), Arc::new(tx))
        .unwrap();
    (controller, native.last_peer().unwrap())
}

#[tokio::test]
async fn test_intents_from_every_start() {
    let (controller, _native) = connect();

    for start in Direction::ALL {
        for want in [true, false] {
            let transceiver = controller
                .add_transceiver(MediaType::Audio, TransceiverInit::new(start))
                .unwrap();
            let sent = transceiver.set_send(want);
            assert_eq!(sent, next_direction_for_send(start, want));
            assert_eq!(sent.is_sending(), want);
            assert_eq!(sent.is_receiving(), start.is_receiving());

            let received = transceiver.set_recv(want);
            assert_eq!(received, next_direction_for_recv(sent, want));
            assert_eq!(transceiver.direction(), received);
        }
    }
}

#[tokio::test]
async fn test_engine_side_direction_is_authoritative() {
    let (controller, native) = connect();
    let transceiver = controller
        .add_transceiver(MediaType::Video, TransceiverInit::new(Direction::SendRecv))
        .unwrap();

    // A remote description narrowed the direction behind our back
    native
        .transceiver(0)
        .unwrap()
        .set_direction(Direction::SendOnly);

    assert_eq!(transceiver.set_recv(false), Direction::SendOnly);
    assert_eq!(transceiver.set_send(false), Direction::Inactive);
}

#[tokio::test]
async fn test_stopped_transceiver_detaches_children() {
    let (controller, native) = connect();
    let transceiver = controller
        .add_transceiver(MediaType::Audio, TransceiverInit::new(Direction::SendRecv))
        .unwrap();

    transceiver.stop();

    assert_eq!(native.transceiver(0).unwrap().stop_calls(), 1);
    assert!(transceiver.receiver().is_removed());
    assert!(transceiver.sender().is_disposed());
}
