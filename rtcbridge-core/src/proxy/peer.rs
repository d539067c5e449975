//! Peer connection proxy

use super::{Proxy, ReceiverProxy, TransceiverProxy};
use crate::error::BridgeError;
use crate::model::{MediaType, TransceiverInit};
use crate::native::NativePeerConnection;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Proxy around a native peer connection and its transceivers
pub struct PeerConnectionProxy {
    id: u64,
    native: Arc<dyn NativePeerConnection>,
    transceivers: RwLock<Vec<Arc<TransceiverProxy>>>,
    last_transceiver_id: AtomicU64,
}

impl PeerConnectionProxy {
    /// Wrap a native peer connection under the given connection ID
    pub fn new(id: u64, native: Arc<dyn NativePeerConnection>) -> Arc<Self> {
        Arc::new(Self {
            id,
            native,
            transceivers: RwLock::new(Vec::new()),
            last_transceiver_id: AtomicU64::new(0),
        })
    }

    /// Connection ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Underlying native peer connection
    pub fn native(&self) -> Arc<dyn NativePeerConnection> {
        Arc::clone(&self.native)
    }

    fn next_transceiver_id(&self) -> u64 {
        self.last_transceiver_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a transceiver and wrap it
    pub fn add_transceiver(
        &self,
        media_type: MediaType,
        init: TransceiverInit,
    ) -> Result<Arc<TransceiverProxy>, BridgeError> {
        let direction = init.direction;
        let native = self
            .native
            .add_transceiver(media_type, init)
            .map_err(|e| {
                warn!("❌ Peer {} refused to add {:?} transceiver: {}", self.id, media_type, e);
                BridgeError::AddTransceiverFailed { reason: e.message }
            })?;

        let created = self
            .transceivers()
            .into_iter()
            .rev()
            .find(|t| Arc::ptr_eq(&t.native(), &native))
            .ok_or_else(|| BridgeError::AddTransceiverFailed {
                reason: "engine did not list the created transceiver".to_string(),
            })?;

        info!(
            "➕ Peer {} added {:?} transceiver {} ({})",
            self.id,
            media_type,
            created.id(),
            direction
        );
        Ok(created)
    }

    /// Transceivers synced with the native list.
    ///
    /// Proxies are matched to native transceivers by position: the engine
    /// only ever appends to this list.
    pub fn transceivers(&self) -> Vec<Arc<TransceiverProxy>> {
        let natives = self.native.transceivers();
        let mut transceivers = self.transceivers.write();
        for (index, native) in natives.into_iter().enumerate() {
            match transceivers.get(index) {
                Some(proxy) => proxy.replace(native),
                None => {
                    let proxy = TransceiverProxy::new(self.next_transceiver_id(), native);
                    debug!("Peer {} discovered transceiver {}", self.id, proxy.id());
                    transceivers.push(proxy);
                }
            }
        }
        transceivers.clone()
    }

    /// Find a cached transceiver by its proxy ID
    pub fn transceiver(&self, id: u64) -> Option<Arc<TransceiverProxy>> {
        self.transceivers
            .read()
            .iter()
            .find(|t| t.id() == id)
            .cloned()
    }

    /// Find the cached receiver with the given native receiver ID
    pub fn find_receiver(&self, receiver_id: &str) -> Option<Arc<ReceiverProxy>> {
        self.transceivers
            .read()
            .iter()
            .map(|t| t.receiver())
            .find(|r| r.id() == receiver_id)
    }

    /// Request an ICE restart on the next negotiation
    pub fn restart_ice(&self) {
        debug!("🧊 Peer {} ICE restart requested", self.id);
        self.native.restart_ice();
    }

    /// Dispose every sender and close the native connection
    pub fn dispose(&self) {
        for transceiver in self.transceivers.read().iter() {
            transceiver.sender().set_disposed();
        }
        self.native.close();
        info!("🔌 Peer {} closed", self.id);
    }
}

impl fmt::Debug for PeerConnectionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerConnectionProxy")
            .field("id", &self.id)
            .field("transceivers", &*self.transceivers.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::Direction;
    use crate::fake::FakePeerConnection;
    use crate::model::PeerConnectionConfiguration;
    use crate::native::{NativePeerObserver, NativeReceiver, NativeTransceiver};

    struct Silent;

    impl NativePeerObserver for Silent {
        fn on_signaling_state_change(&self, _: crate::model::SignalingState) {}
        fn on_ice_connection_state_change(&self, _: crate::model::IceConnectionState) {}
        fn on_connection_state_change(&self, _: crate::model::PeerConnectionState) {}
        fn on_ice_gathering_state_change(&self, _: crate::model::IceGatheringState) {}
        fn on_ice_candidate(&self, _: crate::model::IceCandidate) {}
        fn on_track(&self, _: Arc<dyn NativeTransceiver>) {}
        fn on_remove_track(&self, _: Arc<dyn NativeReceiver>) {}
        fn on_renegotiation_needed(&self) {}
    }

    fn peer() -> (Arc<FakePeerConnection>, Arc<PeerConnectionProxy>) {
        let native =
            FakePeerConnection::new(PeerConnectionConfiguration::default(), Arc::new(Silent));
        let proxy = PeerConnectionProxy::new(7, native.clone());
        (native, proxy)
    }

    #[test]
    fn test_transceivers_keep_identity_across_syncs() {
        let (native, peer) = peer();
        let audio = peer
            .add_transceiver(MediaType::Audio, TransceiverInit::new(Direction::SendRecv))
            .unwrap();
        native.add_remote_transceiver(MediaType::Video, Direction::RecvOnly);

        let synced = peer.transceivers();
        assert_eq!(synced.len(), 2);
        assert!(Arc::ptr_eq(&synced[0], &audio));
        assert_eq!(synced[1].media_type(), MediaType::Video);

        let again = peer.transceivers();
        assert!(Arc::ptr_eq(&synced[1], &again[1]));
        assert_ne!(again[0].id(), again[1].id());
        assert!(Arc::ptr_eq(&peer.transceiver(again[1].id()).unwrap(), &again[1]));
    }

    #[test]
    fn test_find_receiver() {
        let (native, peer) = peer();
        let fake = native.add_remote_transceiver(MediaType::Audio, Direction::RecvOnly);
        peer.transceivers();

        let receiver_id = fake.receiver().id();
        let receiver = peer.find_receiver(&receiver_id).unwrap();
        assert_eq!(receiver.id(), receiver_id);
        assert!(peer.find_receiver("missing").is_none());
    }

    #[test]
    fn test_add_transceiver_failure() {
        let (native, peer) = peer();
        native.fail_next_add_transceiver("unsupported media");

        let err = peer
            .add_transceiver(MediaType::Video, TransceiverInit::new(Direction::SendOnly))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::AddTransceiverFailed {
                reason: "unsupported media".to_string()
            }
        );
        assert!(peer.transceivers().is_empty());
    }

    #[test]
    fn test_dispose_disposes_senders_and_closes() {
        let (native, peer) = peer();
        let transceiver = peer
            .add_transceiver(MediaType::Audio, TransceiverInit::new(Direction::SendOnly))
            .unwrap();

        peer.dispose();

        assert!(transceiver.sender().is_disposed());
        assert!(native.is_closed());
    }

    #[test]
    fn test_restart_ice_reaches_engine() {
        let (native, peer) = peer();
        peer.restart_ice();
        assert_eq!(native.restart_ice_calls(), 1);
    }
}
