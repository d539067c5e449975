//! Peer connection factory
//!
//! Creates connections through the native factory, owns the registry of
//! native observers (one per live connection) and the registry of local
//! tracks the application can attach to senders.

use crate::bridge::{EventBridge, PeerObserver};
use crate::capabilities::{RtpCapabilities, VideoCodecInfo};
use crate::controller::PeerConnectionController;
use crate::error::BridgeError;
use crate::event::EventObserver;
use crate::guard::DisposalGuard;
use crate::model::{MediaType, PeerConnectionConfiguration};
use crate::native::NativeFactory;
use crate::proxy::{PeerConnectionProxy, TrackProxy};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct Registration {
    observer: Arc<PeerObserver>,
    controller: Weak<PeerConnectionController>,
}

/// Factory and registry of peer connections
pub struct PeerConnectionFactoryProxy {
    native: Arc<dyn NativeFactory>,
    runtime: Handle,
    last_id: AtomicU64,
    connections: Arc<DashMap<u64, Registration>>,
    // Reserved slots, counted against `max_peer_connections`
    live: Arc<AtomicUsize>,
    tracks: DashMap<String, Arc<TrackProxy>>,
    max_peer_connections: Option<usize>,
}

impl PeerConnectionFactoryProxy {
    /// Create a factory spawning connection tasks on `runtime`
    pub fn new(native: Arc<dyn NativeFactory>, runtime: Handle) -> Self {
        Self {
            native,
            runtime,
            last_id: AtomicU64::new(0),
            connections: Arc::new(DashMap::new()),
            live: Arc::new(AtomicUsize::new(0)),
            tracks: DashMap::new(),
            max_peer_connections: None,
        }
    }

    /// Cap the number of live connections
    pub fn with_max_peer_connections(mut self, limit: Option<usize>) -> Self {
        self.max_peer_connections = limit;
        self
    }

    /// Create a peer connection delivering its events to `observer`
    pub fn create(
        &self,
        configuration: &PeerConnectionConfiguration,
        observer: Arc<dyn EventObserver>,
    ) -> Result<Arc<PeerConnectionController>, BridgeError> {
        self.reserve_slot()?;

        let id = self.last_id.fetch_add(1, Ordering::Relaxed);
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let native_observer = Arc::new(PeerObserver::new(id, queue_tx));

        let native = self
            .native
            .create_peer_connection(configuration, native_observer.clone())
            .map_err(|e| {
                self.live.fetch_sub(1, Ordering::AcqRel);
                warn!("❌ Native factory failed to create peer connection: {}", e);
                BridgeError::PeerConnectionCreationFailed { reason: e.message }
            })?;

        let peer = PeerConnectionProxy::new(id, native);
        let guard = Arc::new(DisposalGuard::new());
        let dispatch_task =
            EventBridge::new(Arc::clone(&peer), observer, Arc::clone(&guard))
                .spawn(&self.runtime, queue_rx);

        let connections = Arc::clone(&self.connections);
        let live = Arc::clone(&self.live);
        let controller = PeerConnectionController::new(
            peer,
            guard,
            self.runtime.clone(),
            dispatch_task,
            Box::new(move |id| {
                if connections.remove(&id).is_some() {
                    debug!("Observer of connection {} unregistered", id);
                }
                live.fetch_sub(1, Ordering::AcqRel);
            }),
        );

        self.connections.insert(
            id,
            Registration {
                observer: native_observer,
                controller: Arc::downgrade(&controller),
            },
        );
        info!(
            "🚀 Created peer connection {} ({} ICE servers)",
            id,
            configuration.ice_servers.len()
        );
        Ok(controller)
    }

    fn reserve_slot(&self) -> Result<(), BridgeError> {
        let limit = self.max_peer_connections;
        let reserved = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| match limit {
                Some(limit) if live >= limit => None,
                _ => Some(live + 1),
            });
        match (reserved, limit) {
            (Err(_), Some(limit)) => {
                warn!("❌ Peer connection limit reached ({})", limit);
                Err(BridgeError::ResourceLimit {
                    resource: "peer_connections".to_string(),
                    limit,
                })
            }
            _ => Ok(()),
        }
    }

    /// Live connection with the given ID
    pub fn connection(&self, id: u64) -> Option<Arc<PeerConnectionController>> {
        self.connections
            .get(&id)
            .and_then(|registration| registration.controller.upgrade())
    }

    /// Whether a native observer is registered for `id`
    pub fn has_observer(&self, id: u64) -> bool {
        self.connections
            .get(&id)
            .map(|registration| registration.observer.connection_id() == id)
            .unwrap_or(false)
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Dispose every live connection
    pub fn dispose_all(&self) {
        let controllers: Vec<_> = self
            .connections
            .iter()
            .filter_map(|registration| registration.controller.upgrade())
            .collect();
        for controller in controllers {
            controller.dispose();
        }
        info!("🧹 Disposed all peer connections");
    }

    /// Register a local track. Returns its ID.
    pub fn register_track(&self, track: Arc<TrackProxy>) -> String {
        let id = track.id();
        debug!("🎙️ Registered local track {}", id);
        self.tracks.insert(id.clone(), track);
        id
    }

    /// Registered local track
    pub fn track(&self, id: &str) -> Result<Arc<TrackProxy>, BridgeError> {
        self.tracks
            .get(id)
            .map(|track| Arc::clone(&track))
            .ok_or_else(|| BridgeError::TrackNotFound {
                track_id: id.to_string(),
            })
    }

    /// Drop the registry's reference to a local track
    pub fn unregister_track(&self, id: &str) -> Option<Arc<TrackProxy>> {
        self.tracks.remove(id).map(|(_, track)| track)
    }

    /// Sender capabilities for a media kind
    pub fn rtp_sender_capabilities(&self, kind: MediaType) -> RtpCapabilities {
        self.native.rtp_sender_capabilities(kind)
    }

    /// Available video encoders
    pub fn video_encoders(&self) -> Vec<VideoCodecInfo> {
        self.native.video_encoders()
    }

    /// Available video decoders
    pub fn video_decoders(&self) -> Vec<VideoCodecInfo> {
        self.native.video_decoders()
    }
}
