//! Command surface of one peer connection

use crate::error::BridgeError;
use crate::guard::DisposalGuard;
use crate::model::{
    IceCandidate, MediaType, OfferAnswerOptions, SessionDescription, TransceiverInit,
};
use crate::native::NativeError;
use crate::proxy::{PeerConnectionProxy, TransceiverProxy};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Completion callback of an asynchronous command
pub type ResultCallback<T> = Box<dyn FnOnce(Result<T, BridgeError>) + Send + 'static>;

type DisposeHook = Box<dyn FnOnce(u64) + Send + 'static>;

/// Runs commands against one peer connection.
///
/// Asynchronous commands run as tokio tasks and hand their result to the
/// callback only while the connection is live. After [`dispose`] every late
/// result is dropped without invoking its callback.
///
/// Dropping the last handle disposes the connection.
///
/// [`dispose`]: PeerConnectionController::dispose
pub struct PeerConnectionController {
    peer: Arc<PeerConnectionProxy>,
    guard: Arc<DisposalGuard>,
    runtime: Handle,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
    on_dispose: Mutex<Option<DisposeHook>>,
}

impl PeerConnectionController {
    pub(crate) fn new(
        peer: Arc<PeerConnectionProxy>,
        guard: Arc<DisposalGuard>,
        runtime: Handle,
        dispatch_task: JoinHandle<()>,
        on_dispose: DisposeHook,
    ) -> Arc<Self> {
        Arc::new(Self {
            peer,
            guard,
            runtime,
            dispatch_task: Mutex::new(Some(dispatch_task)),
            on_dispose: Mutex::new(Some(on_dispose)),
        })
    }

    /// Connection ID
    pub fn id(&self) -> u64 {
        self.peer.id()
    }

    /// Proxy of the connection
    pub fn peer(&self) -> Arc<PeerConnectionProxy> {
        Arc::clone(&self.peer)
    }

    /// Whether [`PeerConnectionController::dispose`] was called
    pub fn is_disposed(&self) -> bool {
        self.guard.is_disposed()
    }

    /// Create an SDP offer
    pub fn create_offer<F>(&self, options: OfferAnswerOptions, callback: F)
    where
        F: FnOnce(Result<SessionDescription, BridgeError>) + Send + 'static,
    {
        let native = self.peer.native();
        self.spawn_command(
            "createOffer",
            async move { native.create_offer(options).await },
            callback,
        );
    }

    /// Create an SDP answer to the applied remote offer
    pub fn create_answer<F>(&self, options: OfferAnswerOptions, callback: F)
    where
        F: FnOnce(Result<SessionDescription, BridgeError>) + Send + 'static,
    {
        let native = self.peer.native();
        self.spawn_command(
            "createAnswer",
            async move { native.create_answer(options).await },
            callback,
        );
    }

    /// Apply a local description. `None` lets the engine generate one.
    pub fn set_local_description<F>(&self, description: Option<SessionDescription>, callback: F)
    where
        F: FnOnce(Result<(), BridgeError>) + Send + 'static,
    {
        let peer = Arc::clone(&self.peer);
        self.spawn_command(
            "setLocalDescription",
            async move {
                peer.native().set_local_description(description).await?;
                // Negotiation assigns mids
                peer.transceivers();
                Ok::<(), NativeError>(())
            },
            callback,
        );
    }

    /// Apply a remote description
    pub fn set_remote_description<F>(&self, description: SessionDescription, callback: F)
    where
        F: FnOnce(Result<(), BridgeError>) + Send + 'static,
    {
        let peer = Arc::clone(&self.peer);
        self.spawn_command(
            "setRemoteDescription",
            async move {
                peer.native().set_remote_description(description).await?;
                peer.transceivers();
                Ok::<(), NativeError>(())
            },
            callback,
        );
    }

    /// Add a remote ICE candidate
    pub fn add_ice_candidate<F>(&self, candidate: IceCandidate, callback: F)
    where
        F: FnOnce(Result<(), BridgeError>) + Send + 'static,
    {
        let native = self.peer.native();
        self.spawn_command(
            "addIceCandidate",
            async move { native.add_ice_candidate(candidate).await },
            callback,
        );
    }

    fn spawn_command<T, Fut, F>(&self, operation: &'static str, command: Fut, callback: F)
    where
        T: Send + 'static,
        Fut: Future<Output = Result<T, NativeError>> + Send + 'static,
        F: FnOnce(Result<T, BridgeError>) + Send + 'static,
    {
        if self.guard.is_disposed() {
            let err = BridgeError::OperationOnDisposed {
                operation: operation.to_string(),
            };
            debug!("Connection {}: {}", self.id(), err);
            return;
        }

        let guard = Arc::clone(&self.guard);
        let id = self.id();
        self.runtime.spawn(async move {
            let result = command
                .await
                .map_err(|e| BridgeError::native(operation, e));
            if let Err(err) = &result {
                debug!("Connection {} {} failed: {}", id, operation, err);
            }
            if !guard.deliver(|| callback(result)) {
                debug!(
                    "Connection {}: {}",
                    id,
                    BridgeError::OperationOnDisposed {
                        operation: operation.to_string(),
                    }
                );
            }
        });
    }

    /// Create a transceiver
    pub fn add_transceiver(
        &self,
        media_type: MediaType,
        init: TransceiverInit,
    ) -> Result<Arc<TransceiverProxy>, BridgeError> {
        self.ensure_live("addTransceiver")?;
        self.peer.add_transceiver(media_type, init)
    }

    /// Transceivers synced with the engine
    pub fn transceivers(&self) -> Result<Vec<Arc<TransceiverProxy>>, BridgeError> {
        self.ensure_live("getTransceivers")?;
        Ok(self.peer.transceivers())
    }

    /// Request an ICE restart on the next negotiation
    pub fn restart_ice(&self) -> Result<(), BridgeError> {
        self.ensure_live("restartIce")?;
        self.peer.restart_ice();
        Ok(())
    }

    fn ensure_live(&self, operation: &str) -> Result<(), BridgeError> {
        if self.guard.is_disposed() {
            return Err(BridgeError::OperationOnDisposed {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Dispose the connection.
    ///
    /// Fences off every later delivery, stops event dispatch, closes the
    /// native connection and drops its observer registration. Returns
    /// `false` when already disposed.
    pub fn dispose(&self) -> bool {
        if !self.guard.dispose() {
            return false;
        }
        if let Some(task) = self.dispatch_task.lock().take() {
            task.abort();
        }
        self.peer.dispose();
        if let Some(hook) = self.on_dispose.lock().take() {
            hook(self.id());
        }
        info!("🗑️ Peer connection {} disposed", self.id());
        true
    }
}

impl Drop for PeerConnectionController {
    fn drop(&mut self) {
        if self.dispose() {
            debug!("Peer connection {} disposed on drop", self.id());
        }
    }
}

impl fmt::Debug for PeerConnectionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerConnectionController")
            .field("id", &self.id())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
