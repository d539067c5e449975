//! # rtcbridge
//!
//! rtcbridge keeps application-side proxies of a native RTC engine's peer
//! connections, transceivers, senders, receivers and tracks in sync with
//! the engine, and exposes them over a method/event channel.
//!
//! ## Key Features
//!
//! - **Identity-stable proxies**: a transceiver keeps its proxy across
//!   engine-side object swaps
//! - **Direction state machine**: `setSend`/`setRecv` on top of whatever
//!   direction the engine currently reports
//! - **Ordered events**: engine callbacks from any thread are delivered in
//!   order on one context per connection
//! - **Disposal guard**: nothing reaches the application after `dispose`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rtcbridge::{GlobalConfig, MethodCall, RtcBridge};
//! use rtcbridge_core::fake::FakeFactory;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), rtcbridge::BridgeError> {
//! let bridge = RtcBridge::init_with(GlobalConfig::debug(), FakeFactory::new())?;
//! let mut events = bridge.take_events().expect("first take");
//!
//! bridge.handle().block_on(async {
//!     let reply = bridge
//!         .invoke(bridge.factory_channel(), MethodCall::new("create", json!({})))
//!         .await;
//!     println!("created: {:?}", reply);
//!     while let Some(event) = events.next().await {
//!         println!("{} {}", event.channel, event.payload);
//!     }
//! });
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use rtcbridge_core::{
    next_direction_for_recv, next_direction_for_send, BridgeError, Direction, EventObserver,
    MediaType, NativeFactory, PeerConnectionConfiguration, PeerConnectionController,
    PeerConnectionFactoryProxy, PeerEvent, TrackProxy, TransceiverInit, TransceiverProxy,
};

#[cfg(feature = "channel")]
pub use rtcbridge_channel::{
    channel_name, ChannelError, ChannelEvent, ChannelRegistry, ErrorReply, MethodCall,
    MethodHandler, MethodResult, Reply,
};

// Public API modules
pub mod config;
#[cfg(feature = "channel")]
pub mod event;
pub mod logging;

pub use config::GlobalConfig;
#[cfg(feature = "channel")]
pub use event::EventStream;
pub use logging::init_logging;

use std::fmt;
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};
use tracing::info;

/// Main entry point for rtcbridge
#[derive(Clone)]
pub struct RtcBridge {
    inner: Arc<RtcBridgeInner>,
}

struct RtcBridgeInner {
    handle: Handle,
    config: GlobalConfig,
    factory: Arc<PeerConnectionFactoryProxy>,
    #[cfg(feature = "channel")]
    channels: Channels,
    // Declared last so it is dropped after every connection
    runtime: Option<Runtime>,
}

#[cfg(feature = "channel")]
struct Channels {
    registry: Arc<ChannelRegistry>,
    factory_channel: String,
    events: parking_lot::Mutex<Option<EventStream>>,
}

impl RtcBridge {
    /// Initialize over `native` with a runtime owned by the bridge.
    ///
    /// Must not be called, nor the last clone dropped, from within an
    /// asynchronous context. Use [`RtcBridge::with_handle`] there.
    pub fn init_with(
        config: GlobalConfig,
        native: Arc<dyn NativeFactory>,
    ) -> Result<Self, BridgeError> {
        init_logging(&config)?;
        let runtime = Runtime::new().map_err(|e| BridgeError::Initialization {
            reason: format!("Failed to create async runtime: {}", e),
        })?;
        let handle = runtime.handle().clone();
        Ok(Self::build(config, native, handle, Some(runtime)))
    }

    /// Initialize over `native`, running connection tasks on `handle`
    pub fn with_handle(
        config: GlobalConfig,
        native: Arc<dyn NativeFactory>,
        handle: Handle,
    ) -> Result<Self, BridgeError> {
        init_logging(&config)?;
        Ok(Self::build(config, native, handle, None))
    }

    fn build(
        config: GlobalConfig,
        native: Arc<dyn NativeFactory>,
        handle: Handle,
        runtime: Option<Runtime>,
    ) -> Self {
        let factory = Arc::new(
            PeerConnectionFactoryProxy::new(native, handle.clone())
                .with_max_peer_connections(config.max_peer_connections),
        );

        #[cfg(feature = "channel")]
        let channels = {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let registry = ChannelRegistry::new(Arc::new(tx));
            let factory_channel =
                rtcbridge_channel::FactoryHandler::register(&registry, Arc::clone(&factory));
            Channels {
                registry,
                factory_channel,
                events: parking_lot::Mutex::new(Some(EventStream::new(rx))),
            }
        };

        info!("🚀 rtcbridge initialized");
        Self {
            inner: Arc::new(RtcBridgeInner {
                handle,
                config,
                factory,
                #[cfg(feature = "channel")]
                channels,
                runtime,
            }),
        }
    }

    /// Global configuration
    pub fn config(&self) -> &GlobalConfig {
        &self.inner.config
    }

    /// Runtime connection tasks run on
    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }

    /// Whether the runtime is owned by this bridge
    pub fn owns_runtime(&self) -> bool {
        self.inner.runtime.is_some()
    }

    /// Peer connection factory
    pub fn factory(&self) -> &Arc<PeerConnectionFactoryProxy> {
        &self.inner.factory
    }

    /// Dispose every live connection and detach every channel
    pub fn shutdown(&self) {
        let count = self.inner.factory.connection_count();
        self.inner.factory.dispose_all();
        #[cfg(feature = "channel")]
        for channel in self.inner.channels.registry.channels() {
            self.inner.channels.registry.unregister(&channel);
        }
        info!("🛑 rtcbridge shut down, {} connection(s) disposed", count);
    }
}

#[cfg(feature = "channel")]
impl RtcBridge {
    /// Registry of every method channel
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.inner.channels.registry
    }

    /// Name of the factory channel
    pub fn factory_channel(&self) -> &str {
        &self.inner.channels.factory_channel
    }

    /// Take the event stream. Only the first call returns it.
    pub fn take_events(&self) -> Option<EventStream> {
        self.inner.channels.events.lock().take()
    }

    /// Route `call` to `channel`, completing `reply` now or later
    pub fn call(&self, channel: &str, call: MethodCall, reply: Reply) {
        self.inner.channels.registry.call(channel, call, reply)
    }

    /// Route `call` to `channel` and wait for its result.
    ///
    /// Returns `None` when the result was dropped by a disposal.
    pub async fn invoke(&self, channel: &str, call: MethodCall) -> Option<MethodResult> {
        self.inner.channels.registry.invoke(channel, call).await
    }
}

impl fmt::Debug for RtcBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtcBridge")
            .field("config", &self.inner.config)
            .field("connections", &self.inner.factory.connection_count())
            .field("owns_runtime", &self.owns_runtime())
            .finish_non_exhaustive()
    }
}
