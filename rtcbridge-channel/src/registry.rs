//! Registry of named method channels

use crate::protocol::{ChannelError, MethodCall, MethodResult};
use crate::sink::EventSink;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Completion of a method call. Dropped without being called when the call
/// raced a disposal.
pub type Reply = Box<dyn FnOnce(MethodResult) + Send + 'static>;

/// Handler of every method call on one channel
pub trait MethodHandler: Send + Sync {
    /// Handle `call`, completing `reply` now or later
    fn handle(&self, call: MethodCall, reply: Reply);
}

/// Name of the channel of kind `kind` with ID `id`
pub fn channel_name(kind: &str, id: u64) -> String {
    format!("{}/{}", kind, id)
}

/// Routes method calls to the handler registered under a channel name
pub struct ChannelRegistry {
    handlers: DashMap<String, Arc<dyn MethodHandler>>,
    last_id: AtomicU64,
    events: Arc<dyn EventSink>,
}

impl ChannelRegistry {
    /// Create a registry emitting events to `events`
    pub fn new(events: Arc<dyn EventSink>) -> Arc<Self> {
        Arc::new(Self {
            handlers: DashMap::new(),
            last_id: AtomicU64::new(0),
            events,
        })
    }

    /// Allocate a channel ID
    pub fn next_id(&self) -> u64 {
        self.last_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Event sink shared by every channel
    pub fn events(&self) -> Arc<dyn EventSink> {
        Arc::clone(&self.events)
    }

    /// Register `handler` under `name`, replacing any previous one
    pub fn register(&self, name: String, handler: Arc<dyn MethodHandler>) {
        debug!("📡 Channel {} registered", name);
        self.handlers.insert(name, handler);
    }

    /// Remove the handler registered under `name`
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.handlers.remove(name).is_some();
        if removed {
            debug!("Channel {} unregistered", name);
        }
        removed
    }

    /// Whether a handler is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Names of every registered channel
    pub fn channels(&self) -> Vec<String> {
        self.handlers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Route `call` to the handler of `channel`
    pub fn call(&self, channel: &str, call: MethodCall, reply: Reply) {
        // Handlers may (un)register channels, so no map guard is held while
        // they run
        let handler = self.handlers.get(channel).map(|h| Arc::clone(h.value()));
        match handler {
            Some(handler) => {
                debug!("➡️ {}::{}", channel, call.method);
                handler.handle(call, reply);
            }
            None => reply(Err(ChannelError::ChannelNotFound {
                channel: channel.to_string(),
            })),
        }
    }

    /// Route `call` and wait for its result.
    ///
    /// Returns `None` when the result was dropped by a disposal.
    pub async fn invoke(&self, channel: &str, call: MethodCall) -> Option<MethodResult> {
        let (tx, rx) = oneshot::channel();
        self.call(
            channel,
            call,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.await.ok()
    }
}
