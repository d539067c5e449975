//! Method handlers for the factory, peer connection and transceiver channels

use crate::protocol::{
    encode, ChannelError, FactoryRequest, MethodCall, MethodResult, PeerConnectionInfo,
    PeerRequest, ReceiverInfo, SenderInfo, TransceiverInfo, TransceiverRequest,
};
use crate::registry::{channel_name, ChannelRegistry, MethodHandler, Reply};
use crate::sink::PeerEventForwarder;
use dashmap::DashMap;
use rtcbridge_core::{
    BridgeError, MediaType, PeerConnectionConfiguration, PeerConnectionController,
    PeerConnectionFactoryProxy, TransceiverInit, TransceiverProxy,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Kind of the factory channel
pub const FACTORY_CHANNEL: &str = "PeerConnectionFactory";
/// Kind of peer connection method channels
pub const PEER_CHANNEL: &str = "PeerConnection";
/// Kind of peer connection event channels
pub const PEER_EVENT_CHANNEL: &str = "PeerConnectionEvent";
/// Kind of transceiver method channels
pub const TRANSCEIVER_CHANNEL: &str = "RtpTransceiver";

fn settle<T: Serialize>(result: Result<T, BridgeError>) -> MethodResult {
    result
        .map_err(ChannelError::from)
        .and_then(|value| encode(&value))
}

/// Complete `reply`, or drop it when the error must not reach the caller
fn respond(reply: Reply, result: MethodResult) {
    if let Err(ChannelError::Bridge(err)) = &result {
        if err.is_suppressed() {
            debug!("Suppressed reply: {}", err);
            return;
        }
    }
    reply(result)
}

fn registry_gone(kind: &str) -> ChannelError {
    ChannelError::ChannelNotFound {
        channel: kind.to_string(),
    }
}

/// Handler of the `PeerConnectionFactory/0` channel
pub struct FactoryHandler {
    factory: Arc<PeerConnectionFactoryProxy>,
    registry: Weak<ChannelRegistry>,
    channel: String,
}

impl FactoryHandler {
    /// Register the factory channel. Returns its name.
    pub fn register(
        registry: &Arc<ChannelRegistry>,
        factory: Arc<PeerConnectionFactoryProxy>,
    ) -> String {
        let channel = channel_name(FACTORY_CHANNEL, 0);
        let handler = Arc::new(Self {
            factory,
            registry: Arc::downgrade(registry),
            channel: channel.clone(),
        });
        registry.register(channel.clone(), handler);
        channel
    }

    fn create(&self, configuration: PeerConnectionConfiguration) -> MethodResult {
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| registry_gone(PEER_CHANNEL))?;
        let channel_id = registry.next_id();
        let transceivers = Arc::new(TransceiverChannels::new(
            Arc::downgrade(&registry),
            Arc::clone(&self.factory),
        ));
        let forwarder = PeerEventForwarder::new(
            channel_name(PEER_EVENT_CHANNEL, channel_id),
            registry.events(),
            Arc::clone(&transceivers),
        );
        let controller = self.factory.create(&configuration, Arc::new(forwarder))?;

        let info = PeerConnectionInfo {
            channel_id,
            id: controller.id(),
        };
        registry.register(
            channel_name(PEER_CHANNEL, channel_id),
            Arc::new(PeerHandler {
                controller,
                channel_id,
                registry: Arc::downgrade(&registry),
                transceivers,
            }),
        );
        encode(&info)
    }

    fn dispose(&self) -> MethodResult {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&self.channel);
        }
        info!("🔌 Factory channel detached");
        Ok(Value::Null)
    }
}

impl MethodHandler for FactoryHandler {
    fn handle(&self, call: MethodCall, reply: Reply) {
        let request = match FactoryRequest::parse(&call) {
            Ok(request) => request,
            Err(e) => return reply(Err(e)),
        };
        let result = match request {
            FactoryRequest::Create(configuration) => self.create(configuration),
            FactoryRequest::GetRtpSenderCapabilities { kind } => {
                encode(&self.factory.rtp_sender_capabilities(kind))
            }
            FactoryRequest::VideoEncoders => encode(&self.factory.video_encoders()),
            FactoryRequest::VideoDecoders => encode(&self.factory.video_decoders()),
            FactoryRequest::Dispose => self.dispose(),
        };
        respond(reply, result);
    }
}

/// Handler of a `PeerConnection/<id>` channel
pub struct PeerHandler {
    controller: Arc<PeerConnectionController>,
    channel_id: u64,
    registry: Weak<ChannelRegistry>,
    transceivers: Arc<TransceiverChannels>,
}

impl PeerHandler {
    fn transceiver_infos(&self) -> MethodResult {
        let infos = self
            .controller
            .transceivers()?
            .iter()
            .map(|t| self.transceivers.info(t))
            .collect::<Result<Vec<_>, _>>()?;
        encode(&infos)
    }

    fn add_transceiver(&self, media_type: MediaType, init: TransceiverInit) -> MethodResult {
        let transceiver = self.controller.add_transceiver(media_type, init)?;
        encode(&self.transceivers.info(&transceiver)?)
    }

    fn dispose(&self) -> MethodResult {
        self.controller.dispose();
        self.transceivers.close_all();
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&channel_name(PEER_CHANNEL, self.channel_id));
        }
        Ok(Value::Null)
    }
}

impl MethodHandler for PeerHandler {
    fn handle(&self, call: MethodCall, reply: Reply) {
        let request = match PeerRequest::parse(&call) {
            Ok(request) => request,
            Err(e) => return reply(Err(e)),
        };
        let result = match request {
            PeerRequest::CreateOffer(options) => {
                return self
                    .controller
                    .create_offer(options, move |result| respond(reply, settle(result)));
            }
            PeerRequest::CreateAnswer(options) => {
                return self
                    .controller
                    .create_answer(options, move |result| respond(reply, settle(result)));
            }
            PeerRequest::SetLocalDescription { description } => {
                return self
                    .controller
                    .set_local_description(description, move |result| {
                        respond(reply, settle(result))
                    });
            }
            PeerRequest::SetRemoteDescription { description } => {
                return self
                    .controller
                    .set_remote_description(description, move |result| {
                        respond(reply, settle(result))
                    });
            }
            PeerRequest::AddIceCandidate { candidate } => {
                return self
                    .controller
                    .add_ice_candidate(candidate, move |result| respond(reply, settle(result)));
            }
            PeerRequest::AddTransceiver { media_type, init } => {
                self.add_transceiver(media_type, init)
            }
            PeerRequest::GetTransceivers => self.transceiver_infos(),
            PeerRequest::RestartIce => settle(self.controller.restart_ice()),
            PeerRequest::Dispose => self.dispose(),
        };
        respond(reply, result);
    }
}

/// Transceiver channels opened by one peer connection
pub struct TransceiverChannels {
    registry: Weak<ChannelRegistry>,
    factory: Arc<PeerConnectionFactoryProxy>,
    /// Transceiver ID to channel ID
    channels: DashMap<u64, u64>,
}

impl TransceiverChannels {
    /// Create an empty set of channels
    pub fn new(registry: Weak<ChannelRegistry>, factory: Arc<PeerConnectionFactoryProxy>) -> Self {
        Self {
            registry,
            factory,
            channels: DashMap::new(),
        }
    }

    /// Describe `transceiver`, opening its channel on first sight
    pub fn info(&self, transceiver: &Arc<TransceiverProxy>) -> Result<TransceiverInfo, ChannelError> {
        let existing = self.channels.get(&transceiver.id()).map(|id| *id);
        let channel_id = match existing {
            Some(channel_id) => channel_id,
            None => self.open(transceiver)?,
        };

        let sender = transceiver.sender();
        let receiver = transceiver.receiver();
        Ok(TransceiverInfo {
            channel_id,
            id: transceiver.id(),
            mid: transceiver.mid(),
            direction: transceiver.direction(),
            media_type: transceiver.media_type(),
            sender: SenderInfo {
                id: sender.id(),
                track: sender.track().map(|t| t.settings()),
            },
            receiver: ReceiverInfo {
                id: receiver.id(),
                track: receiver.track().settings(),
                removed: receiver.is_removed(),
            },
        })
    }

    fn open(&self, transceiver: &Arc<TransceiverProxy>) -> Result<u64, ChannelError> {
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| registry_gone(TRANSCEIVER_CHANNEL))?;
        let channel_id = *self
            .channels
            .entry(transceiver.id())
            .or_insert_with(|| {
                let channel_id = registry.next_id();
                registry.register(
                    channel_name(TRANSCEIVER_CHANNEL, channel_id),
                    Arc::new(TransceiverHandler {
                        transceiver: Arc::clone(transceiver),
                        factory: Arc::clone(&self.factory),
                    }),
                );
                channel_id
            });
        Ok(channel_id)
    }

    /// Number of open channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel is open
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Unregister every channel
    pub fn close_all(&self) {
        let Some(registry) = self.registry.upgrade() else {
            self.channels.clear();
            return;
        };
        for entry in self.channels.iter() {
            registry.unregister(&channel_name(TRANSCEIVER_CHANNEL, *entry.value()));
        }
        self.channels.clear();
    }
}

/// Handler of a `RtpTransceiver/<id>` channel
pub struct TransceiverHandler {
    transceiver: Arc<TransceiverProxy>,
    factory: Arc<PeerConnectionFactoryProxy>,
}

impl TransceiverHandler {
    fn replace_track(&self, track_id: Option<String>) -> Result<(), BridgeError> {
        let track = track_id.map(|id| self.factory.track(&id)).transpose()?;
        self.transceiver.sender().replace_track(track)
    }
}

impl MethodHandler for TransceiverHandler {
    fn handle(&self, call: MethodCall, reply: Reply) {
        let request = match TransceiverRequest::parse(&call) {
            Ok(request) => request,
            Err(e) => return reply(Err(e)),
        };
        let transceiver = &self.transceiver;
        let result = match request {
            TransceiverRequest::SetDirection { direction } => {
                transceiver.set_direction(direction);
                Ok(Value::Null)
            }
            TransceiverRequest::SetRecv { recv } => {
                transceiver.set_recv(recv);
                Ok(Value::Null)
            }
            TransceiverRequest::SetSend { send } => {
                transceiver.set_send(send);
                Ok(Value::Null)
            }
            TransceiverRequest::GetMid => encode(&transceiver.mid()),
            TransceiverRequest::GetDirection => encode(&transceiver.direction()),
            TransceiverRequest::Stop => {
                transceiver.stop();
                Ok(Value::Null)
            }
            TransceiverRequest::ReplaceTrack { track_id } => settle(self.replace_track(track_id)),
        };
        respond(reply, result);
    }
}
