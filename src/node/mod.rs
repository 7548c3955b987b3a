//! Node: the explicit middleware context bridges are registered against
//!
//! A [`Node`] owns the transport, the table of registered bridges and the
//! native value store. [`Node::spin`] runs the dispatch loop until the
//! [`ShutdownToken`] is cancelled.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::codec::WireMessage;
use crate::error::BridgeError;
use crate::metrics::{self, MessageMetrics};
use crate::transport::{Incoming, Transport, TransportError};
use crate::value::{NativeType, NativeValue};

pub mod bridge;
pub mod names;
pub mod shutdown;
pub mod store;

pub use bridge::{BridgeDescriptor, BridgeHandle, Direction};
pub use names::NodeOptions;
pub use shutdown::ShutdownToken;
pub use store::{NativeEntry, NativeStore, ValueUpdate};

use bridge::{InboundBridge, InboundHandler, OutboundBridge, OutboundHandler};

const WRITE_QUEUE: usize = 100;

/// Lifecycle of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Bridges may be registered
    Registering,
    /// Inside [`Node::spin`]
    Running,
    /// [`Node::spin`] has returned
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Registering => "registering",
            Phase::Running => "running",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Request to publish a native value through an outbound bridge
pub struct WriteRequest {
    pub channel: String,
    pub value: NativeValue,
    pub response_tx: oneshot::Sender<Result<(), BridgeError>>,
}

/// Cloneable entry point for writing native values into a running node
#[derive(Clone)]
pub struct NativeWriter {
    tx: mpsc::Sender<WriteRequest>,
}

impl NativeWriter {
    /// Publish `value` on the outbound bridge registered for `channel`
    ///
    /// Waits until the dispatch loop has handled the request.
    pub async fn write(
        &self,
        channel: &str,
        value: impl Into<NativeValue>,
    ) -> Result<(), BridgeError> {
        let (response_tx, response_rx) = oneshot::channel();
        let request = WriteRequest {
            channel: channel.to_string(),
            value: value.into(),
            response_tx,
        };

        self.tx
            .send(request)
            .await
            .map_err(|_| BridgeError::NodeStopped)?;
        response_rx.await.map_err(|_| BridgeError::NodeStopped)?
    }
}

struct Registered<H: ?Sized> {
    descriptor: Arc<BridgeDescriptor>,
    handler: Box<H>,
}

pub struct Node {
    options: NodeOptions,
    transport: Arc<dyn Transport>,
    incoming: mpsc::Receiver<Incoming>,
    writes_tx: mpsc::Sender<WriteRequest>,
    writes_rx: mpsc::Receiver<WriteRequest>,
    inbound: HashMap<String, Registered<dyn InboundHandler>>,
    outbound: HashMap<String, Registered<dyn OutboundHandler>>,
    store: NativeStore,
    phase: watch::Sender<Phase>,
}

impl Node {
    /// Create a node on top of a transport and its incoming queue
    pub fn new(
        options: NodeOptions,
        transport: Arc<dyn Transport>,
        incoming: mpsc::Receiver<Incoming>,
    ) -> Self {
        let (writes_tx, writes_rx) = mpsc::channel(WRITE_QUEUE);
        let (phase, _) = watch::channel(Phase::Registering);

        info!(
            "Node {} initialized (namespace '{}')",
            options.name, options.namespace
        );

        Self {
            options,
            transport,
            incoming,
            writes_tx,
            writes_rx,
            inbound: HashMap::new(),
            outbound: HashMap::new(),
            store: NativeStore::new(),
            phase,
        }
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub fn resolve(&self, name: &str) -> String {
        self.options.resolve(name)
    }

    pub fn store(&self) -> NativeStore {
        self.store.clone()
    }

    pub fn writer(&self) -> NativeWriter {
        NativeWriter {
            tx: self.writes_tx.clone(),
        }
    }

    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Descriptors of every registered bridge, ordered by channel
    pub fn bridges(&self) -> Vec<BridgeDescriptor> {
        let mut bridges: Vec<BridgeDescriptor> = self
            .inbound
            .values()
            .map(|r| r.descriptor.as_ref().clone())
            .chain(self.outbound.values().map(|r| r.descriptor.as_ref().clone()))
            .collect();
        bridges.sort_by(|a, b| a.channel.cmp(&b.channel));
        bridges
    }

    /// Subscribe on `name`, decoding each `W` message into an `N` in the store
    pub async fn register_inbound<N, W>(&mut self, name: &str) -> Result<BridgeHandle, BridgeError>
    where
        N: NativeType + From<W>,
        W: WireMessage,
    {
        let channel = self.resolve(name);
        self.ensure_valid(name, &channel)?;
        self.transport.subscribe(&channel)?;

        let descriptor = Arc::new(BridgeDescriptor {
            channel: channel.clone(),
            direction: Direction::Inbound,
            native_type: N::KIND,
            wire_type: W::TYPE_NAME,
        });
        self.inbound.insert(
            channel,
            Registered {
                descriptor: descriptor.clone(),
                handler: Box::new(InboundBridge::<N, W>::new()),
            },
        );

        Ok(self.finish_registration(descriptor).await)
    }

    /// Advertise on `name`, publishing every `N` written for it as a `W`
    pub async fn register_outbound<N, W>(&mut self, name: &str) -> Result<BridgeHandle, BridgeError>
    where
        N: NativeType,
        W: WireMessage + From<N>,
    {
        let channel = self.resolve(name);
        self.ensure_valid(name, &channel)?;
        self.transport.advertise(&channel, W::TYPE_NAME)?;

        let descriptor = Arc::new(BridgeDescriptor {
            channel: channel.clone(),
            direction: Direction::Outbound,
            native_type: N::KIND,
            wire_type: W::TYPE_NAME,
        });
        self.outbound.insert(
            channel,
            Registered {
                descriptor: descriptor.clone(),
                handler: Box::new(OutboundBridge::<N, W>::new()),
            },
        );

        Ok(self.finish_registration(descriptor).await)
    }

    fn ensure_valid(&self, name: &str, channel: &str) -> Result<(), BridgeError> {
        if channel.is_empty() {
            return Err(BridgeError::EmptyChannel(name.to_string()));
        }
        self.ensure_free(channel)
    }

    fn ensure_free(&self, channel: &str) -> Result<(), BridgeError> {
        let existing = if self.inbound.contains_key(channel) {
            Some(Direction::Inbound)
        } else if self.outbound.contains_key(channel) {
            Some(Direction::Outbound)
        } else {
            None
        };

        match existing {
            Some(existing) => Err(BridgeError::ChannelInUse {
                channel: channel.to_string(),
                existing,
            }),
            None => Ok(()),
        }
    }

    async fn finish_registration(&self, descriptor: Arc<BridgeDescriptor>) -> BridgeHandle {
        self.store.register(&descriptor).await;
        metrics::record_registered_bridges(self.inbound.len() + self.outbound.len());

        info!(
            "Registered {} bridge {} ({} <-> {})",
            descriptor.direction, descriptor.channel, descriptor.native_type, descriptor.wire_type
        );

        BridgeHandle::new(descriptor, self.store.clone())
    }

    /// Run the dispatch loop until `shutdown` is cancelled
    ///
    /// Incoming wire messages go to inbound bridges, native writes to outbound
    /// bridges. Returns an error only if the transport's incoming queue closes.
    pub async fn spin(mut self, shutdown: ShutdownToken) -> Result<(), BridgeError> {
        self.phase.send_replace(Phase::Running);
        metrics::record_node_running(true);
        info!(
            "Node {} spinning with {} bridges",
            self.options.name,
            self.inbound.len() + self.outbound.len()
        );

        let result = loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Node {} shutting down", self.options.name);
                    break Ok(());
                }
                message = self.incoming.recv() => match message {
                    Some(message) => self.dispatch(message).await,
                    None => {
                        warn!("Transport closed, node {} stopping", self.options.name);
                        break Err(TransportError::Closed.into());
                    }
                },
                Some(request) = self.writes_rx.recv() => {
                    let result = self.publish(&request.channel, request.value).await;
                    let _ = request.response_tx.send(result);
                }
            }
        };

        self.phase.send_replace(Phase::Terminated);
        metrics::record_node_running(false);
        result
    }

    async fn dispatch(&self, message: Incoming) {
        let Some(bridge) = self.inbound.get(&message.channel) else {
            debug!("No inbound bridge for channel {}", message.channel);
            return;
        };

        let timer = MessageMetrics::start(&message.channel, Direction::Inbound);
        match bridge.handler.decode(&message.payload) {
            Ok(value) => {
                debug!("{} <- {}", message.channel, value);
                timer.success(value.as_f64());
                self.store.record(&message.channel, value).await;
            }
            Err(e) => {
                timer.failure("decode");
                warn!("Dropping malformed message on {}: {}", message.channel, e);
            }
        }
    }

    async fn publish(&self, channel: &str, value: NativeValue) -> Result<(), BridgeError> {
        let Some(bridge) = self.outbound.get(channel) else {
            return Err(match self.inbound.get(channel) {
                Some(_) => BridgeError::WrongDirection {
                    channel: channel.to_string(),
                    expected: Direction::Outbound,
                    actual: Direction::Inbound,
                },
                None => BridgeError::UnknownChannel(channel.to_string()),
            });
        };

        let timer = MessageMetrics::start(channel, Direction::Outbound);
        let Some(payload) = bridge.handler.encode(&value) else {
            timer.failure("type_mismatch");
            return Err(BridgeError::TypeMismatch {
                channel: channel.to_string(),
                expected: bridge.descriptor.native_type,
                found: value.kind(),
            });
        };

        if let Err(e) = self.transport.publish(channel, payload) {
            timer.failure("transport");
            return Err(e.into());
        }

        debug!("{} -> {}", channel, value);
        timer.success(value.as_f64());
        self.store.record(channel, value).await;
        Ok(())
    }
}
