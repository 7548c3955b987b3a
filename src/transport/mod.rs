//! Pub/sub transports carrying wire messages between nodes

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{Config, TransportKind};

pub mod loopback;
pub mod mqtt;

pub use loopback::{LoopbackBus, LoopbackTransport, TopicInfo};
pub use mqtt::MqttTransport;

/// Capacity of the incoming message queue handed to a node
pub const INCOMING_QUEUE: usize = 100;

/// A message received on a subscribed channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub channel: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("queue full for channel {0}")]
    QueueFull(String),
    #[error("transport closed")]
    Closed,
}

/// Outgoing side of a transport
///
/// Received messages are delivered through the `mpsc::Receiver<Incoming>`
/// returned alongside the transport when it is created.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Announce that this process publishes `type_name` messages on `channel`
    fn advertise(&self, channel: &str, type_name: &'static str) -> Result<(), TransportError>;

    /// Start delivering messages published on `channel`
    fn subscribe(&self, channel: &str) -> Result<(), TransportError>;

    fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError>;
}

/// Build the transport selected in the configuration
pub async fn connect(
    config: &Config,
) -> anyhow::Result<(Arc<dyn Transport>, mpsc::Receiver<Incoming>)> {
    match config.transport.kind {
        TransportKind::Mqtt => {
            let (transport, incoming) = MqttTransport::connect(&config.mqtt).await?;
            Ok((Arc::new(transport), incoming))
        }
        TransportKind::Loopback => {
            tracing::warn!("Using in-process loopback transport; no messages leave this process");
            let (transport, incoming) = LoopbackBus::new().attach();
            Ok((Arc::new(transport), incoming))
        }
    }
}
