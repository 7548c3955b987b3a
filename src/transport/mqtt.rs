//! MQTT transport
//!
//! Channel `c` is carried on topic `<topic_prefix>/c`.

use anyhow::Result;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{Incoming, Transport, TransportError, INCOMING_QUEUE};
use crate::config::MqttConfig;
use crate::metrics;

/// Transport backed by an MQTT broker
pub struct MqttTransport {
    client: AsyncClient,
    topics: TopicMap,
    qos: QoS,
    subscriptions: Arc<Mutex<BTreeSet<String>>>,
}

/// Maps channel names to broker topics and back
#[derive(Debug, Clone)]
pub struct TopicMap {
    prefix: String,
}

impl TopicMap {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn topic(&self, channel: &str) -> String {
        if self.prefix.is_empty() {
            channel.to_string()
        } else {
            format!("{}/{}", self.prefix, channel)
        }
    }

    pub fn channel<'a>(&self, topic: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(topic);
        }
        topic
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => {
            warn!("Invalid QoS level {}, using 1", level);
            QoS::AtLeastOnce
        }
    }
}

/// Queue subscribe requests without waiting on the client's request queue
///
/// Runs inside the event loop task, which is the only consumer of that queue.
/// Returns the number of topics that could not be queued.
fn resubscribe(client: &AsyncClient, topics: &[String], qos: QoS) -> usize {
    let mut failed = 0;
    for topic in topics {
        if let Err(e) = client.try_subscribe(topic.as_str(), qos) {
            error!("Failed to resubscribe to {}: {}", topic, e);
            failed += 1;
        }
    }
    failed
}

/// Hand a received message to the node without stalling the event loop
///
/// When the node's queue is full the message is dropped and counted, so
/// keep-alives keep flowing. Returns false once the node is gone.
fn forward(incoming: &mpsc::Sender<Incoming>, message: Incoming) -> bool {
    match incoming.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(message)) => {
            warn!("Incoming queue full, dropping message on {}", message.channel);
            metrics::record_dropped_message(&message.channel);
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

impl MqttTransport {
    /// Create the client and spawn its event loop
    pub async fn connect(config: &MqttConfig) -> Result<(Self, mpsc::Receiver<Incoming>)> {
        let mut mqttoptions = MqttOptions::new(&config.client_id, &config.host, config.port);

        mqttoptions.set_keep_alive(Duration::from_secs(30));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            mqttoptions.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
        let (incoming_tx, incoming_rx) = mpsc::channel(INCOMING_QUEUE);

        let topics = TopicMap::new(&config.topic_prefix);
        let qos = qos_from_level(config.qos);
        let subscriptions: Arc<Mutex<BTreeSet<String>>> = Arc::default();

        let loop_client = client.clone();
        let loop_topics = topics.clone();
        let loop_subscriptions = subscriptions.clone();

        tokio::spawn(async move {
            let mut connected_before = false;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                        metrics::record_mqtt_connection(true);

                        // A clean session forgets subscriptions on reconnect
                        if connected_before {
                            let topics: Vec<String> = loop_subscriptions
                                .lock()
                                .map(|s| s.iter().cloned().collect())
                                .unwrap_or_default();
                            resubscribe(&loop_client, &topics, qos);
                        }
                        connected_before = true;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let Some(channel) = loop_topics.channel(&publish.topic) else {
                            debug!("Ignoring message on foreign topic {}", publish.topic);
                            continue;
                        };
                        let message = Incoming {
                            channel: channel.to_string(),
                            payload: publish.payload.to_vec(),
                        };
                        if !forward(&incoming_tx, message) {
                            info!("Node stopped, closing MQTT event loop");
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::PingResp)) => {
                        debug!("MQTT ping response");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT error: {:?}", e);
                        metrics::record_mqtt_connection(false);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        info!(
            "MQTT transport: {}:{} (prefix '{}')",
            config.host, config.port, config.topic_prefix
        );

        Ok((
            Self {
                client,
                topics,
                qos,
                subscriptions,
            },
            incoming_rx,
        ))
    }
}

impl Transport for MqttTransport {
    fn advertise(&self, channel: &str, type_name: &'static str) -> Result<(), TransportError> {
        // MQTT has no publisher registration; the topic appears on first publish
        debug!(
            "Advertising {} ({}) on {}",
            channel,
            type_name,
            self.topics.topic(channel)
        );
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        let topic = self.topics.topic(channel);
        self.client.try_subscribe(topic.as_str(), self.qos)?;
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.insert(topic.clone());
        }
        debug!("Subscribed to {}", topic);
        Ok(())
    }

    fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let topic = self.topics.topic(channel);
        self.client.try_publish(topic.as_str(), self.qos, false, payload)?;
        Ok(())
    }
}
