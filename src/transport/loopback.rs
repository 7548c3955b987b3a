//! In-process transport
//!
//! Every transport attached to the same [`LoopbackBus`] sees the messages the
//! others publish, including its own when it subscribes to a channel it also
//! publishes on.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

use super::{Incoming, Transport, TransportError, INCOMING_QUEUE};

#[derive(Default)]
struct BusState {
    next_id: usize,
    subscribers: BTreeMap<String, Vec<(usize, mpsc::Sender<Incoming>)>>,
    publishers: BTreeMap<String, BTreeSet<usize>>,
    types: BTreeMap<String, &'static str>,
}

/// Shared in-process message bus
#[derive(Clone, Default)]
pub struct LoopbackBus {
    state: Arc<Mutex<BusState>>,
}

/// Channel as seen by the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    pub channel: String,
    pub type_name: Option<&'static str>,
    pub publishers: usize,
    pub subscribers: usize,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new transport to the bus
    pub fn attach(&self) -> (LoopbackTransport, mpsc::Receiver<Incoming>) {
        let (tx, rx) = mpsc::channel(INCOMING_QUEUE);
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            state.next_id
        };

        let transport = LoopbackTransport {
            id,
            bus: self.clone(),
            tx,
        };
        (transport, rx)
    }

    /// List every channel with an advertiser or a subscriber
    pub fn topics(&self) -> Vec<TopicInfo> {
        let state = self.lock();
        let channels: BTreeSet<&String> = state
            .subscribers
            .keys()
            .chain(state.publishers.keys())
            .collect();

        channels
            .into_iter()
            .map(|channel| TopicInfo {
                channel: channel.clone(),
                type_name: state.types.get(channel).copied(),
                publishers: state.publishers.get(channel).map_or(0, BTreeSet::len),
                subscribers: state.subscribers.get(channel).map_or(0, Vec::len),
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        // The state stays consistent even if a holder panicked mid-update
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One participant on a [`LoopbackBus`]
pub struct LoopbackTransport {
    id: usize,
    bus: LoopbackBus,
    tx: mpsc::Sender<Incoming>,
}

impl Transport for LoopbackTransport {
    fn advertise(&self, channel: &str, type_name: &'static str) -> Result<(), TransportError> {
        let mut state = self.bus.lock();
        state
            .publishers
            .entry(channel.to_string())
            .or_default()
            .insert(self.id);
        state.types.insert(channel.to_string(), type_name);
        debug!("Loopback transport {} advertised {}", self.id, channel);
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        let mut state = self.bus.lock();
        let subscribers = state.subscribers.entry(channel.to_string()).or_default();
        if !subscribers.iter().any(|(id, _)| *id == self.id) {
            subscribers.push((self.id, self.tx.clone()));
        }
        debug!("Loopback transport {} subscribed to {}", self.id, channel);
        Ok(())
    }

    fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let state = self.bus.lock();
        let Some(subscribers) = state.subscribers.get(channel) else {
            return Ok(());
        };

        for (_, tx) in subscribers {
            let message = Incoming {
                channel: channel.to_string(),
                payload: payload.clone(),
            };
            match tx.try_send(message) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    return Err(TransportError::QueueFull(channel.to_string()));
                }
                // Receiver gone: that node has stopped spinning
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        Ok(())
    }
}
