//! Native value store
//!
//! Holds the latest value of every bridge. Inbound bridges write decoded
//! values here; outbound bridges record what they published.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::bridge::{BridgeDescriptor, Direction};
use crate::value::{NativeValue, ValueKind};

const UPDATE_CAPACITY: usize = 100;

/// Store row for one bridge
#[derive(Debug, Clone, Serialize)]
pub struct NativeEntry {
    pub channel: String,
    pub direction: Direction,
    pub native_type: ValueKind,
    pub wire_type: &'static str,
    pub value: Option<NativeValue>,
    pub timestamp: Option<DateTime<Utc>>,
    pub messages: u64,
}

/// Broadcast whenever a value passes through a bridge
#[derive(Debug, Clone, Serialize)]
pub struct ValueUpdate {
    pub channel: String,
    pub direction: Direction,
    pub value: NativeValue,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct NativeStore {
    entries: Arc<RwLock<BTreeMap<String, NativeEntry>>>,
    updates: broadcast::Sender<ValueUpdate>,
}

impl Default for NativeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeStore {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            updates,
        }
    }

    /// Add an empty row for a newly registered bridge
    pub async fn register(&self, descriptor: &BridgeDescriptor) {
        let entry = NativeEntry {
            channel: descriptor.channel.clone(),
            direction: descriptor.direction,
            native_type: descriptor.native_type,
            wire_type: descriptor.wire_type,
            value: None,
            timestamp: None,
            messages: 0,
        };
        self.entries
            .write()
            .await
            .insert(descriptor.channel.clone(), entry);
    }

    /// Record a value for a registered channel; unknown channels are ignored
    pub async fn record(&self, channel: &str, value: NativeValue) -> Option<ValueUpdate> {
        let update = {
            let mut entries = self.entries.write().await;
            let entry = entries.get_mut(channel)?;
            let timestamp = Utc::now();
            entry.value = Some(value.clone());
            entry.timestamp = Some(timestamp);
            entry.messages += 1;

            ValueUpdate {
                channel: channel.to_string(),
                direction: entry.direction,
                value,
                timestamp,
            }
        };

        // No receivers is fine
        let _ = self.updates.send(update.clone());
        Some(update)
    }

    pub async fn get(&self, channel: &str) -> Option<NativeEntry> {
        self.entries.read().await.get(channel).cloned()
    }

    /// All rows, ordered by channel
    pub async fn list(&self) -> Vec<NativeEntry> {
        self.entries.read().await.values().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ValueUpdate> {
        self.updates.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(channel: &str, direction: Direction) -> BridgeDescriptor {
        BridgeDescriptor {
            channel: channel.to_string(),
            direction,
            native_type: ValueKind::F64,
            wire_type: "std_msgs/Float64",
        }
    }

    #[tokio::test]
    async fn test_register_creates_empty_entry() {
        let store = NativeStore::new();
        store
            .register(&descriptor("double_to_codesys", Direction::Inbound))
            .await;

        let entry = store.get("double_to_codesys").await.unwrap();
        assert_eq!(entry.direction, Direction::Inbound);
        assert!(entry.value.is_none());
        assert!(entry.timestamp.is_none());
        assert_eq!(entry.messages, 0);
    }

    #[tokio::test]
    async fn test_record_updates_and_broadcasts() {
        let store = NativeStore::new();
        store
            .register(&descriptor("double_to_ros", Direction::Outbound))
            .await;
        let mut updates = store.subscribe();

        store
            .record("double_to_ros", NativeValue::F64(1.0))
            .await
            .unwrap();
        store
            .record("double_to_ros", NativeValue::F64(2.0))
            .await
            .unwrap();

        let entry = store.get("double_to_ros").await.unwrap();
        assert_eq!(entry.value, Some(NativeValue::F64(2.0)));
        assert_eq!(entry.messages, 2);
        assert!(entry.timestamp.is_some());

        let first = updates.recv().await.unwrap();
        assert_eq!(first.channel, "double_to_ros");
        assert_eq!(first.value, NativeValue::F64(1.0));
    }

    #[tokio::test]
    async fn test_record_unknown_channel() {
        let store = NativeStore::new();
        assert!(store.record("missing", NativeValue::F64(1.0)).await.is_none());
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_is_ordered() {
        let store = NativeStore::new();
        store.register(&descriptor("b", Direction::Inbound)).await;
        store.register(&descriptor("a", Direction::Outbound)).await;

        let channels: Vec<String> = store.list().await.into_iter().map(|e| e.channel).collect();
        assert_eq!(channels, vec!["a", "b"]);
    }
}
