//! Bridge descriptors and the typed conversion between native and wire values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::store::NativeStore;
use crate::codec::{CodecError, WireMessage};
use crate::value::{NativeType, NativeValue, ValueKind};

/// Which way values flow through a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Wire to native: the node subscribes and writes decoded values to the store
    Inbound,
    /// Native to wire: values written for the channel are encoded and published
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Immutable description of a registered bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeDescriptor {
    /// Resolved channel name
    pub channel: String,
    pub direction: Direction,
    pub native_type: ValueKind,
    pub wire_type: &'static str,
}

/// Handle returned by bridge registration
#[derive(Clone)]
pub struct BridgeHandle {
    descriptor: Arc<BridgeDescriptor>,
    store: NativeStore,
}

impl BridgeHandle {
    pub(crate) fn new(descriptor: Arc<BridgeDescriptor>, store: NativeStore) -> Self {
        Self { descriptor, store }
    }

    pub fn descriptor(&self) -> &BridgeDescriptor {
        &self.descriptor
    }

    pub fn channel(&self) -> &str {
        &self.descriptor.channel
    }

    pub fn direction(&self) -> Direction {
        self.descriptor.direction
    }

    /// Latest value seen on this bridge, in either direction
    pub async fn latest(&self) -> Option<NativeValue> {
        self.store
            .get(&self.descriptor.channel)
            .await
            .and_then(|entry| entry.value)
    }
}

impl fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Type-erased wire-to-native conversion
pub(crate) trait InboundHandler: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<NativeValue, CodecError>;
}

/// Type-erased native-to-wire conversion
pub(crate) trait OutboundHandler: Send + Sync {
    /// `None` when the value is not of the bridge's native type
    fn encode(&self, value: &NativeValue) -> Option<Vec<u8>>;
}

pub(crate) struct InboundBridge<N, W> {
    _types: PhantomData<fn(W) -> N>,
}

impl<N, W> InboundBridge<N, W> {
    pub(crate) fn new() -> Self {
        Self {
            _types: PhantomData,
        }
    }
}

impl<N, W> InboundHandler for InboundBridge<N, W>
where
    N: NativeType + From<W>,
    W: WireMessage,
{
    fn decode(&self, payload: &[u8]) -> Result<NativeValue, CodecError> {
        let wire = W::decode(payload)?;
        Ok(N::from(wire).into_value())
    }
}

pub(crate) struct OutboundBridge<N, W> {
    _types: PhantomData<fn(N) -> W>,
}

impl<N, W> OutboundBridge<N, W> {
    pub(crate) fn new() -> Self {
        Self {
            _types: PhantomData,
        }
    }
}

impl<N, W> OutboundHandler for OutboundBridge<N, W>
where
    N: NativeType,
    W: WireMessage + From<N>,
{
    fn encode(&self, value: &NativeValue) -> Option<Vec<u8>> {
        let native = N::from_value(value)?;
        Some(W::from(native).encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Bool, Float64, Int32, StringMessage};

    #[test]
    fn test_inbound_float64() {
        let bridge = InboundBridge::<f64, Float64>::new();
        let payload = Float64::from(-12.75).encode();
        assert_eq!(bridge.decode(&payload).unwrap(), NativeValue::F64(-12.75));
    }

    #[test]
    fn test_inbound_malformed_payload() {
        let bridge = InboundBridge::<f64, Float64>::new();
        assert!(matches!(
            bridge.decode(&[1, 2, 3]),
            Err(CodecError::Length { actual: 3, .. })
        ));
    }

    #[test]
    fn test_outbound_float64() {
        let bridge = OutboundBridge::<f64, Float64>::new();
        let payload = bridge.encode(&NativeValue::F64(0.5)).unwrap();
        assert_eq!(Float64::decode(&payload).unwrap().data, 0.5);
    }

    #[test]
    fn test_outbound_rejects_other_kinds() {
        let bridge = OutboundBridge::<i32, Int32>::new();
        assert!(bridge.encode(&NativeValue::F64(1.0)).is_none());
        assert!(bridge.encode(&NativeValue::I32(1)).is_some());
    }

    #[test]
    fn test_bool_and_string_pairs() {
        let bools = InboundBridge::<bool, Bool>::new();
        assert_eq!(bools.decode(&[1]).unwrap(), NativeValue::Bool(true));

        let strings = OutboundBridge::<String, StringMessage>::new();
        let payload = strings
            .encode(&NativeValue::String("run".to_string()))
            .unwrap();
        assert_eq!(StringMessage::decode(&payload).unwrap().data, "run");
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Inbound.to_string(), "inbound");
        assert_eq!(Direction::Outbound.as_str(), "outbound");
    }
}
