//! Errors raised by bridge registration and dispatch

use crate::codec::CodecError;
use crate::node::Direction;
use crate::transport::TransportError;
use crate::value::ValueKind;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("channel {channel} already has an {existing} bridge")]
    ChannelInUse { channel: String, existing: Direction },
    #[error("bridge {0} resolves to an empty channel name")]
    EmptyChannel(String),
    #[error("no bridge registered on channel {0}")]
    UnknownChannel(String),
    #[error("channel {channel} is {actual}, not {expected}")]
    WrongDirection {
        channel: String,
        expected: Direction,
        actual: Direction,
    },
    #[error("channel {channel} carries {expected} values, got {found}")]
    TypeMismatch {
        channel: String,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("node is not running")]
    NodeStopped,
}
