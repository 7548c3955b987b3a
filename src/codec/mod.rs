//! Wire message types and their binary encoding
//!
//! Messages are serialized the way ROS1 serializes `std_msgs`: fixed-width
//! little-endian scalars, one byte for booleans and a `u32` length prefix for
//! strings. Every scalar encoding is lossless.

pub mod std_msgs;

pub use std_msgs::{Bool, Float32, Float64, Int32, Int64, StringMessage};

/// Error raised when a payload cannot be decoded into a wire message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("{type_name}: expected {expected} bytes, got {actual}")]
    Length {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("std_msgs/Bool: invalid boolean byte {0:#04x}")]
    InvalidBool(u8),
    #[error("std_msgs/String: payload is not valid UTF-8")]
    Utf8,
}

/// A message type carried on a channel
pub trait WireMessage: Sized + Send + 'static {
    /// Fully qualified message type name, e.g. `std_msgs/Float64`
    const TYPE_NAME: &'static str;

    fn encode(&self) -> Vec<u8>;

    fn decode(payload: &[u8]) -> Result<Self, CodecError>;
}

/// Copy a fixed-size payload into an array, checking its length
pub(crate) fn fixed<const N: usize>(
    type_name: &'static str,
    payload: &[u8],
) -> Result<[u8; N], CodecError> {
    payload.try_into().map_err(|_| CodecError::Length {
        type_name,
        expected: N,
        actual: payload.len(),
    })
}
