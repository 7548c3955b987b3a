//! robin - PLC to pub/sub bridge library
//!
//! Binds typed native values on the PLC side to `std_msgs` messages on named
//! channels, carried over MQTT.

pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod node;
pub mod registrar;
pub mod transport;
pub mod value;

pub use error::BridgeError;
pub use node::{Direction, Node, NodeOptions, ShutdownToken};
pub use registrar::Registrar;
