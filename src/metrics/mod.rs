//! Prometheus metrics for robin
//!
//! Exposes metrics at /metrics endpoint in Prometheus format:
//! - Messages handled per channel, direction and status
//! - Handling latency histograms
//! - Latest numeric value per channel
//! - Registered bridge count, node and MQTT connection status

use anyhow::{Context, Result};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;
use tracing::info;

use crate::node::Direction;

/// Install the Prometheus recorder
/// Returns a handle to render metrics
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Prometheus metrics initialized");
    Ok(handle)
}

/// Times one message passing through a bridge
pub struct MessageMetrics {
    start: Instant,
    channel: String,
    direction: &'static str,
}

impl MessageMetrics {
    pub fn start(channel: &str, direction: Direction) -> Self {
        Self {
            start: Instant::now(),
            channel: channel.to_string(),
            direction: direction.as_str(),
        }
    }

    /// Record a converted message; numeric values also update the value gauge
    pub fn success(self, value: Option<f64>) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            "robin_messages_total",
            "channel" => self.channel.clone(),
            "direction" => self.direction,
            "status" => "success"
        )
        .increment(1);

        histogram!(
            "robin_message_duration_seconds",
            "channel" => self.channel.clone(),
            "direction" => self.direction
        )
        .record(duration);

        if let Some(value) = value {
            gauge!("robin_bridge_value", "channel" => self.channel).set(value);
        }
    }

    pub fn failure(self, error_type: &str) {
        counter!(
            "robin_messages_total",
            "channel" => self.channel.clone(),
            "direction" => self.direction,
            "status" => "error"
        )
        .increment(1);

        counter!(
            "robin_errors_total",
            "channel" => self.channel,
            "type" => error_type.to_string()
        )
        .increment(1);
    }
}

/// A received message discarded before it reached the node
pub fn record_dropped_message(channel: &str) {
    counter!(
        "robin_errors_total",
        "channel" => channel.to_string(),
        "type" => "queue_full"
    )
    .increment(1);
}

pub fn record_registered_bridges(count: usize) {
    gauge!("robin_registered_bridges").set(count as f64);
}

pub fn record_node_running(running: bool) {
    gauge!("robin_node_running").set(if running { 1.0 } else { 0.0 });
}

pub fn record_mqtt_connection(connected: bool) {
    gauge!("robin_mqtt_connected").set(if connected { 1.0 } else { 0.0 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_metrics_success() {
        let _ = PrometheusBuilder::new().install_recorder();

        MessageMetrics::start("double_to_codesys", Direction::Inbound).success(Some(1.5));
        MessageMetrics::start("status_text", Direction::Outbound).success(None);
        // No panic = success
    }

    #[test]
    fn test_message_metrics_failure() {
        let _ = PrometheusBuilder::new().install_recorder();

        MessageMetrics::start("double_to_codesys", Direction::Inbound).failure("decode");
        // No panic = success
    }

    #[test]
    fn test_gauges() {
        let _ = PrometheusBuilder::new().install_recorder();

        record_registered_bridges(2);
        record_node_running(true);
        record_mqtt_connection(false);
        record_dropped_message("double_to_codesys");
        // No panic = success
    }
}
