//! Bridge registration and process orchestration

use anyhow::{Context, Result};
use futures_util::future;
use std::net::SocketAddr;
use tracing::info;

use crate::api::{self, ApiState};
use crate::codec::{Bool, Float32, Float64, Int32, Int64, StringMessage};
use crate::config::{BridgeConfig, Config, ServerConfig};
use crate::error::BridgeError;
use crate::metrics;
use crate::node::{BridgeHandle, Direction, Node, NodeOptions, ShutdownToken};
use crate::transport;
use crate::value::ValueKind;

/// Register one configured bridge, picking the wire type for its native type
pub async fn register_bridge(
    node: &mut Node,
    bridge: &BridgeConfig,
) -> Result<BridgeHandle, BridgeError> {
    let name = bridge.name.as_str();
    match bridge.direction {
        Direction::Inbound => match bridge.kind {
            ValueKind::F64 => node.register_inbound::<f64, Float64>(name).await,
            ValueKind::F32 => node.register_inbound::<f32, Float32>(name).await,
            ValueKind::I32 => node.register_inbound::<i32, Int32>(name).await,
            ValueKind::I64 => node.register_inbound::<i64, Int64>(name).await,
            ValueKind::Bool => node.register_inbound::<bool, Bool>(name).await,
            ValueKind::String => node.register_inbound::<String, StringMessage>(name).await,
        },
        Direction::Outbound => match bridge.kind {
            ValueKind::F64 => node.register_outbound::<f64, Float64>(name).await,
            ValueKind::F32 => node.register_outbound::<f32, Float32>(name).await,
            ValueKind::I32 => node.register_outbound::<i32, Int32>(name).await,
            ValueKind::I64 => node.register_outbound::<i64, Int64>(name).await,
            ValueKind::Bool => node.register_outbound::<bool, Bool>(name).await,
            ValueKind::String => node.register_outbound::<String, StringMessage>(name).await,
        },
    }
}

/// Register every configured bridge in order, stopping at the first failure
pub async fn register_bridges(
    node: &mut Node,
    bridges: &[BridgeConfig],
) -> Result<Vec<BridgeHandle>, BridgeError> {
    let mut handles = Vec::with_capacity(bridges.len());
    for bridge in bridges {
        handles.push(register_bridge(node, bridge).await?);
    }
    Ok(handles)
}

/// The robin process: node, bridges and HTTP API
pub struct Registrar {
    config: Config,
    options: NodeOptions,
}

impl Registrar {
    /// `args` is the full argument vector, program name first
    pub fn new<I, S>(config: Config, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let options = NodeOptions::new(&config.node.name)
            .with_namespace(&config.node.namespace)
            .apply_args(args);

        Self { config, options }
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    /// Register the bridges and spin until `shutdown` is cancelled
    pub async fn run(self, shutdown: ShutdownToken) -> Result<()> {
        let (transport, incoming) = transport::connect(&self.config)
            .await
            .context("Failed to create transport")?;

        let mut node = Node::new(self.options, transport, incoming);
        let handles = register_bridges(&mut node, &self.config.bridges)
            .await
            .context("Failed to register bridges")?;
        info!("{} bridges registered", handles.len());

        let server = self.config.server;
        let mut api_state =
            ApiState::new(node.store(), node.writer(), node.name()).with_auth(server.auth.clone());
        if server.enabled && server.metrics_enabled {
            api_state = api_state.with_metrics(metrics::init_metrics()?);
            info!("Prometheus metrics enabled at /metrics");
        }
        let api_server = serve_api(server, api_state, shutdown.clone());

        let spin = async {
            let result = node.spin(shutdown.clone()).await;
            // Take the API down with the node
            shutdown.cancel();
            result.context("Dispatch loop failed")
        };

        future::try_join(spin, api_server).await?;
        info!("Shutdown complete");
        Ok(())
    }
}

/// Serve the HTTP API until `shutdown` is cancelled
async fn serve_api(server: ServerConfig, state: ApiState, shutdown: ShutdownToken) -> Result<()> {
    if !server.enabled {
        info!("HTTP API disabled");
        return Ok(());
    }

    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .with_context(|| format!("Invalid API address {}:{}", server.host, server.port))?;

    info!("Starting API server on http://{}", addr);
    info!("  - Health check: http://{}/health", addr);
    info!("  - Bridges:      http://{}/api/bridges", addr);
    if server.metrics_enabled {
        info!("  - Metrics:      http://{}/metrics", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, api::create_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("API server failed")
}
