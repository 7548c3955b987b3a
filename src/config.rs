//! Configuration management for robin
//!
//! Layers, lowest priority first: built-in defaults, the YAML file named by
//! `ROBIN_CONFIG` (default `config.yaml`), then `ROBIN__SECTION__KEY`
//! environment variables.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::node::Direction;
use crate::value::ValueKind;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node identity
    pub node: NodeConfig,
    /// Which transport carries the channels
    pub transport: TransportConfig,
    /// MQTT broker configuration
    pub mqtt: MqttConfig,
    /// HTTP API configuration
    pub server: ServerConfig,
    /// Bridges registered at startup
    pub bridges: Vec<BridgeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name, overridden by `__name:=`
    pub name: String,
    /// Namespace for relative channel names, overridden by `__ns:=`
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Mqtt,
    Loopback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker host
    pub host: String,
    /// MQTT broker port
    pub port: u16,
    /// Client ID
    pub client_id: String,
    /// Topic prefix
    pub topic_prefix: String,
    /// QoS level (0, 1, or 2)
    pub qos: u8,
    /// Username (optional)
    pub username: Option<String>,
    /// Password (optional)
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Serve the HTTP API
    pub enabled: bool,
    /// HTTP API host
    pub host: String,
    /// HTTP API port
    pub port: u16,
    /// Enable metrics endpoint
    pub metrics_enabled: bool,
    /// API key authentication
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// Accepted `X-API-Key` values
    pub api_keys: Vec<String>,
    /// Paths served without a key; a trailing `*` matches a prefix
    pub exclude_paths: Vec<String>,
}

/// One bridge to register at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Channel name before namespace resolution
    pub name: String,
    pub direction: Direction,
    /// Native type; selects the matching `std_msgs` wire type
    #[serde(rename = "type")]
    pub kind: ValueKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            transport: TransportConfig::default(),
            mqtt: MqttConfig::default(),
            server: ServerConfig::default(),
            bridges: default_bridges(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "robin".to_string(),
            namespace: String::new(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Mqtt,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "robin".to_string(),
            topic_prefix: "robin".to_string(),
            qos: 1,
            username: None,
            password: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 3000,
            metrics_enabled: true,
            auth: AuthConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_keys: vec![],
            exclude_paths: vec!["/health".to_string(), "/metrics".to_string()],
        }
    }
}

/// The two bridges of the stock deployment
pub fn default_bridges() -> Vec<BridgeConfig> {
    vec![
        BridgeConfig {
            name: "double_to_codesys".to_string(),
            direction: Direction::Inbound,
            kind: ValueKind::F64,
        },
        BridgeConfig {
            name: "double_to_ros".to_string(),
            direction: Direction::Outbound,
            kind: ValueKind::F64,
        },
    ]
}

impl Config {
    /// Reject configurations the node could never start with
    pub fn validate(&self) -> Result<()> {
        if self.bridges.is_empty() {
            bail!("No bridges configured");
        }

        let mut seen = HashSet::new();
        for bridge in &self.bridges {
            if bridge.name.trim_matches('/').is_empty() {
                bail!("Bridge with empty name");
            }
            if !seen.insert(bridge.name.as_str()) {
                bail!("Bridge '{}' configured more than once", bridge.name);
            }
        }

        if self.server.auth.enabled && self.server.auth.api_keys.is_empty() {
            bail!("API key authentication enabled without any keys");
        }

        Ok(())
    }
}

/// Load configuration from file, environment and defaults
pub fn load_config() -> Result<Config> {
    let config_path = std::env::var("ROBIN_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    load_config_from(Path::new(&config_path))
}

/// Load configuration using `path` as the file layer
pub fn load_config_from(path: &Path) -> Result<Config> {
    let mut builder = config::Config::builder();

    if path.exists() {
        builder = builder.add_source(config::File::from(path).format(config::FileFormat::Yaml));
    } else {
        tracing::warn!("Config file {} not found, using defaults", path.display());
    }

    let settings = builder
        .add_source(config::Environment::with_prefix("ROBIN").separator("__"))
        .build()
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = settings
        .try_deserialize()
        .with_context(|| "Failed to parse config file")?;

    config.validate()?;
    Ok(config)
}

/// Load configuration from a YAML string (used in tests)
#[cfg(test)]
pub fn load_config_from_str(yaml: &str) -> Result<Config> {
    serde_yaml::from_str(yaml).with_context(|| "Failed to parse config")
}
