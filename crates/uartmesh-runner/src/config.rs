//! Runner configuration: two bridge configs plus link parameters, loaded
//! from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use uartmesh_core::{BridgeConfig, NodeId, SimTime};

/// Errors loading a runner config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid YAML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Full runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// The serial-side bridge (traffic is injected here).
    pub bridge_a: BridgeConfig,
    /// The peer bridge (assembled messages come out here).
    pub bridge_b: BridgeConfig,
    /// One-way mesh transit latency.
    pub link_latency: SimTime,
    /// Delay before a sender sees its send-complete notification.
    pub complete_latency: SimTime,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let bridge_a = BridgeConfig {
            name: "bridge-a".to_string(),
            destination: NodeId::new(0x0002),
            ..BridgeConfig::default()
        };
        let bridge_b = BridgeConfig {
            name: "bridge-b".to_string(),
            destination: NodeId::new(0x0001),
            ..BridgeConfig::default()
        };
        RunnerConfig {
            bridge_a,
            bridge_b,
            link_latency: SimTime::from_millis(3),
            complete_latency: SimTime::from_millis(5),
        }
    }
}

/// Load a runner config from a YAML file.
pub fn load_config(path: &Path) -> Result<RunnerConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let config = serde_yaml::from_str(&text)?;
    Ok(config)
}
