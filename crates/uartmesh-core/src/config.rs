//! Bridge configuration.

use serde::{Deserialize, Serialize};

use crate::time::SimTime;
use crate::transport::NodeId;

/// Compile-time defaults, overridable via config file.
pub mod defaults {
    /// Intake buffer capacity in bytes.
    pub const INTAKE_CAPACITY: usize = 512;
    /// Data bytes per fragment.
    pub const FRAGMENT_CAPACITY: usize = 94;
    /// Serial idle timeout in microseconds.
    pub const IDLE_TIMEOUT_US: u64 = 500;
    /// Watchdog feed period in milliseconds.
    pub const WATCHDOG_FEED_PERIOD_MS: u64 = 2_000;
    /// Watchdog expiry period in milliseconds.
    pub const WATCHDOG_EXPIRY_MS: u64 = 3_000;
    /// Default data endpoint on the mesh transport.
    pub const DATA_ENDPOINT: u8 = 1;
}

/// Configuration for one bridge node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bridge name, used in logs.
    pub name: String,
    /// Mesh address the bridge sends fragments to.
    pub destination: NodeId,
    /// Endpoint fragments are sent and received on.
    pub data_endpoint: u8,
    /// Intake buffer capacity; serial bytes past this are dropped.
    pub intake_capacity: usize,
    /// Data bytes per fragment (mesh max payload minus the flag byte).
    pub fragment_capacity: usize,
    /// Inter-byte silence that ends a serial message.
    pub idle_timeout: SimTime,
    /// How often the liveness monitor feeds the watchdog once joined.
    pub watchdog_feed_period: SimTime,
    /// Watchdog expiry period, used by the host supervisor.
    pub watchdog_expiry: SimTime,
    /// If set, a completed message is sent only when its first byte
    /// matches; otherwise it is discarded and intake resumes immediately.
    pub destination_filter: Option<u8>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            name: "bridge".to_string(),
            destination: NodeId::new(0x0001),
            data_endpoint: defaults::DATA_ENDPOINT,
            intake_capacity: defaults::INTAKE_CAPACITY,
            fragment_capacity: defaults::FRAGMENT_CAPACITY,
            idle_timeout: SimTime::from_micros(defaults::IDLE_TIMEOUT_US),
            watchdog_feed_period: SimTime::from_millis(defaults::WATCHDOG_FEED_PERIOD_MS),
            watchdog_expiry: SimTime::from_millis(defaults::WATCHDOG_EXPIRY_MS),
            destination_filter: None,
        }
    }
}
