//! # uartmesh-runner
//!
//! Host-side harness for the uartmesh bridge: a loopback mesh transport
//! that connects two bridges on one scheduler, a seeded traffic generator,
//! a thread-based watchdog supervisor standing in for the hardware
//! watchdog, and the `uartmesh` CLI binary.

pub mod config;
pub mod loopback;
pub mod sink;
pub mod supervisor;
pub mod traffic;

pub use config::{load_config, ConfigError, RunnerConfig};
pub use loopback::{Harness, LinkStats, LoopbackTransport};
pub use sink::SerialSink;
pub use supervisor::{HostWatchdog, SupervisorState, WatchdogSupervisor};
pub use traffic::{ramp_message, TrafficGenerator};
