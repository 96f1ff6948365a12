//! # uartmesh-bridge
//!
//! The bridge node: captures unframed serial byte streams, detects message
//! boundaries from line idle time, fragments completed messages for the
//! mesh transport, reassembles fragments arriving from the mesh, and keeps
//! the hardware watchdog fed while the mesh session is healthy.
//!
//! A [`BridgeNode`] is an [`Entity`](uartmesh_core::Entity) on the
//! cooperative scheduler. Serial bytes, timer expirations, and transport
//! callbacks all arrive as events; at most one serial-to-mesh transfer is
//! in flight at a time, enforced by the flow-control gate.

mod bridge;
mod intake;
mod liveness;
mod reassembly;

pub use bridge::{new_bridge, BridgeNode, BridgeStats, TransferState};
pub use intake::IntakeBuffer;
pub use liveness::LivenessMonitor;
pub use reassembly::Reassembler;
