//! # uartmesh-core
//!
//! Common types and the cooperative event scheduler for the uartmesh
//! bridge.
//!
//! The bridge runs as a single logical thread of control: interrupt-style
//! sources (serial RX, timers, transport callbacks) post events onto one
//! run-to-completion queue, and entities handle them one at a time. No task
//! ever blocks; all waiting is expressed as posting a delayed event.
//!
//! This crate also defines the seams to the outside world: the
//! [`MeshTransport`] trait (the mesh network stack is a black box behind
//! it) and the [`Watchdog`] trait (the hardware watchdog the liveness
//! monitor feeds).

pub mod config;
pub mod event;
pub mod scheduler;
pub mod time;
pub mod transport;

pub use config::BridgeConfig;
pub use event::{
    EntityId, Event, EventId, EventPayload, MeshRxEvent, MeshSendCompleteEvent, SerialRxEvent,
    SerialTxEvent, SessionChangedEvent,
};
pub use scheduler::{Entity, Scheduler, SimContext, SimError};
pub use time::SimTime;
pub use transport::{
    MeshTransport, MessageTag, NodeId, SendStatus, SessionState, TransportError, Watchdog,
};
