//! Events carried by the cooperative scheduler.
//!
//! Everything that would be an interrupt or stack callback on hardware is
//! expressed as an event payload: serial bytes, the idle timer, fragment
//! deliveries, send completions, and session state changes.

use crate::time::SimTime;
use crate::transport::{MessageTag, SendStatus, SessionState};
use serde::{Deserialize, Serialize};

/// Identifier of an entity registered on the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Create an entity ID.
    pub const fn new(id: u64) -> Self {
        EntityId(id)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Unique identifier of a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u64);

/// Serial bytes arriving from the local peripheral (RX interrupt).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialRxEvent {
    /// Raw bytes, processed one at a time in arrival order.
    pub data: Vec<u8>,
}

/// Bytes emitted toward the serial sink (assembled message echo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialTxEvent {
    /// Bytes in exactly the order they were assembled.
    pub data: Vec<u8>,
}

/// One fragment delivered by the mesh transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshRxEvent {
    /// Endpoint the fragment arrived on.
    pub endpoint: u8,
    /// Fragment wire bytes (flag byte + data).
    pub payload: Vec<u8>,
}

/// Send-completion notification from the mesh transport.
///
/// Reports the outcome of a previously accepted send; `tag` identifies
/// whether it carried the final fragment of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshSendCompleteEvent {
    /// Tag the send was submitted with.
    pub tag: MessageTag,
    /// Delivery outcome.
    pub status: SendStatus,
}

/// Session state change notification from the mesh transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionChangedEvent {
    /// New session state.
    pub state: SessionState,
}

/// Payload of a scheduled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// Serial bytes from the peripheral.
    SerialRx(SerialRxEvent),
    /// Bytes toward the serial sink.
    SerialTx(SerialTxEvent),
    /// A one-shot timer fired.
    Timer {
        /// Which logical timer fired.
        timer_id: u64,
    },
    /// Fragment delivery from the mesh.
    MeshRx(MeshRxEvent),
    /// Send-completion from the mesh.
    MeshSendComplete(MeshSendCompleteEvent),
    /// Mesh session state change.
    MeshSessionChanged(SessionChangedEvent),
}

/// A scheduled event: payload plus delivery time and addressing.
#[derive(Debug, Clone)]
pub struct Event {
    /// Unique event ID.
    pub id: EventId,
    /// Simulation time at which the event is delivered.
    pub time: SimTime,
    /// Entity that posted the event (the poster itself for timers).
    pub source: EntityId,
    /// Entities the event is delivered to.
    pub targets: Vec<EntityId>,
    /// What happened.
    pub payload: EventPayload,
}
