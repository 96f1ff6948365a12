//! Seams to the outside world: the mesh transport and the hardware
//! watchdog.
//!
//! The mesh network stack (join/commissioning, addressing, acknowledgment,
//! link security) is deliberately opaque. The bridge only needs an
//! addressed best-effort send plus three asynchronous notifications, which
//! arrive as scheduler events: fragment delivery, send completion, and
//! session state changes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address of a node on the mesh network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u16);

impl NodeId {
    /// Create a node ID.
    pub const fn new(id: u16) -> Self {
        NodeId(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Per-send tag carried through to the send-complete notification.
///
/// `Final` marks the fragment that terminates a transfer; its completion is
/// what releases the flow-control gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageTag {
    /// More fragments of this transfer follow.
    More,
    /// This send carries the final fragment of a transfer.
    Final,
}

impl MessageTag {
    /// Wire/bookkeeping byte for this tag.
    pub fn as_byte(&self) -> u8 {
        match self {
            MessageTag::More => 0,
            MessageTag::Final => 1,
        }
    }
}

/// Outcome reported by the transport's send-complete notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SendStatus {
    /// The transport processed the send (acknowledged where applicable).
    Success,
    /// The transport reported a failure with its own status code.
    Failure(u8),
}

impl SendStatus {
    /// Whether the send succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, SendStatus::Success)
    }
}

/// State of the mesh session, driven by the transport's asynchronous
/// status notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Not commissioned onto the network.
    Unjoined,
    /// Commissioning in progress.
    Joining,
    /// Joined and able to carry traffic.
    Joined,
    /// Commissioning or the session itself failed.
    Failed,
}

/// Errors returned synchronously by [`MeshTransport::send`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The session is not in the `Joined` state.
    #[error("mesh session not joined")]
    NotJoined,

    /// The payload exceeds the transport's maximum.
    #[error("payload too large: maximum {max} bytes, got {actual}")]
    PayloadTooLarge {
        /// Maximum payload the transport accepts.
        max: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// The transport rejected the send with its own status code.
    #[error("transport rejected send: status 0x{0:02X}")]
    Rejected(u8),
}

/// Addressed best-effort send into the mesh network.
///
/// Ordering precondition: the protocol carries no sequence numbers, so an
/// implementation must deliver the fragments of a single burst in send
/// order (or be effectively synchronous from the sender's perspective).
/// The flow-control gate guarantees at most one transfer is in flight.
pub trait MeshTransport {
    /// Submit one fragment payload for delivery to `destination`.
    ///
    /// A `Ok(())` means the send was accepted for processing; the eventual
    /// outcome arrives later as a `MeshSendComplete` event carrying `tag`.
    fn send(
        &mut self,
        destination: NodeId,
        endpoint: u8,
        tag: MessageTag,
        payload: &[u8],
    ) -> Result<(), TransportError>;
}

/// The hardware watchdog the liveness monitor feeds.
///
/// Feeding resets the expiry countdown. If the monitor never runs (the
/// session never joins), the watchdog expires and resets the device.
pub trait Watchdog {
    /// Reset the watchdog expiry countdown.
    fn feed(&mut self);
}
