//! Serial egress sink.
//!
//! Receives assembled messages from a bridge and logs them, standing in
//! for the serial TX line the real device echoes onto. Keeps a shared
//! record so the harness (and tests) can inspect what came out.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use uartmesh_core::{Entity, EntityId, Event, EventPayload, SimContext, SimError};

/// Entity that collects assembled messages emitted by a bridge.
pub struct SerialSink {
    id: EntityId,
    name: String,
    received: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl SerialSink {
    /// Create a sink and a shared handle to the messages it receives.
    pub fn new(id: EntityId, name: impl Into<String>) -> (Self, Rc<RefCell<Vec<Vec<u8>>>>) {
        let received = Rc::new(RefCell::new(Vec::new()));
        (
            SerialSink {
                id,
                name: name.into(),
                received: Rc::clone(&received),
            },
            received,
        )
    }
}

impl Entity for SerialSink {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn handle_event(&mut self, event: &Event, _ctx: &mut SimContext) -> Result<(), SimError> {
        if let EventPayload::SerialTx(tx) = &event.payload {
            info!(
                sink = %self.name,
                len = tx.data.len(),
                "serial out: {}",
                hex::encode(&tx.data)
            );
            self.received.borrow_mut().push(tx.data.clone());
        }
        Ok(())
    }
}
