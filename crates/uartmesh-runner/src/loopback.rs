//! Loopback mesh transport and test harness.
//!
//! Connects bridges on a single scheduler through an in-memory link that
//! stands in for the mesh network stack. Sends are queued synchronously;
//! the harness pump turns each queued frame into a delayed `MeshRx` event
//! at the destination and a `MeshSendComplete` event at the sender, the
//! same shape the real stack's callbacks would have.
//!
//! The link preserves send order, which is the ordering precondition the
//! fragment protocol relies on.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use tracing::{debug, warn};

use uartmesh_core::{
    Entity, EntityId, EventPayload, MeshRxEvent, MeshSendCompleteEvent, MeshTransport,
    MessageTag, NodeId, Scheduler, SendStatus, SerialRxEvent, SessionChangedEvent, SessionState,
    SimError, SimTime, TransportError,
};
use uartmesh_fragment::MAX_MESH_PAYLOAD;

/// One frame accepted by the loopback link, awaiting the pump.
#[derive(Debug, Clone)]
pub struct SentFrame {
    /// Sending node.
    pub source: NodeId,
    /// Addressed destination node.
    pub destination: NodeId,
    /// Endpoint the frame was sent on.
    pub endpoint: u8,
    /// Tag the sender attached.
    pub tag: MessageTag,
    /// Frame payload (flag byte + fragment data).
    pub payload: Vec<u8>,
}

type LinkQueue = Rc<RefCell<VecDeque<SentFrame>>>;

/// Link-level counters and a log of (tag, data length) per frame.
#[derive(Debug, Default, Clone)]
pub struct LinkStats {
    /// Frames accepted from senders.
    pub frames_sent: u64,
    /// Frames delivered to a destination.
    pub frames_delivered: u64,
    /// Frames dropped (scripted loss or unknown destination).
    pub frames_dropped: u64,
    /// Per-frame (tag, payload length) in send order.
    pub frame_log: Vec<(MessageTag, usize)>,
}

/// Sender-side handle onto the loopback link.
#[derive(Clone)]
pub struct LoopbackTransport {
    node: NodeId,
    queue: LinkQueue,
}

impl MeshTransport for LoopbackTransport {
    fn send(
        &mut self,
        destination: NodeId,
        endpoint: u8,
        tag: MessageTag,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if payload.len() > MAX_MESH_PAYLOAD {
            return Err(TransportError::PayloadTooLarge {
                max: MAX_MESH_PAYLOAD,
                actual: payload.len(),
            });
        }
        self.queue.borrow_mut().push_back(SentFrame {
            source: self.node,
            destination,
            endpoint,
            tag,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

/// Scheduler plus loopback link wiring.
pub struct Harness {
    /// The cooperative scheduler all entities run on.
    pub scheduler: Scheduler,
    queue: LinkQueue,
    nodes: HashMap<NodeId, EntityId>,
    delivery_latency: SimTime,
    complete_latency: SimTime,
    drop_frames: HashSet<u64>,
    frame_counter: u64,
    stats: LinkStats,
}

impl Harness {
    /// Create a harness. `delivery_latency` is the mesh transit time to
    /// the peer; `complete_latency` is how long the sender waits for its
    /// send-complete notification.
    pub fn new(delivery_latency: SimTime, complete_latency: SimTime) -> Self {
        Harness {
            scheduler: Scheduler::new(),
            queue: Rc::new(RefCell::new(VecDeque::new())),
            nodes: HashMap::new(),
            delivery_latency,
            complete_latency,
            drop_frames: HashSet::new(),
            frame_counter: 0,
            stats: LinkStats::default(),
        }
    }

    /// A transport handle for the given mesh address.
    pub fn transport(&self, node: NodeId) -> LoopbackTransport {
        LoopbackTransport {
            node,
            queue: Rc::clone(&self.queue),
        }
    }

    /// Map a mesh address to the entity that receives its traffic, and
    /// register the entity on the scheduler.
    pub fn attach(&mut self, node: NodeId, entity: Box<dyn Entity>) {
        self.nodes.insert(node, entity.entity_id());
        self.scheduler.register(entity);
    }

    /// Register an entity with no mesh address (e.g. a serial sink).
    pub fn register(&mut self, entity: Box<dyn Entity>) {
        self.scheduler.register(entity);
    }

    /// Drop the Nth frame (0-based, in link send order) instead of
    /// delivering it. The sender still receives its send-complete.
    pub fn drop_frame(&mut self, index: u64) {
        self.drop_frames.insert(index);
    }

    /// Link counters.
    pub fn link_stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Drive the given entities through `Joining` to `Joined` after
    /// `delay`.
    pub fn join(&mut self, delay: SimTime, targets: Vec<EntityId>) {
        for state in [SessionState::Joining, SessionState::Joined] {
            for &target in &targets {
                self.scheduler.post(
                    delay,
                    target,
                    vec![target],
                    EventPayload::MeshSessionChanged(SessionChangedEvent { state }),
                );
            }
        }
    }

    /// Notify the given entities that the session failed after `delay`.
    pub fn fail_session(&mut self, delay: SimTime, targets: Vec<EntityId>) {
        for &target in &targets {
            self.scheduler.post(
                delay,
                target,
                vec![target],
                EventPayload::MeshSessionChanged(SessionChangedEvent {
                    state: SessionState::Failed,
                }),
            );
        }
    }

    /// Inject serial bytes into a bridge, one byte per event, spaced by
    /// `gap` starting at `start` (absolute delays from now).
    pub fn inject_serial(&mut self, target: EntityId, start: SimTime, gap: SimTime, data: &[u8]) {
        let mut t = start;
        for &byte in data {
            self.scheduler.post(
                t,
                target,
                vec![target],
                EventPayload::SerialRx(SerialRxEvent { data: vec![byte] }),
            );
            t += gap;
        }
    }

    /// Turn frames queued on the link into scheduler events.
    fn pump(&mut self) {
        loop {
            let Some(frame) = self.queue.borrow_mut().pop_front() else {
                break;
            };
            let index = self.frame_counter;
            self.frame_counter += 1;
            self.stats.frames_sent += 1;
            self.stats
                .frame_log
                .push((frame.tag, frame.payload.len().saturating_sub(1)));

            // The sender learns the outcome regardless of delivery.
            if let Some(&sender) = self.nodes.get(&frame.source) {
                self.scheduler.post(
                    self.complete_latency,
                    sender,
                    vec![sender],
                    EventPayload::MeshSendComplete(MeshSendCompleteEvent {
                        tag: frame.tag,
                        status: SendStatus::Success,
                    }),
                );
            }

            if self.drop_frames.contains(&index) {
                debug!(index, "loopback dropping frame (scripted loss)");
                self.stats.frames_dropped += 1;
                continue;
            }
            match self.nodes.get(&frame.destination) {
                Some(&receiver) => {
                    self.stats.frames_delivered += 1;
                    self.scheduler.post(
                        self.delivery_latency,
                        receiver,
                        vec![receiver],
                        EventPayload::MeshRx(MeshRxEvent {
                            endpoint: frame.endpoint,
                            payload: frame.payload,
                        }),
                    );
                }
                None => {
                    warn!(destination = %frame.destination, "frame to unknown node dropped");
                    self.stats.frames_dropped += 1;
                }
            }
        }
    }

    /// Run until no events remain anywhere (queue and link both drained).
    ///
    /// A joined bridge reschedules its watchdog feed forever, so this only
    /// returns before any join; otherwise use [`run_until`].
    ///
    /// [`run_until`]: Harness::run_until
    pub fn run_until_idle(&mut self) -> Result<u64, SimError> {
        let mut dispatched = 0;
        loop {
            let stepped = self.scheduler.step()?;
            // Pumping can post fresh scheduler events for frames that were
            // queued while the scheduler was idle; only stop once both
            // sides are drained.
            self.pump();
            if stepped {
                dispatched += 1;
            } else if self.scheduler.pending() == 0 && self.queue.borrow().is_empty() {
                break;
            }
        }
        Ok(dispatched)
    }

    /// Run until the next event lies beyond `deadline`.
    pub fn run_until(&mut self, deadline: SimTime) -> Result<u64, SimError> {
        let mut dispatched = 0;
        loop {
            match self.scheduler.next_event_time() {
                Some(t) if t <= deadline => {
                    self.scheduler.step()?;
                    self.pump();
                    dispatched += 1;
                }
                _ => break,
            }
        }
        Ok(dispatched)
    }
}
