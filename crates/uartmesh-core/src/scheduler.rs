//! Cooperative run-to-completion event scheduler.
//!
//! One logical thread of control: events are delivered strictly in time
//! order (ties broken by post order), each handler runs to completion
//! before the next event is considered, and handlers never block. This is
//! what makes buffer accesses from task context mutually exclusive without
//! locks; the cost is that interrupt-to-task latency is bounded by the
//! longest handler.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use thiserror::Error;
use tracing::{trace, warn};

use crate::event::{EntityId, Event, EventId, EventPayload};
use crate::time::SimTime;

/// Errors surfaced by the scheduler or by entity handlers.
#[derive(Error, Debug)]
pub enum SimError {
    /// An event targeted an entity that was never registered.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// An entity handler failed.
    #[error("entity error: {0}")]
    Entity(String),
}

/// A participant on the scheduler.
///
/// Entities receive events addressed to them and react by mutating their
/// own state and posting further events through the [`SimContext`].
pub trait Entity {
    /// This entity's ID.
    fn entity_id(&self) -> EntityId;

    /// Handle one event, running to completion.
    fn handle_event(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError>;
}

/// An event posted by an entity, not yet queued.
#[derive(Debug)]
pub struct PostedEvent {
    /// Delay relative to the posting entity's current time.
    pub delay: SimTime,
    /// Target entities.
    pub targets: Vec<EntityId>,
    /// Event payload.
    pub payload: EventPayload,
}

/// Handler-side view of the scheduler: current time plus an outbox.
///
/// Posted events are collected while the handler runs and merged into the
/// queue when it returns, so a handler never observes its own posts.
pub struct SimContext {
    now: SimTime,
    posted: Vec<PostedEvent>,
}

impl SimContext {
    /// Create a context at the given time. Exposed so unit tests can drive
    /// an entity without a full scheduler.
    pub fn new(now: SimTime) -> Self {
        SimContext {
            now,
            posted: Vec::new(),
        }
    }

    /// Current simulation time.
    pub fn time(&self) -> SimTime {
        self.now
    }

    /// Post an event to be delivered after `delay`.
    pub fn post_event(&mut self, delay: SimTime, targets: Vec<EntityId>, payload: EventPayload) {
        self.posted.push(PostedEvent {
            delay,
            targets,
            payload,
        });
    }

    /// Post an event for delivery at the current time, after the running
    /// handler returns.
    pub fn post_immediate(&mut self, targets: Vec<EntityId>, payload: EventPayload) {
        self.post_event(SimTime::ZERO, targets, payload);
    }

    /// Take the events posted so far.
    pub fn take_posted(&mut self) -> Vec<PostedEvent> {
        std::mem::take(&mut self.posted)
    }
}

/// Queue entry: delivery time plus a monotonic sequence number so equal
/// times dispatch in post order.
struct QueuedEvent {
    seq: u64,
    event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.event.time == other.event.time && self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest event.
        (other.event.time, other.seq).cmp(&(self.event.time, self.seq))
    }
}

/// Single-threaded cooperative event scheduler.
pub struct Scheduler {
    time: SimTime,
    next_event_id: u64,
    next_seq: u64,
    queue: BinaryHeap<QueuedEvent>,
    entities: HashMap<EntityId, Box<dyn Entity>>,
}

impl Scheduler {
    /// Create an empty scheduler at time zero.
    pub fn new() -> Self {
        Scheduler {
            time: SimTime::ZERO,
            next_event_id: 0,
            next_seq: 0,
            queue: BinaryHeap::new(),
            entities: HashMap::new(),
        }
    }

    /// Register an entity.
    pub fn register(&mut self, entity: Box<dyn Entity>) {
        let id = entity.entity_id();
        if self.entities.insert(id, entity).is_some() {
            warn!("entity {} registered twice, previous instance replaced", id);
        }
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.time
    }

    /// Number of events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Delivery time of the next queued event, if any.
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|q| q.event.time)
    }

    /// Post an event from outside any handler (the "interrupt" path).
    pub fn post(
        &mut self,
        delay: SimTime,
        source: EntityId,
        targets: Vec<EntityId>,
        payload: EventPayload,
    ) -> EventId {
        let id = EventId(self.next_event_id);
        self.next_event_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        let time = self.time + delay;
        self.queue.push(QueuedEvent {
            seq,
            event: Event {
                id,
                time,
                source,
                targets,
                payload,
            },
        });
        id
    }

    /// Dispatch the next event, advancing time to its delivery time.
    ///
    /// Returns `Ok(false)` when the queue is empty.
    pub fn step(&mut self) -> Result<bool, SimError> {
        let Some(queued) = self.queue.pop() else {
            return Ok(false);
        };
        let event = queued.event;
        debug_assert!(event.time >= self.time);
        self.time = event.time;

        trace!(
            time = %self.time,
            source = %event.source,
            "dispatch {:?}",
            std::mem::discriminant(&event.payload)
        );

        for target in event.targets.clone() {
            // Take the entity out so it can borrow the scheduler-owned
            // context without aliasing.
            let Some(mut entity) = self.entities.remove(&target) else {
                warn!("event {:?} targets unknown entity {}", event.id, target);
                continue;
            };
            let mut ctx = SimContext::new(self.time);
            let result = entity.handle_event(&event, &mut ctx);
            let posted = ctx.take_posted();
            self.entities.insert(target, entity);
            for p in posted {
                self.post(p.delay, target, p.targets, p.payload);
            }
            result?;
        }
        Ok(true)
    }

    /// Run until no events remain. Returns the number of events dispatched.
    pub fn run_until_idle(&mut self) -> Result<u64, SimError> {
        let mut dispatched = 0;
        while self.step()? {
            dispatched += 1;
        }
        Ok(dispatched)
    }

    /// Run until the queue is empty or the next event lies beyond
    /// `deadline`. Time never advances past events actually dispatched.
    pub fn run_until(&mut self, deadline: SimTime) -> Result<u64, SimError> {
        let mut dispatched = 0;
        while let Some(next) = self.queue.peek() {
            if next.event.time > deadline {
                break;
            }
            self.step()?;
            dispatched += 1;
        }
        Ok(dispatched)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
