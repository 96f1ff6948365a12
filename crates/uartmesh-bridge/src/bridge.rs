//! The bridge node entity.
//!
//! Ties the pieces together: serial intake + idle-boundary detection, the
//! flow-control gate, the fragmentation transmitter, the reassembly
//! receiver, and the liveness monitor, all running as one entity on the
//! cooperative scheduler.

use metrics::counter;
use tracing::{debug, error, info, trace, warn};

use uartmesh_core::{
    BridgeConfig, Entity, EntityId, Event, EventPayload, MeshRxEvent, MeshSendCompleteEvent,
    MeshTransport, MessageTag, SerialTxEvent, SessionChangedEvent, SessionState, SimContext,
    SimError, SimTime, Watchdog,
};
use uartmesh_fragment::{split_message, Fragment};

use crate::intake::IntakeBuffer;
use crate::liveness::LivenessMonitor;
use crate::reassembly::Reassembler;

// ============================================================================
// Transfer State
// ============================================================================

/// State of the serial-to-mesh transmit path.
///
/// `Idle → BoundaryPending → Sending → Idle` is the only legal cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// No serial bytes buffered, intake armed.
    Idle,
    /// Bytes accumulating, idle timer armed.
    BoundaryPending,
    /// Fragmentation in progress, intake suspended.
    Sending,
}

// ============================================================================
// Timer IDs
// ============================================================================

/// Serial idle timeout expired.
const TIMER_IDLE: u64 = 0;
/// Deferred fragmentation task.
const TIMER_TRANSMIT: u64 = 1;
/// Periodic watchdog feed.
const TIMER_WATCHDOG: u64 = 2;

// ============================================================================
// Stats
// ============================================================================

/// Per-bridge counters. Never surfaced as errors; diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Serial bytes accepted into the intake buffer path.
    pub bytes_received: u64,
    /// Serial bytes discarded while intake was suspended.
    pub bytes_dropped_gated: u64,
    /// Messages completed by the boundary detector.
    pub messages_framed: u64,
    /// Messages rejected by the destination filter.
    pub messages_filtered: u64,
    /// Messages discarded because the session was not joined.
    pub messages_dropped_unjoined: u64,
    /// Fragments accepted by the transport.
    pub fragments_sent: u64,
    /// Sends the transport rejected synchronously.
    pub send_failures: u64,
    /// Send-complete notifications reporting failure.
    pub delivery_failures: u64,
    /// Messages fully reassembled from the mesh.
    pub messages_assembled: u64,
}

// ============================================================================
// Bridge Entity
// ============================================================================

/// A serial-to-mesh bridge node.
///
/// Owns the intake buffer exclusively: the "interrupt" side (serial RX
/// events) fills it, the deferred transmit task drains it, and the
/// flow-control gate keeps the two phases mutually exclusive.
pub struct BridgeNode<T: MeshTransport, W: Watchdog> {
    id: EntityId,
    config: BridgeConfig,
    /// Entity assembled messages are echoed to, if any.
    serial_sink: Option<EntityId>,

    transport: T,
    watchdog: W,

    // Transmit path
    transfer: TransferState,
    intake: IntakeBuffer,
    last_byte_at: SimTime,
    intake_enabled: bool,

    // Receive path
    reassembler: Reassembler,

    // Session / liveness
    session: SessionState,
    liveness: LivenessMonitor,

    stats: BridgeStats,
}

impl<T: MeshTransport, W: Watchdog> BridgeNode<T, W> {
    /// Create a bridge node.
    pub fn new(
        id: EntityId,
        config: BridgeConfig,
        serial_sink: Option<EntityId>,
        transport: T,
        watchdog: W,
    ) -> Self {
        let intake = IntakeBuffer::new(config.intake_capacity);
        let reassembler = Reassembler::new(config.intake_capacity, config.fragment_capacity);
        let liveness = LivenessMonitor::new(config.watchdog_feed_period);
        BridgeNode {
            id,
            config,
            serial_sink,
            transport,
            watchdog,
            transfer: TransferState::Idle,
            intake,
            last_byte_at: SimTime::ZERO,
            intake_enabled: true,
            reassembler,
            session: SessionState::Unjoined,
            liveness,
            stats: BridgeStats::default(),
        }
    }

    /// Current transmit-path state.
    pub fn transfer_state(&self) -> TransferState {
        self.transfer
    }

    /// Whether serial intake is currently armed.
    pub fn intake_enabled(&self) -> bool {
        self.intake_enabled
    }

    /// Current mesh session state.
    pub fn session(&self) -> SessionState {
        self.session
    }

    /// The liveness monitor.
    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    /// Counters.
    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Bytes dropped past the intake capacity.
    pub fn intake_overflow(&self) -> u64 {
        self.intake.dropped()
    }

    // ========================================================================
    // Serial intake / boundary detection
    // ========================================================================

    /// One serial byte, interrupt semantics: append and re-arm the idle
    /// timer. Bytes arriving while the gate is closed are discarded, as if
    /// the RX interrupt were masked.
    fn handle_serial_byte(&mut self, byte: u8, ctx: &mut SimContext) {
        if !self.intake_enabled {
            self.stats.bytes_dropped_gated += 1;
            return;
        }
        self.stats.bytes_received += 1;
        if self.transfer == TransferState::Idle {
            self.transfer = TransferState::BoundaryPending;
        }
        self.intake.push(byte);
        self.last_byte_at = ctx.time();
        // Retrigger: post a fresh one-shot; stale expirations are ignored
        // in on_idle_timer by comparing against the last byte arrival.
        ctx.post_event(
            self.config.idle_timeout,
            vec![self.id],
            EventPayload::Timer {
                timer_id: TIMER_IDLE,
            },
        );
    }

    /// Idle timer expiry: declare a message boundary if no newer byte
    /// re-armed the timer in the meantime.
    fn on_idle_timer(&mut self, ctx: &mut SimContext) {
        if self.transfer != TransferState::BoundaryPending {
            return;
        }
        if ctx.time().saturating_sub(self.last_byte_at) < self.config.idle_timeout {
            // A newer byte re-armed the timer; this expiration is stale.
            return;
        }

        self.transfer = TransferState::Sending;
        self.intake_enabled = false;
        self.stats.messages_framed += 1;
        debug!(
            bridge = %self.config.name,
            len = self.intake.len(),
            "serial message complete, intake suspended"
        );

        // Defer fragmentation to its own task so the boundary declaration
        // itself stays interrupt-short.
        ctx.post_immediate(
            vec![self.id],
            EventPayload::Timer {
                timer_id: TIMER_TRANSMIT,
            },
        );
    }

    // ========================================================================
    // Fragmentation transmitter
    // ========================================================================

    /// Abandon the current transfer and re-arm intake immediately.
    fn reset_transfer(&mut self) {
        self.intake.clear();
        self.transfer = TransferState::Idle;
        self.intake_enabled = true;
    }

    /// Drive the whole fragment burst for the completed message.
    ///
    /// Sends are strictly in order, one transport call at a time, each
    /// result observed before the next. Failures are logged and skipped;
    /// the burst always runs through to the final fragment. Intake stays
    /// suspended until the transport confirms the final fragment.
    fn on_transmit(&mut self, _ctx: &mut SimContext) {
        if self.transfer != TransferState::Sending {
            return;
        }

        // Destination filter: reject the message outright and resume
        // intake without any send.
        if let Some(filter) = self.config.destination_filter {
            if self.intake.as_slice().first() != Some(&filter) {
                debug!(
                    bridge = %self.config.name,
                    "message rejected by destination filter, intake re-enabled"
                );
                self.stats.messages_filtered += 1;
                self.reset_transfer();
                return;
            }
        }

        if self.session != SessionState::Joined {
            warn!(
                bridge = %self.config.name,
                state = ?self.session,
                "session not joined, message dropped"
            );
            self.stats.messages_dropped_unjoined += 1;
            self.reset_transfer();
            return;
        }

        let fragments = split_message(self.intake.as_slice(), self.config.fragment_capacity);
        debug!(
            bridge = %self.config.name,
            len = self.intake.len(),
            fragments = fragments.len(),
            "transmitting"
        );

        for fragment in &fragments {
            let tag = if fragment.is_last {
                MessageTag::Final
            } else {
                MessageTag::More
            };
            match self.transport.send(
                self.config.destination,
                self.config.data_endpoint,
                tag,
                &fragment.encode(),
            ) {
                Ok(()) => {
                    self.stats.fragments_sent += 1;
                    counter!("uartmesh_fragments_sent").increment(1);
                }
                Err(e) => {
                    // Lossy best-effort: log and keep going.
                    warn!(bridge = %self.config.name, error = %e, "fragment send failed");
                    self.stats.send_failures += 1;
                }
            }
        }

        // The raw message is consumed; intake stays gated until the final
        // fragment's send-complete arrives.
        self.intake.clear();
    }

    /// Send-complete from the transport. The notification tagged final is
    /// what releases the flow-control gate.
    fn on_send_complete(&mut self, ev: &MeshSendCompleteEvent) {
        if !ev.status.is_success() {
            warn!(
                bridge = %self.config.name,
                status = ?ev.status,
                "transport reported delivery failure"
            );
            self.stats.delivery_failures += 1;
        }
        if ev.tag == MessageTag::Final && self.transfer == TransferState::Sending {
            self.transfer = TransferState::Idle;
            self.intake_enabled = true;
            trace!(bridge = %self.config.name, "final fragment resolved, intake re-enabled");
        }
    }

    // ========================================================================
    // Reassembly receiver
    // ========================================================================

    /// One fragment delivered from the mesh.
    fn on_mesh_rx(&mut self, ev: &MeshRxEvent, ctx: &mut SimContext) {
        if ev.endpoint != self.config.data_endpoint {
            trace!(
                bridge = %self.config.name,
                endpoint = ev.endpoint,
                "ignoring fragment on foreign endpoint"
            );
            return;
        }
        let fragment = match Fragment::decode(&ev.payload) {
            Ok(fragment) => fragment,
            Err(e) => {
                warn!(bridge = %self.config.name, error = %e, "undecodable fragment dropped");
                return;
            }
        };
        if let Some(message) = self.reassembler.accept(&fragment) {
            self.stats.messages_assembled += 1;
            counter!("uartmesh_messages_assembled").increment(1);
            info!(
                bridge = %self.config.name,
                len = message.len(),
                "assembled message: {}",
                hex::encode(&message)
            );
            if let Some(sink) = self.serial_sink {
                ctx.post_immediate(
                    vec![sink],
                    EventPayload::SerialTx(SerialTxEvent { data: message }),
                );
            }
        }
    }

    // ========================================================================
    // Session / liveness
    // ========================================================================

    fn on_session_changed(&mut self, ev: &SessionChangedEvent, ctx: &mut SimContext) {
        self.session = ev.state;
        match ev.state {
            SessionState::Joined => {
                info!(bridge = %self.config.name, "network up");
                if self.liveness.arm() {
                    // First join: schedule the feed task. It perpetuates
                    // itself from here on.
                    ctx.post_immediate(
                        vec![self.id],
                        EventPayload::Timer {
                            timer_id: TIMER_WATCHDOG,
                        },
                    );
                }
            }
            SessionState::Unjoined => info!(bridge = %self.config.name, "network down"),
            SessionState::Joining => debug!(bridge = %self.config.name, "joining"),
            SessionState::Failed => {
                // Deliberately no watchdog activity: a device that cannot
                // join is left to reset on watchdog expiry.
                error!(bridge = %self.config.name, "mesh session failed");
            }
        }
    }

    fn on_watchdog_timer(&mut self, ctx: &mut SimContext) {
        ctx.post_event(
            self.liveness.period(),
            vec![self.id],
            EventPayload::Timer {
                timer_id: TIMER_WATCHDOG,
            },
        );
        // Feed only while the session holds; a bridge that loses the
        // network starves the watchdog and resets.
        if self.session == SessionState::Joined {
            self.watchdog.feed();
            self.liveness.record_feed();
            counter!("uartmesh_watchdog_feeds").increment(1);
        }
    }
}

impl<T: MeshTransport, W: Watchdog> Entity for BridgeNode<T, W> {
    fn entity_id(&self) -> EntityId {
        self.id
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut SimContext) -> Result<(), SimError> {
        match &event.payload {
            EventPayload::SerialRx(serial) => {
                for &byte in &serial.data {
                    self.handle_serial_byte(byte, ctx);
                }
            }
            EventPayload::Timer { timer_id } => match *timer_id {
                TIMER_IDLE => self.on_idle_timer(ctx),
                TIMER_TRANSMIT => self.on_transmit(ctx),
                TIMER_WATCHDOG => self.on_watchdog_timer(ctx),
                other => trace!(bridge = %self.config.name, timer_id = other, "unknown timer"),
            },
            EventPayload::MeshRx(ev) => self.on_mesh_rx(ev, ctx),
            EventPayload::MeshSendComplete(ev) => self.on_send_complete(ev),
            EventPayload::MeshSessionChanged(ev) => self.on_session_changed(ev, ctx),
            EventPayload::SerialTx(_) => {}
        }
        Ok(())
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Create a new bridge node.
pub fn new_bridge<T: MeshTransport, W: Watchdog>(
    id: EntityId,
    config: BridgeConfig,
    serial_sink: Option<EntityId>,
    transport: T,
    watchdog: W,
) -> BridgeNode<T, W> {
    BridgeNode::new(id, config, serial_sink, transport, watchdog)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::cmp::Ordering;
    use std::collections::BinaryHeap;
    use std::rc::Rc;
    use uartmesh_core::{EventId, NodeId, SendStatus, SerialRxEvent, TransportError};

    /// One fragment submitted to the scripted transport.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct SentFragment {
        destination: NodeId,
        endpoint: u8,
        tag: MessageTag,
        payload: Vec<u8>,
    }

    /// Transport that records sends; can be scripted to reject some.
    #[derive(Clone)]
    struct ScriptedTransport {
        sent: Rc<RefCell<Vec<SentFragment>>>,
        /// Reject the Nth send (0-based) if set.
        reject_nth: Option<usize>,
    }

    impl ScriptedTransport {
        fn new() -> (Self, Rc<RefCell<Vec<SentFragment>>>) {
            let sent = Rc::new(RefCell::new(Vec::new()));
            (
                ScriptedTransport {
                    sent: Rc::clone(&sent),
                    reject_nth: None,
                },
                sent,
            )
        }
    }

    impl MeshTransport for ScriptedTransport {
        fn send(
            &mut self,
            destination: NodeId,
            endpoint: u8,
            tag: MessageTag,
            payload: &[u8],
        ) -> Result<(), TransportError> {
            let n = self.sent.borrow().len();
            self.sent.borrow_mut().push(SentFragment {
                destination,
                endpoint,
                tag,
                payload: payload.to_vec(),
            });
            if self.reject_nth == Some(n) {
                return Err(TransportError::Rejected(0x66));
            }
            Ok(())
        }
    }

    /// Watchdog that records feed times.
    #[derive(Clone)]
    struct RecordingWatchdog {
        feeds: Rc<RefCell<Vec<SimTime>>>,
        now: Rc<RefCell<SimTime>>,
    }

    impl Watchdog for RecordingWatchdog {
        fn feed(&mut self) {
            let now = *self.now.borrow();
            self.feeds.borrow_mut().push(now);
        }
    }

    type TestBridge = BridgeNode<ScriptedTransport, RecordingWatchdog>;

    const BRIDGE: EntityId = EntityId::new(1);
    const SINK: EntityId = EntityId::new(2);

    struct PumpEvent {
        time: SimTime,
        seq: u64,
        payload: EventPayload,
    }

    impl PartialEq for PumpEvent {
        fn eq(&self, other: &Self) -> bool {
            self.time == other.time && self.seq == other.seq
        }
    }
    impl Eq for PumpEvent {}
    impl PartialOrd for PumpEvent {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }
    impl Ord for PumpEvent {
        fn cmp(&self, other: &Self) -> Ordering {
            // Reversed for min-heap behavior.
            (other.time, other.seq).cmp(&(self.time, self.seq))
        }
    }

    /// Minimal single-entity pump: delivers externally injected events and
    /// the bridge's own posts in time order, collecting sink output.
    /// `run_until` stops before events past the deadline so that the
    /// self-rescheduling watchdog timer does not spin forever.
    struct Pump {
        queue: BinaryHeap<PumpEvent>,
        seq: u64,
        now: Rc<RefCell<SimTime>>,
        sink_output: Vec<Vec<u8>>,
    }

    impl Pump {
        fn new(now: Rc<RefCell<SimTime>>) -> Self {
            Pump {
                queue: BinaryHeap::new(),
                seq: 0,
                now,
                sink_output: Vec::new(),
            }
        }

        fn inject(&mut self, time: SimTime, payload: EventPayload) {
            let seq = self.seq;
            self.seq += 1;
            self.queue.push(PumpEvent { time, seq, payload });
        }

        fn deliver(&mut self, bridge: &mut TestBridge, time: SimTime, payload: EventPayload) {
            *self.now.borrow_mut() = time;
            let event = Event {
                id: EventId(0),
                time,
                source: BRIDGE,
                targets: vec![BRIDGE],
                payload,
            };
            let mut ctx = SimContext::new(time);
            bridge.handle_event(&event, &mut ctx).unwrap();
            for posted in ctx.take_posted() {
                if posted.targets.contains(&BRIDGE) {
                    self.inject(time + posted.delay, posted.payload);
                } else if let EventPayload::SerialTx(tx) = posted.payload {
                    self.sink_output.push(tx.data);
                }
            }
        }

        fn run_until(&mut self, bridge: &mut TestBridge, deadline: SimTime) {
            while let Some(next) = self.queue.peek() {
                if next.time > deadline {
                    break;
                }
                let PumpEvent { time, payload, .. } = self.queue.pop().unwrap();
                self.deliver(bridge, time, payload);
            }
        }
    }

    const DEADLINE: SimTime = SimTime::from_secs(1);

    fn make_bridge(
        config: BridgeConfig,
    ) -> (
        TestBridge,
        Rc<RefCell<Vec<SentFragment>>>,
        Rc<RefCell<Vec<SimTime>>>,
        Pump,
    ) {
        let (transport, sent) = ScriptedTransport::new();
        let now = Rc::new(RefCell::new(SimTime::ZERO));
        let feeds = Rc::new(RefCell::new(Vec::new()));
        let watchdog = RecordingWatchdog {
            feeds: Rc::clone(&feeds),
            now: Rc::clone(&now),
        };
        let bridge = BridgeNode::new(BRIDGE, config, Some(SINK), transport, watchdog);
        (bridge, sent, feeds, Pump::new(now))
    }

    fn joined_at(pump: &mut Pump, time: SimTime) {
        pump.inject(
            time,
            EventPayload::MeshSessionChanged(SessionChangedEvent {
                state: SessionState::Joined,
            }),
        );
    }

    /// Inject `data` as individual bytes with the given inter-byte gap,
    /// starting at `start`.
    fn inject_bytes(pump: &mut Pump, start: SimTime, gap: SimTime, data: &[u8]) {
        let mut t = start;
        for &byte in data {
            pump.inject(
                t,
                EventPayload::SerialRx(SerialRxEvent { data: vec![byte] }),
            );
            t += gap;
        }
    }

    fn complete_final(pump: &mut Pump, time: SimTime) {
        pump.inject(
            time,
            EventPayload::MeshSendComplete(MeshSendCompleteEvent {
                tag: MessageTag::Final,
                status: SendStatus::Success,
            }),
        );
    }

    #[test]
    fn test_boundary_detection_single_message() {
        let (mut bridge, sent, _feeds, mut pump) = make_bridge(BridgeConfig::default());
        joined_at(&mut pump, SimTime::ZERO);
        // 5 bytes with 100 us gaps (below the 500 us idle threshold).
        inject_bytes(
            &mut pump,
            SimTime::ZERO,
            SimTime::from_micros(100),
            b"hello",
        );
        pump.run_until(&mut bridge, DEADLINE);

        // One message framed, one (final) fragment sent.
        assert_eq!(bridge.stats().messages_framed, 1);
        let sent = sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tag, MessageTag::Final);
        assert_eq!(&sent[0].payload[1..], b"hello");
    }

    #[test]
    fn test_slow_drip_extends_message() {
        let (mut bridge, sent, _feeds, mut pump) = make_bridge(BridgeConfig::default());
        joined_at(&mut pump, SimTime::ZERO);
        // Gaps of 400 us stay under the threshold: still one message.
        inject_bytes(
            &mut pump,
            SimTime::ZERO,
            SimTime::from_micros(400),
            b"slow drip",
        );
        pump.run_until(&mut bridge, DEADLINE);
        assert_eq!(bridge.stats().messages_framed, 1);
        assert_eq!(sent.borrow().len(), 1);
    }

    #[test]
    fn test_gap_above_threshold_splits_messages() {
        let (mut bridge, sent, _feeds, mut pump) = make_bridge(BridgeConfig::default());
        joined_at(&mut pump, SimTime::ZERO);
        inject_bytes(&mut pump, SimTime::ZERO, SimTime::from_micros(10), b"ab");
        // Second burst starts 5 ms later, well past the idle timeout.
        inject_bytes(
            &mut pump,
            SimTime::from_millis(5),
            SimTime::from_micros(10),
            b"cd",
        );
        complete_final(&mut pump, SimTime::from_millis(2));
        complete_final(&mut pump, SimTime::from_millis(10));
        pump.run_until(&mut bridge, DEADLINE);

        assert_eq!(bridge.stats().messages_framed, 2);
        let sent = sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[0].payload[1..], b"ab");
        assert_eq!(&sent[1].payload[1..], b"cd");
    }

    #[test]
    fn test_gate_closed_until_final_send_complete() {
        let (mut bridge, sent, _feeds, mut pump) = make_bridge(BridgeConfig::default());
        joined_at(&mut pump, SimTime::ZERO);
        inject_bytes(&mut pump, SimTime::ZERO, SimTime::from_micros(10), b"first");
        // These bytes arrive while the transfer is outstanding (no
        // send-complete yet): the gate must discard them.
        inject_bytes(
            &mut pump,
            SimTime::from_millis(2),
            SimTime::from_micros(10),
            b"lost",
        );
        pump.run_until(&mut bridge, DEADLINE);

        assert_eq!(bridge.transfer_state(), TransferState::Sending);
        assert!(!bridge.intake_enabled());
        assert_eq!(bridge.stats().bytes_dropped_gated, 4);
        assert_eq!(sent.borrow().len(), 1);

        // Final completion re-opens the gate.
        complete_final(&mut pump, SimTime::from_millis(3));
        pump.run_until(&mut bridge, DEADLINE);
        assert_eq!(bridge.transfer_state(), TransferState::Idle);
        assert!(bridge.intake_enabled());

        // A new message now goes through.
        inject_bytes(
            &mut pump,
            SimTime::from_millis(4),
            SimTime::from_micros(10),
            b"second",
        );
        pump.run_until(&mut bridge, DEADLINE);
        assert_eq!(sent.borrow().len(), 2);
        assert_eq!(&sent.borrow()[1].payload[1..], b"second");
    }

    #[test]
    fn test_multi_fragment_transmit_order_and_flags() {
        let (mut bridge, sent, _feeds, mut pump) = make_bridge(BridgeConfig::default());
        joined_at(&mut pump, SimTime::ZERO);
        let message: Vec<u8> = (0..400u16).map(|i| i as u8).collect();
        inject_bytes(&mut pump, SimTime::ZERO, SimTime::from_micros(1), &message);
        pump.run_until(&mut bridge, DEADLINE);

        let sent = sent.borrow();
        assert_eq!(sent.len(), 5);
        let sizes: Vec<usize> = sent.iter().map(|s| s.payload.len() - 1).collect();
        assert_eq!(sizes, vec![94, 94, 94, 94, 24]);
        let tags: Vec<MessageTag> = sent.iter().map(|s| s.tag).collect();
        assert_eq!(
            tags,
            vec![
                MessageTag::More,
                MessageTag::More,
                MessageTag::More,
                MessageTag::More,
                MessageTag::Final
            ]
        );
        let rejoined: Vec<u8> = sent.iter().flat_map(|s| s.payload[1..].to_vec()).collect();
        assert_eq!(rejoined, message);
        assert_eq!(bridge.stats().fragments_sent, 5);
    }

    #[test]
    fn test_send_failure_does_not_abort_burst() {
        let (transport, sent) = ScriptedTransport::new();
        let transport = ScriptedTransport {
            reject_nth: Some(1),
            ..transport
        };
        let now = Rc::new(RefCell::new(SimTime::ZERO));
        let watchdog = RecordingWatchdog {
            feeds: Rc::new(RefCell::new(Vec::new())),
            now: Rc::clone(&now),
        };
        let mut bridge = BridgeNode::new(
            BRIDGE,
            BridgeConfig::default(),
            Some(SINK),
            transport,
            watchdog,
        );
        let mut pump = Pump::new(now);

        joined_at(&mut pump, SimTime::ZERO);
        inject_bytes(
            &mut pump,
            SimTime::ZERO,
            SimTime::from_micros(1),
            &vec![9u8; 188],
        );
        pump.run_until(&mut bridge, DEADLINE);

        // Both fragments attempted despite the second being rejected.
        assert_eq!(sent.borrow().len(), 2);
        assert_eq!(bridge.stats().send_failures, 1);
        assert_eq!(bridge.stats().fragments_sent, 1);
    }

    #[test]
    fn test_destination_filter_rejects_without_sending() {
        let config = BridgeConfig {
            destination_filter: Some(0x52),
            ..BridgeConfig::default()
        };
        let (mut bridge, sent, feeds, mut pump) = make_bridge(config);
        joined_at(&mut pump, SimTime::ZERO);
        pump.run_until(&mut bridge, DEADLINE);
        let feeds_after_join = feeds.borrow().len();

        inject_bytes(
            &mut pump,
            SimTime::from_millis(1),
            SimTime::from_micros(10),
            &[0x10, 0x20, 0x30],
        );
        pump.run_until(&mut bridge, DEADLINE);

        // Zero fragments sent, intake re-enabled immediately, no watchdog
        // interaction beyond the join-time feed.
        assert!(sent.borrow().is_empty());
        assert_eq!(bridge.stats().messages_filtered, 1);
        assert!(bridge.intake_enabled());
        assert_eq!(bridge.transfer_state(), TransferState::Idle);
        assert_eq!(feeds.borrow().len(), feeds_after_join);

        // A matching message passes the filter.
        inject_bytes(
            &mut pump,
            SimTime::from_millis(5),
            SimTime::from_micros(10),
            &[0x52, 0x20, 0x30],
        );
        pump.run_until(&mut bridge, DEADLINE);
        assert_eq!(sent.borrow().len(), 1);
    }

    #[test]
    fn test_unjoined_session_drops_message_and_reopens_gate() {
        let (mut bridge, sent, feeds, mut pump) = make_bridge(BridgeConfig::default());
        // No join: the completed message is dropped, not sent.
        inject_bytes(&mut pump, SimTime::ZERO, SimTime::from_micros(10), b"xyz");
        pump.run_until(&mut bridge, DEADLINE);

        assert!(sent.borrow().is_empty());
        assert_eq!(bridge.stats().messages_dropped_unjoined, 1);
        assert!(bridge.intake_enabled());
        // Fail-fast: the watchdog was never fed.
        assert!(feeds.borrow().is_empty());
    }

    #[test]
    fn test_reassembly_emits_to_sink() {
        let (mut bridge, _sent, _feeds, mut pump) = make_bridge(BridgeConfig::default());
        let message: Vec<u8> = (0..400u16).map(|i| i as u8).collect();
        let mut t = SimTime::ZERO;
        for fragment in split_message(&message, 94) {
            pump.inject(
                t,
                EventPayload::MeshRx(MeshRxEvent {
                    endpoint: 1,
                    payload: fragment.encode(),
                }),
            );
            t += SimTime::from_millis(1);
        }
        pump.run_until(&mut bridge, DEADLINE);

        assert_eq!(bridge.stats().messages_assembled, 1);
        assert_eq!(pump.sink_output.len(), 1);
        assert_eq!(pump.sink_output[0], message);
    }

    #[test]
    fn test_foreign_endpoint_and_garbage_ignored() {
        let (mut bridge, _sent, _feeds, mut pump) = make_bridge(BridgeConfig::default());
        pump.inject(
            SimTime::ZERO,
            EventPayload::MeshRx(MeshRxEvent {
                endpoint: 2,
                payload: vec![1, 0xAA],
            }),
        );
        pump.inject(
            SimTime::from_millis(1),
            EventPayload::MeshRx(MeshRxEvent {
                endpoint: 1,
                payload: vec![0x52, 0xAA], // bad flag byte
            }),
        );
        pump.run_until(&mut bridge, DEADLINE);
        assert_eq!(bridge.stats().messages_assembled, 0);
        assert!(pump.sink_output.is_empty());
    }

    #[test]
    fn test_watchdog_armed_only_after_join_and_self_reschedules() {
        let (mut bridge, _sent, feeds, mut pump) = make_bridge(BridgeConfig::default());

        // Serial traffic before join feeds nothing.
        inject_bytes(&mut pump, SimTime::ZERO, SimTime::from_micros(10), b"pre");
        pump.run_until(&mut bridge, DEADLINE);
        assert!(feeds.borrow().is_empty());
        assert!(!bridge.liveness().is_armed());

        // Join at 10 ms: first feed immediately, then every 2 s.
        joined_at(&mut pump, SimTime::from_millis(10));
        pump.run_until(&mut bridge, SimTime::from_millis(4_500));

        let feeds = feeds.borrow();
        assert_eq!(feeds.len(), 3);
        assert_eq!(feeds[0], SimTime::from_millis(10));
        assert_eq!(feeds[1], SimTime::from_millis(2_010));
        assert_eq!(feeds[2], SimTime::from_millis(4_010));
        assert_eq!(bridge.liveness().feeds(), 3);
    }

    #[test]
    fn test_second_join_does_not_double_feed() {
        let (mut bridge, _sent, feeds, mut pump) = make_bridge(BridgeConfig::default());
        joined_at(&mut pump, SimTime::ZERO);
        pump.run_until(&mut bridge, SimTime::from_millis(100));
        assert_eq!(feeds.borrow().len(), 1);

        // Session bounces; the second Joined must not start a second feed
        // task.
        pump.inject(
            SimTime::from_millis(200),
            EventPayload::MeshSessionChanged(SessionChangedEvent {
                state: SessionState::Unjoined,
            }),
        );
        joined_at(&mut pump, SimTime::from_millis(300));
        pump.run_until(&mut bridge, SimTime::from_millis(400));
        assert_eq!(feeds.borrow().len(), 1);

        // The original task still fires on schedule, exactly once.
        pump.run_until(&mut bridge, SimTime::from_millis(2_500));
        assert_eq!(feeds.borrow().len(), 2);
        assert_eq!(feeds.borrow()[1], SimTime::from_millis(2_000));
    }

    #[test]
    fn test_failed_session_starves_watchdog() {
        let (mut bridge, _sent, feeds, mut pump) = make_bridge(BridgeConfig::default());
        joined_at(&mut pump, SimTime::ZERO);
        pump.inject(
            SimTime::from_millis(100),
            EventPayload::MeshSessionChanged(SessionChangedEvent {
                state: SessionState::Failed,
            }),
        );
        pump.run_until(&mut bridge, SimTime::from_millis(6_500));

        // Only the join-time feed: the task keeps firing but feeds nothing
        // while the session is down, so the hardware watchdog starves.
        let feeds = feeds.borrow();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0], SimTime::ZERO);
    }

    #[test]
    fn test_intake_overflow_is_silent() {
        let config = BridgeConfig {
            intake_capacity: 4,
            ..BridgeConfig::default()
        };
        let (mut bridge, sent, _feeds, mut pump) = make_bridge(config);
        joined_at(&mut pump, SimTime::ZERO);
        inject_bytes(
            &mut pump,
            SimTime::ZERO,
            SimTime::from_micros(10),
            b"abcdefgh",
        );
        pump.run_until(&mut bridge, DEADLINE);

        // Only the first 4 bytes survive; the rest were dropped silently.
        assert_eq!(bridge.intake_overflow(), 4);
        assert_eq!(&sent.borrow()[0].payload[1..], b"abcd");
    }
}
