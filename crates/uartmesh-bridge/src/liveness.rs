//! Liveness monitor: the watchdog-feed task's state.
//!
//! The monitor is armed exactly once, when the mesh session first reaches
//! `Joined`. A device that never joins never feeds the watchdog and resets
//! on expiry; that fail-fast policy is intentional, so the guard lives here
//! as explicit state rather than as a side effect of initialization order.

use uartmesh_core::SimTime;

/// State of the periodic watchdog-feed task.
#[derive(Debug)]
pub struct LivenessMonitor {
    period: SimTime,
    armed: bool,
    feeds: u64,
}

impl LivenessMonitor {
    /// Create a monitor with the given feed period.
    pub fn new(period: SimTime) -> Self {
        LivenessMonitor {
            period,
            armed: false,
            feeds: 0,
        }
    }

    /// Feed period.
    pub fn period(&self) -> SimTime {
        self.period
    }

    /// Whether the feed task has been started.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Number of feeds issued so far.
    pub fn feeds(&self) -> u64 {
        self.feeds
    }

    /// Called on a session transition to `Joined`. Returns `true` the
    /// first time only; the feed task must then be scheduled.
    pub fn arm(&mut self) -> bool {
        if self.armed {
            return false;
        }
        self.armed = true;
        true
    }

    /// Record one feed. The caller reschedules the task with [`period`].
    ///
    /// [`period`]: LivenessMonitor::period
    pub fn record_feed(&mut self) {
        self.feeds += 1;
    }
}
