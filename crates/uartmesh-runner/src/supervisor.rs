//! Host-side watchdog supervisor.
//!
//! Stands in for the hardware watchdog: a background thread that checks
//! the time since the last feed and declares expiry (a real device would
//! reset) when the configured period passes without one. A bridge that
//! never joins the mesh never feeds it, so a failed join surfaces as an
//! expiry here — the intended fail-fast behavior.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::error;

use uartmesh_core::Watchdog;

/// Shared state between the fed side and the supervisor thread.
pub struct SupervisorState {
    /// When the watchdog was last fed; `None` until the first feed.
    last_feed: Mutex<Option<Instant>>,
    /// When supervision started (expiry baseline before any feed).
    started_at: Instant,
    /// Flag to signal the supervisor thread to stop.
    stop_flag: AtomicBool,
    /// Set once the watchdog expires.
    expired: AtomicBool,
}

impl SupervisorState {
    fn new() -> Self {
        SupervisorState {
            last_feed: Mutex::new(None),
            started_at: Instant::now(),
            stop_flag: AtomicBool::new(false),
            expired: AtomicBool::new(false),
        }
    }

    /// Record a feed now.
    pub fn record_feed(&self) {
        let mut last = self.last_feed.lock().unwrap();
        *last = Some(Instant::now());
    }

    /// Time since the last feed (or since start, if never fed).
    pub fn starvation(&self) -> Duration {
        let last = self.last_feed.lock().unwrap();
        match *last {
            Some(at) => at.elapsed(),
            None => self.started_at.elapsed(),
        }
    }

    /// Signal the supervisor thread to stop.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Whether the supervisor thread should stop.
    pub fn should_stop(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Whether the watchdog expired.
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Relaxed)
    }
}

/// Watchdog trait implementation handed to a bridge.
#[derive(Clone)]
pub struct HostWatchdog {
    state: Arc<SupervisorState>,
}

impl Watchdog for HostWatchdog {
    fn feed(&mut self) {
        self.state.record_feed();
    }
}

/// Supervisor thread handle.
pub struct WatchdogSupervisor {
    state: Arc<SupervisorState>,
    thread_handle: Option<JoinHandle<()>>,
    expiry: Duration,
}

impl WatchdogSupervisor {
    /// Create and start a supervisor with the given expiry period.
    pub fn new(name: impl Into<String>, expiry: Duration) -> Self {
        let name = name.into();
        let state = Arc::new(SupervisorState::new());
        let thread_state = Arc::clone(&state);
        let check_interval = (expiry / 8).max(Duration::from_millis(1));

        let thread_handle = thread::spawn(move || {
            while !thread_state.should_stop() {
                thread::sleep(check_interval);

                if thread_state.starvation() >= expiry {
                    thread_state.expired.store(true, Ordering::Relaxed);
                    error!(
                        watchdog = %name,
                        starved_ms = thread_state.starvation().as_millis() as u64,
                        "watchdog expired, device would reset"
                    );
                    break;
                }
            }
        });

        WatchdogSupervisor {
            state,
            thread_handle: Some(thread_handle),
            expiry,
        }
    }

    /// The feed handle to give a bridge.
    pub fn watchdog(&self) -> HostWatchdog {
        HostWatchdog {
            state: Arc::clone(&self.state),
        }
    }

    /// The configured expiry period.
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Whether the watchdog has expired.
    pub fn is_expired(&self) -> bool {
        self.state.is_expired()
    }

    /// Stop the supervisor thread and wait for it to finish.
    pub fn stop(mut self) -> bool {
        self.state.stop();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.state.is_expired()
    }
}

impl Drop for WatchdogSupervisor {
    fn drop(&mut self) {
        self.state.stop();
        // Don't wait for the thread in drop; it terminates on its own.
    }
}
