//! Loop lifecycle and cooperative stop signalling

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Where the session loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Polling,
    Fetching,
    Stopped,
}

struct ControlState {
    phase: LoopPhase,
    stop_requested: bool,
}

struct Control {
    state: Mutex<ControlState>,
    wake: Condvar,
}

/// Handle for observing and stopping a session loop
///
/// Cheap to clone and safe to use from any thread. Stopping only sets a flag
/// and wakes a loop that is waiting out a backoff; it never waits for the
/// loop itself, and calls still in flight are allowed to finish.
#[derive(Clone)]
pub struct StopHandle {
    control: Arc<Control>,
}

impl StopHandle {
    pub(crate) fn new() -> Self {
        Self {
            control: Arc::new(Control {
                state: Mutex::new(ControlState {
                    phase: LoopPhase::Idle,
                    stop_requested: false,
                }),
                wake: Condvar::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.control.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request the loop to stop at its next iteration boundary
    ///
    /// Idempotent; a no-op once the loop has stopped.
    pub fn stop(&self) {
        let mut state = self.lock();
        if state.phase == LoopPhase::Stopped || state.stop_requested {
            return;
        }
        state.stop_requested = true;
        self.control.wake.notify_all();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    pub fn phase(&self) -> LoopPhase {
        self.lock().phase
    }

    pub fn is_stopped(&self) -> bool {
        self.phase() == LoopPhase::Stopped
    }

    pub(crate) fn set_phase(&self, phase: LoopPhase) {
        let mut state = self.lock();
        if state.phase != LoopPhase::Stopped {
            state.phase = phase;
        }
    }

    pub(crate) fn mark_stopped(&self) {
        self.lock().phase = LoopPhase::Stopped;
    }

    /// Sleep up to `timeout`, returning early with `true` if a stop arrives
    pub(crate) fn wait_for_stop(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (state, _) = self
            .control
            .wake
            .wait_timeout_while(guard, timeout, |state| !state.stop_requested)
            .unwrap_or_else(PoisonError::into_inner);
        state.stop_requested
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("StopHandle")
            .field("phase", &state.phase)
            .field("stop_requested", &state.stop_requested)
            .finish()
    }
}
