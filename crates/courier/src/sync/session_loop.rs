//! The long-poll run loop
//!
//! Drives heartbeat → fetch → dispatch until the gateway ends the session or
//! a stop is requested:
//!
//! ```text
//! Idle → Polling ─┬─ NoChange ──────────────→ Idle
//!                 ├─ Changed → Fetching ────→ Idle
//!                 └─ Fatal / stop ──────────→ Stopped
//! ```
//!
//! Heartbeat and fetch errors that are not fatal are reported to the error
//! sink and the loop keeps going. That leniency is the default; an optional
//! bounded backoff can be enabled through [`LoopOptions`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use super::control::{LoopPhase, StopHandle};
use super::dispatcher::{ErrorSink, LoopError, MessageDispatcher, MessageHandler};
use super::fetcher::SyncFetcher;
use super::poller::{HeartbeatPoller, PollResult, SESSION_INVALIDATED};
use super::timing::ErrorBackoff;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `StopHandle::stop` was called
    Requested,
    /// The gateway invalidated the session; it has been marked logged out
    SessionInvalidated,
    /// The heartbeat returned another non-zero status
    GatewayStatus(i64),
}

/// Invoked exactly once when the loop stops
pub type TerminationCallback = Box<dyn FnOnce(StopReason) + Send>;

/// Tuning for the run loop
#[derive(Debug, Clone, Default)]
pub struct LoopOptions {
    /// Wait between consecutive failed iterations. `None` polls again
    /// immediately.
    pub error_backoff: Option<ErrorBackoff>,
}

/// Orchestrates heartbeat, fetch and dispatch on one thread
pub struct SessionLoop {
    poller: HeartbeatPoller,
    fetcher: Arc<SyncFetcher>,
    control: StopHandle,
    options: LoopOptions,
    on_stop: Option<TerminationCallback>,
}

impl SessionLoop {
    pub fn new(poller: HeartbeatPoller, fetcher: Arc<SyncFetcher>, options: LoopOptions) -> Self {
        Self {
            poller,
            fetcher,
            control: StopHandle::new(),
            options,
            on_stop: None,
        }
    }

    /// Register the termination callback
    pub fn on_stop(mut self, callback: impl FnOnce(StopReason) + Send + 'static) -> Self {
        self.on_stop = Some(Box::new(callback));
        self
    }

    /// Handle for stopping the loop from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.control.clone()
    }

    /// Run on the current thread until the loop stops
    pub fn run(
        mut self,
        handler: impl MessageHandler + 'static,
        sink: impl ErrorSink + 'static,
    ) -> StopReason {
        let mut dispatcher = MessageDispatcher::new(handler, sink);
        info!("Session loop started");

        let reason = self.drive(&mut dispatcher);

        self.control.mark_stopped();
        info!("Session loop stopped: {:?}", reason);
        if let Some(callback) = self.on_stop.take() {
            callback(reason);
        }
        reason
    }

    /// Run on a dedicated thread
    pub fn spawn(
        self,
        handler: impl MessageHandler + 'static,
        sink: impl ErrorSink + 'static,
    ) -> std::io::Result<LoopHandle> {
        let stop = self.stop_handle();
        let thread = thread::Builder::new()
            .name("courier-session".to_string())
            .spawn(move || self.run(handler, sink))?;
        Ok(LoopHandle { stop, thread })
    }

    fn drive(&self, dispatcher: &mut MessageDispatcher) -> StopReason {
        let mut consecutive_errors: u32 = 0;

        loop {
            if self.control.is_stop_requested() {
                return StopReason::Requested;
            }

            self.control.set_phase(LoopPhase::Polling);
            match self.poller.poll() {
                Ok(PollResult::NoChange) => {
                    consecutive_errors = 0;
                }
                Ok(PollResult::Changed(selector)) => {
                    if self.control.is_stop_requested() {
                        return StopReason::Requested;
                    }

                    debug!("Change signalled (selector {}), fetching", selector);
                    self.control.set_phase(LoopPhase::Fetching);
                    match self.fetcher.fetch() {
                        Ok(messages) => {
                            consecutive_errors = 0;
                            let stats = dispatcher.dispatch(messages);
                            if stats.failed > 0 {
                                warn!(
                                    "Delivered {} messages, {} handler failures",
                                    stats.delivered, stats.failed
                                );
                            }
                        }
                        Err(e) => {
                            consecutive_errors = consecutive_errors.saturating_add(1);
                            dispatcher.report(LoopError::Fetch(e));
                        }
                    }
                }
                Ok(PollResult::Fatal(status)) => {
                    return if status == SESSION_INVALIDATED {
                        StopReason::SessionInvalidated
                    } else {
                        StopReason::GatewayStatus(status)
                    };
                }
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    dispatcher.report(LoopError::Poll(e));
                }
            }
            self.control.set_phase(LoopPhase::Idle);

            if consecutive_errors > 0
                && let Some(backoff) = &self.options.error_backoff
            {
                let delay = backoff.delay(consecutive_errors);
                debug!("Backing off {:?} after {} errors", delay, consecutive_errors);
                if self.control.wait_for_stop(delay) {
                    return StopReason::Requested;
                }
            }
        }
    }
}

/// A loop running on its own thread
pub struct LoopHandle {
    stop: StopHandle,
    thread: JoinHandle<StopReason>,
}

impl LoopHandle {
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request a stop without waiting for it
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop thread to exit
    pub fn join(self) -> std::thread::Result<StopReason> {
        self.thread.join()
    }
}
