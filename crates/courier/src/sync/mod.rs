//! Long-poll sync engine
//!
//! A [`HeartbeatPoller`] asks whether anything changed, a [`SyncFetcher`]
//! pulls the pending batch and advances the cursor, and a
//! [`MessageDispatcher`] hands each message to the caller. [`SessionLoop`]
//! runs the three in order until the session ends or is stopped.

mod control;
mod dispatcher;
mod fetcher;
mod poller;
mod session_loop;
mod timing;

pub use control::{LoopPhase, StopHandle};
pub use dispatcher::{
    DispatchStats, ErrorSink, LogErrorSink, LoopError, MessageDispatcher, MessageHandler,
};
pub use fetcher::{DEFAULT_REQUEST_TIMEOUT, SyncError, SyncFetcher};
pub use poller::{DEFAULT_HEARTBEAT_TIMEOUT, HeartbeatPoller, PollError, PollResult, SESSION_INVALIDATED};
pub use session_loop::{LoopHandle, LoopOptions, SessionLoop, StopReason, TerminationCallback};
pub use timing::{ErrorBackoff, backoff_delay};
