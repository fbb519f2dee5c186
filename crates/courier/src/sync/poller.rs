//! Heartbeat polling

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};

use crate::gateway::{SyncCheck, parse_sync_check, sync_check_url};
use crate::session::SessionState;
use crate::transport::{Transport, TransportError};

/// Heartbeat status meaning the session was invalidated remotely
pub const SESSION_INVALIDATED: i64 = 1101;

/// Default bound on a single heartbeat request
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

/// What the gateway said about pending changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    NoChange,
    /// Something changed; the selector says what
    Changed(i64),
    /// The gateway reported a non-zero status
    Fatal(i64),
}

/// The heartbeat produced no verdict
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// We could not reach the gateway
    #[error("heartbeat failed: {0}")]
    Transport(#[from] TransportError),
    /// We could not understand the gateway
    #[error("unexpected heartbeat response: {body:?}")]
    Malformed { body: String },
}

/// Asks the gateway whether anything changed since the current cursor
pub struct HeartbeatPoller {
    transport: Arc<dyn Transport>,
    state: Arc<SessionState>,
    timeout: Duration,
}

impl HeartbeatPoller {
    pub fn new(transport: Arc<dyn Transport>, state: Arc<SessionState>) -> Self {
        Self::with_timeout(transport, state, DEFAULT_HEARTBEAT_TIMEOUT)
    }

    pub fn with_timeout(
        transport: Arc<dyn Transport>,
        state: Arc<SessionState>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            state,
            timeout,
        }
    }

    /// Send one heartbeat
    ///
    /// A [`SESSION_INVALIDATED`] status marks the session logged out before
    /// the result is returned.
    pub fn poll(&self) -> Result<PollResult, PollError> {
        let (credentials, cursor) = self.state.snapshot();
        let url = sync_check_url(&credentials, &cursor, Utc::now().timestamp_millis())?;

        let body = self.transport.get_text(&url, self.timeout)?;
        let check = parse_sync_check(&body).map_err(|e| PollError::Malformed { body: e.body })?;

        debug!("Heartbeat retcode={} selector={}", check.retcode, check.selector);
        Ok(self.classify(check))
    }

    fn classify(&self, check: SyncCheck) -> PollResult {
        match check {
            SyncCheck { retcode: 0, selector: 0 } => PollResult::NoChange,
            SyncCheck { retcode: 0, selector } => PollResult::Changed(selector),
            SyncCheck { retcode, .. } => {
                if retcode == SESSION_INVALIDATED {
                    self.state.mark_logged_out();
                }
                warn!("Heartbeat returned status {}", retcode);
                PollResult::Fatal(retcode)
            }
        }
    }
}
