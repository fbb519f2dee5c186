//! A logged-in gateway session
//!
//! [`SessionState`] is the only state shared between the loop, the uploader
//! and the sender. [`Session`] bundles it with a transport and options and
//! hands out the components that work on it.

mod state;

use std::sync::Arc;

pub use state::SessionState;

use crate::config::{GatewayOptions, SessionFile};
use crate::models::SyncKey;
use crate::send::MessageSender;
use crate::sync::{HeartbeatPoller, LoopOptions, SessionLoop, SyncFetcher};
use crate::transport::{Transport, UreqTransport};
use crate::upload::ChunkUploader;

/// Shared session state plus the transport and options to act on it
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    state: Arc<SessionState>,
    options: GatewayOptions,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>, state: Arc<SessionState>, options: GatewayOptions) -> Self {
        Self {
            transport,
            state,
            options,
        }
    }

    /// Build a session over HTTP from a stored session file
    pub fn from_file(file: SessionFile, options: GatewayOptions) -> Self {
        let transport = Arc::new(UreqTransport::with_cookies(file.cookies));
        let state = Arc::new(SessionState::new(file.credentials, file.sync_key));
        Self::new(transport, state, options)
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Current cursor, for persisting between runs
    pub fn cursor(&self) -> SyncKey {
        self.state.cursor()
    }

    /// A run loop over this session
    pub fn session_loop(&self) -> SessionLoop {
        let poller = HeartbeatPoller::with_timeout(
            self.transport.clone(),
            self.state.clone(),
            self.options.heartbeat_timeout(),
        );
        let fetcher = SyncFetcher::with_timeout(
            self.transport.clone(),
            self.state.clone(),
            self.options.request_timeout(),
        );
        let options = LoopOptions {
            error_backoff: self.options.error_backoff,
        };
        SessionLoop::new(poller, Arc::new(fetcher), options)
    }

    pub fn uploader(&self) -> ChunkUploader {
        ChunkUploader::new(self.transport.clone(), self.state.clone())
            .chunk_size(self.options.chunk_size)
            .timeout(self.options.upload_timeout())
    }

    pub fn sender(&self) -> MessageSender {
        MessageSender::with_uploader(self.transport.clone(), self.state.clone(), self.uploader())
            .timeout(self.options.request_timeout())
    }
}
