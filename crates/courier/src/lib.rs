//! Courier - long-poll session sync and chunked media upload
//!
//! This crate keeps a web messaging gateway session alive and moves messages
//! in both directions:
//! - Session state shared between components (credentials, cursor, login flag)
//! - Heartbeat polling, cursor-advancing fetch and in-order dispatch
//! - A run loop with cooperative stop and a single termination callback
//! - Sequential chunked upload and the send-message endpoints
//! - A transport trait with a `ureq` implementation and a scripted one
//!
//! The core is synchronous. Run the loop on its own thread with
//! [`SessionLoop::spawn`] and stop it from anywhere with a [`StopHandle`].

pub mod config;
pub mod gateway;
pub mod models;
pub mod send;
pub mod session;
pub mod sync;
pub mod transport;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use config::{GatewayOptions, SessionFile};
pub use models::{
    BaseRequest, Credentials, InboundMessage, MediaKind, MessageId, MessageKind, OutboundMessage,
    SendResponse, SyncKey, UploadResult,
};
pub use send::{FILE_HELPER, MessageSender, SendError};
pub use session::{Session, SessionState};
pub use sync::{
    ErrorBackoff, ErrorSink, HeartbeatPoller, LogErrorSink, LoopError, LoopHandle, LoopOptions,
    LoopPhase, MessageDispatcher, MessageHandler, PollError, PollResult, SessionLoop, StopHandle,
    StopReason, SyncError, SyncFetcher,
};
pub use transport::{InMemoryTransport, MultipartForm, Transport, TransportError, UreqTransport};
pub use upload::{ChunkPlan, ChunkUploader, UploadError, UploadJob};
