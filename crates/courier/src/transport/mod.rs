//! HTTP transport capability
//!
//! The core never talks to the network directly. Every request goes through
//! the [`Transport`] trait so the connection pool and cookie jar stay owned by
//! whoever constructs the session, and tests can substitute a scripted
//! implementation.

mod http;
mod memory;
mod multipart;

use std::time::Duration;

pub use http::UreqTransport;
pub use memory::{InMemoryTransport, RecordedBody, RecordedRequest};
pub use multipart::{FilePart, MultipartForm};

/// Network-level failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("gateway returned HTTP {0}")]
    Status(u16),
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
    #[error("transport failure: {0}")]
    Io(String),
}

/// Trait for the HTTP operations the core needs
///
/// Implementations must apply the given timeout to the whole request so no
/// call blocks indefinitely. Responses are returned as text; decoding is the
/// caller's job so protocol errors stay distinguishable from network errors.
pub trait Transport: Send + Sync {
    /// GET a URL and return the response body
    fn get_text(&self, url: &str, timeout: Duration) -> Result<String, TransportError>;

    /// POST a JSON body and return the response body
    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<String, TransportError>;

    /// POST a `multipart/form-data` body and return the response body
    fn post_multipart(
        &self,
        url: &str,
        form: MultipartForm,
        timeout: Duration,
    ) -> Result<String, TransportError>;

    /// Look up a session cookie by name
    fn cookie(&self, name: &str) -> Option<String>;
}
