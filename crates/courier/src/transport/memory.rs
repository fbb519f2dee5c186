//! In-memory transport implementation
//!
//! Scripted responses keyed by endpoint, plus a log of every request made.
//! Used by the unit and integration tests to drive the sync loop and the
//! uploader without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use url::Url;

use super::{MultipartForm, Transport, TransportError};

/// Body of a recorded request
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedBody {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// A request as the transport received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub timeout: Duration,
    pub body: RecordedBody,
}

impl RecordedRequest {
    /// Last path segment, e.g. `synccheck`
    pub fn endpoint(&self) -> String {
        endpoint_of(&self.url)
    }

    /// Value of a query parameter
    pub fn query(&self, key: &str) -> Option<String> {
        Url::parse(&self.url).ok().and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        })
    }

    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            RecordedBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn form(&self) -> Option<&MultipartForm> {
        match &self.body {
            RecordedBody::Multipart(form) => Some(form),
            _ => None,
        }
    }
}

type Reply = Result<String, TransportError>;
type RequestHook = Box<dyn Fn(&RecordedRequest) + Send + Sync>;

/// Scripted implementation of [`Transport`]
///
/// Each endpoint has a queue of replies consumed in order. When a queue is
/// empty the endpoint's fallback reply is used, and without a fallback the
/// request fails with [`TransportError::Io`].
#[derive(Default)]
pub struct InMemoryTransport {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
    cookies: RwLock<HashMap<String, String>>,
    hook: RwLock<Option<RequestHook>>,
}

impl InMemoryTransport {
    /// Create a new transport with no scripted replies
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shareable transport
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Queue a successful reply for an endpoint (last path segment)
    pub fn push_ok(&self, endpoint: &str, body: impl Into<String>) {
        self.push(endpoint, Ok(body.into()));
    }

    /// Queue a failed reply for an endpoint
    pub fn push_err(&self, endpoint: &str, error: TransportError) {
        self.push(endpoint, Err(error));
    }

    fn push(&self, endpoint: &str, reply: Reply) {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(endpoint.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Reply used once an endpoint's queue is exhausted
    pub fn set_fallback(&self, endpoint: &str, reply: Result<String, TransportError>) {
        self.fallback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(endpoint.to_string(), reply);
    }

    /// Run a callback for every request, after it is recorded and before it
    /// is answered
    pub fn on_request(&self, hook: impl Fn(&RecordedRequest) + Send + Sync + 'static) {
        if let Ok(mut guard) = self.hook.write() {
            *guard = Some(Box::new(hook));
        }
    }

    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut guard) = self.cookies.write() {
            guard.insert(name.into(), value.into());
        }
    }

    /// All requests made so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests made to one endpoint, in order
    pub fn requests_to(&self, endpoint: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.endpoint() == endpoint)
            .collect()
    }

    /// Number of requests made to one endpoint
    pub fn count(&self, endpoint: &str) -> usize {
        self.requests_to(endpoint).len()
    }

    fn respond(&self, request: RecordedRequest) -> Reply {
        let endpoint = request.endpoint();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Ok(guard) = self.hook.read()
            && let Some(hook) = guard.as_ref()
        {
            hook(&request);
        }

        let queued = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = queued {
            return reply;
        }

        self.fallback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&endpoint)
            .cloned()
            .unwrap_or_else(|| {
                Err(TransportError::Io(format!(
                    "no scripted reply for {endpoint}"
                )))
            })
    }
}

impl Transport for InMemoryTransport {
    fn get_text(&self, url: &str, timeout: Duration) -> Result<String, TransportError> {
        self.respond(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            timeout,
            body: RecordedBody::Empty,
        })
    }

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        self.respond(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            timeout,
            body: RecordedBody::Json(body.clone()),
        })
    }

    fn post_multipart(
        &self,
        url: &str,
        form: MultipartForm,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        self.respond(RecordedRequest {
            method: "POST",
            url: url.to_string(),
            timeout,
            body: RecordedBody::Multipart(form),
        })
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.read().ok()?.get(name).cloned()
    }
}

fn endpoint_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default()
}
