//! `ureq`-backed transport
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic. The agent's cookie
//! jar collects cookies the gateway sets; cookies obtained out of band during
//! login can be seeded and are sent with every request.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use log::debug;
use ureq::Agent;

use super::{MultipartForm, Transport, TransportError};

/// Browser user agent; the gateway rejects unknown clients
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Production transport over a shared `ureq` agent
pub struct UreqTransport {
    agent: Agent,
    seeded_cookies: RwLock<HashMap<String, String>>,
}

impl UreqTransport {
    /// Create a transport with an empty cookie jar
    pub fn new() -> Self {
        Self::with_cookies(HashMap::new())
    }

    /// Create a transport seeded with cookies from the login handshake
    pub fn with_cookies(cookies: HashMap<String, String>) -> Self {
        let agent: Agent = Agent::config_builder()
            .user_agent(USER_AGENT)
            .build()
            .into();

        Self {
            agent,
            seeded_cookies: RwLock::new(cookies),
        }
    }

    /// Add or replace a seeded cookie
    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut guard) = self.seeded_cookies.write() {
            guard.insert(name.into(), value.into());
        }
    }

    /// `Cookie` header value for the seeded cookies, if any
    fn seeded_header(&self) -> Option<String> {
        let guard = self.seeded_cookies.read().ok()?;
        if guard.is_empty() {
            return None;
        }
        let mut pairs: Vec<String> = guard.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        Some(pairs.join("; "))
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn get_text(&self, url: &str, timeout: Duration) -> Result<String, TransportError> {
        debug!("GET {}", redact(url));

        let mut request = self.agent.get(url);
        if let Some(cookies) = self.seeded_header() {
            request = request.header("Cookie", cookies.as_str());
        }

        let mut response = request
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call()
            .map_err(map_error)?;

        response.body_mut().read_to_string().map_err(map_error)
    }

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        debug!("POST {}", redact(url));

        let mut request = self.agent.post(url);
        if let Some(cookies) = self.seeded_header() {
            request = request.header("Cookie", cookies.as_str());
        }

        let mut response = request
            .config()
            .timeout_global(Some(timeout))
            .build()
            .send_json(body)
            .map_err(map_error)?;

        response.body_mut().read_to_string().map_err(map_error)
    }

    fn post_multipart(
        &self,
        url: &str,
        form: MultipartForm,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        let (content_type, body) = form.encode();
        debug!("POST {} ({} byte form)", redact(url), body.len());

        let mut request = self
            .agent
            .post(url)
            .header("Content-Type", content_type.as_str());
        if let Some(cookies) = self.seeded_header() {
            request = request.header("Cookie", cookies.as_str());
        }

        let mut response = request
            .config()
            .timeout_global(Some(timeout))
            .build()
            .send(&body[..])
            .map_err(map_error)?;

        response.body_mut().read_to_string().map_err(map_error)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        if let Ok(guard) = self.seeded_cookies.read()
            && let Some(value) = guard.get(name)
        {
            return Some(value.clone());
        }

        let jar = self.agent.cookie_jar_lock();
        let found = jar
            .iter()
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_string());
        found
    }
}

fn map_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::StatusCode(code) => TransportError::Status(code),
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::BadUri(uri) => TransportError::InvalidUrl(uri),
        other => TransportError::Io(other.to_string()),
    }
}

/// Strip the query string, which carries session secrets
fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_cookie_lookup() {
        let mut cookies = HashMap::new();
        cookies.insert("webwx_data_ticket".to_string(), "ticket-1".to_string());
        let transport = UreqTransport::with_cookies(cookies);

        assert_eq!(transport.cookie("webwx_data_ticket").as_deref(), Some("ticket-1"));
        assert_eq!(transport.cookie("missing"), None);
    }

    #[test]
    fn test_seeded_header_is_sorted() {
        let transport = UreqTransport::new();
        assert_eq!(transport.seeded_header(), None);

        transport.set_cookie("wxsid", "s");
        transport.set_cookie("wxuin", "1");
        assert_eq!(transport.seeded_header().as_deref(), Some("wxsid=s; wxuin=1"));
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("https://gw/synccheck?skey=secret"), "https://gw/synccheck");
        assert_eq!(redact("https://gw/webwxsync"), "https://gw/webwxsync");
    }

    #[test]
    fn test_map_status_error() {
        assert_eq!(map_error(ureq::Error::StatusCode(502)), TransportError::Status(502));
    }
}
