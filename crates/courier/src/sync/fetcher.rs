//! Message fetching and cursor advancement

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use log::debug;

use crate::gateway::api::{SyncRequest, SyncResponse};
use crate::gateway::sync_url;
use crate::models::InboundMessage;
use crate::session::SessionState;
use crate::transport::{Transport, TransportError};

/// Default bound on a single sync request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A fetch that produced no messages
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("sync request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("could not decode sync response: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("gateway rejected sync with status {status}")]
    Rejected {
        status: i64,
        message: Option<String>,
    },
}

/// Retrieves the pending message batch and advances the cursor
///
/// Fetches are serialized: the cursor is read, sent, and replaced while a
/// per-fetcher lock is held, so two fetches can never start from the same
/// cursor or commit out of order.
pub struct SyncFetcher {
    transport: Arc<dyn Transport>,
    state: Arc<SessionState>,
    timeout: Duration,
    in_flight: Mutex<()>,
}

impl SyncFetcher {
    pub fn new(transport: Arc<dyn Transport>, state: Arc<SessionState>) -> Self {
        Self::with_timeout(transport, state, DEFAULT_REQUEST_TIMEOUT)
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
            in_flight: Mutex::new(()),
        }
    }

    /// Fetch the pending messages
    ///
    /// On success the cursor from the response is committed before the
    /// messages are handed back, so a retry after a failed dispatch never
    /// sees the same batch twice. Returns an empty batch when nothing is
    /// pending.
    pub fn fetch(&self) -> Result<Vec<InboundMessage>, SyncError> {
        let _guard = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);

        let (credentials, cursor) = self.state.snapshot();
        let url = sync_url(&credentials)?;
        let request = SyncRequest {
            base_request: &credentials.base_request,
            sync_key: &cursor,
            rr: -Utc::now().timestamp(),
        };
        let body = serde_json::to_value(&request).map_err(SyncError::Malformed)?;

        let text = self.transport.post_json(&url, &body, self.timeout)?;
        let response: SyncResponse = serde_json::from_str(&text).map_err(SyncError::Malformed)?;

        if response.base_response.ret != 0 {
            return Err(SyncError::Rejected {
                status: response.base_response.ret,
                message: response.base_response.message(),
            });
        }

        if response.add_msg_count as usize != response.add_msg_list.len() {
            debug!(
                "Sync reported {} messages but carried {}",
                response.add_msg_count,
                response.add_msg_list.len()
            );
        }

        self.state.update_cursor(response.sync_key);
        debug!("Fetched {} messages", response.add_msg_list.len());
        Ok(response.add_msg_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncKey;
    use crate::test_support::{self, sync_body};
    use std::thread;

    #[test]
    fn test_fetch_commits_cursor_from_response() {
        let transport = test_support::transport();
        let state = test_support::session(SyncKey::from_pairs([(1, 1)]));
        transport.push_ok("webwxsync", sync_body(&["m1", "m2"], &[(1, 2), (2, 9)]));

        let fetcher = SyncFetcher::new(transport.clone(), state.clone());
        let messages = fetcher.fetch().unwrap();

        let ids: Vec<&str> = messages.iter().map(|m| m.msg_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(state.cursor(), SyncKey::from_pairs([(1, 2), (2, 9)]));
    }

    #[test]
    fn test_request_carries_committed_cursor() {
        let transport = test_support::transport();
        let state = test_support::session(SyncKey::from_pairs([(1, 1)]));
        transport.push_ok("webwxsync", sync_body(&["m1"], &[(1, 2)]));
        transport.push_ok("webwxsync", sync_body(&[], &[(1, 3)]));

        let fetcher = SyncFetcher::new(transport.clone(), state.clone());
        fetcher.fetch().unwrap();
        fetcher.fetch().unwrap();

        let requests = transport.requests_to("webwxsync");
        let sent: Vec<SyncKey> = requests
            .iter()
            .map(|r| serde_json::from_value(r.json().unwrap()["SyncKey"].clone()).unwrap())
            .collect();
        assert_eq!(sent, vec![SyncKey::from_pairs([(1, 1)]), SyncKey::from_pairs([(1, 2)])]);
        assert_eq!(requests[0].json().unwrap()["BaseRequest"]["Sid"], "sid-1");
        assert!(requests[0].json().unwrap()["rr"].as_i64().unwrap() < 0);
    }

    #[test]
    fn test_empty_batch_is_not_an_error() {
        let transport = test_support::transport();
        let state = test_support::session(SyncKey::from_pairs([(1, 1)]));
        transport.push_ok("webwxsync", sync_body(&[], &[(1, 2)]));

        let messages = SyncFetcher::new(transport, state.clone()).fetch().unwrap();
        assert!(messages.is_empty());
        assert_eq!(state.cursor(), SyncKey::from_pairs([(1, 2)]));
    }

    #[test]
    fn test_rejected_leaves_cursor() {
        let transport = test_support::transport();
        let state = test_support::session(SyncKey::from_pairs([(1, 1)]));
        transport.push_ok(
            "webwxsync",
            r#"{"BaseResponse": {"Ret": 1100, "ErrMsg": "bye"}, "AddMsgCount": 0, "AddMsgList": []}"#,
        );

        let err = SyncFetcher::new(transport, state.clone()).fetch().unwrap_err();
        assert!(matches!(err, SyncError::Rejected { status: 1100, .. }));
        assert_eq!(state.cursor(), SyncKey::from_pairs([(1, 1)]));
    }

    #[test]
    fn test_malformed_and_transport_errors_leave_cursor() {
        let transport = test_support::transport();
        let state = test_support::session(SyncKey::from_pairs([(1, 1)]));
        transport.push_ok("webwxsync", "not json");
        transport.push_err("webwxsync", TransportError::Status(502));

        let fetcher = SyncFetcher::new(transport, state.clone());
        assert!(matches!(fetcher.fetch(), Err(SyncError::Malformed(_))));
        assert!(matches!(
            fetcher.fetch(),
            Err(SyncError::Transport(TransportError::Status(502)))
        ));
        assert_eq!(state.cursor(), SyncKey::from_pairs([(1, 1)]));
    }

    #[test]
    fn test_concurrent_fetches_chain_cursors() {
        let transport = test_support::transport();
        let state = test_support::session(SyncKey::from_pairs([(1, 0)]));
        for i in 1..=8 {
            transport.push_ok("webwxsync", sync_body(&[], &[(1, i)]));
        }

        let fetcher = Arc::new(SyncFetcher::new(transport.clone(), state.clone()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let fetcher = Arc::clone(&fetcher);
                thread::spawn(move || fetcher.fetch().unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Each request must carry the cursor committed by the previous one.
        let sent: Vec<i64> = transport
            .requests_to("webwxsync")
            .iter()
            .map(|r| r.json().unwrap()["SyncKey"]["List"][0]["Val"].as_i64().unwrap())
            .collect();
        assert_eq!(sent, (0..8).collect::<Vec<i64>>());
        assert_eq!(state.cursor(), SyncKey::from_pairs([(1, 8)]));
    }
}
