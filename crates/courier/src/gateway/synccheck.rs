//! Heartbeat response parsing
//!
//! The heartbeat endpoint answers with a single JavaScript assignment:
//! `window.synccheck={retcode:"0",selector:"2"}`. Anything else is treated as
//! a protocol error rather than guessed at.

use std::sync::LazyLock;

use regex::Regex;

static SYNC_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^window\.synccheck=\{retcode:"(\d+)",selector:"(\d+)"\}$"#).unwrap()
});

/// The two fields of a heartbeat response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCheck {
    pub retcode: i64,
    pub selector: i64,
}

/// Heartbeat body that does not match the expected format
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unexpected heartbeat response: {body:?}")]
pub struct MalformedSyncCheck {
    pub body: String,
}

/// Parse a heartbeat response body
pub fn parse_sync_check(body: &str) -> Result<SyncCheck, MalformedSyncCheck> {
    let malformed = || MalformedSyncCheck {
        body: body.to_string(),
    };

    // Surrounding whitespace from the HTTP layer is ignored. Nothing else is tolerated.
    let caps = SYNC_CHECK.captures(body.trim()).ok_or_else(malformed)?;

    // Out-of-range digit runs fail here.
    Ok(SyncCheck {
        retcode: caps[1].parse().map_err(|_| malformed())?,
        selector: caps[2].parse().map_err(|_| malformed())?,
    })
}
