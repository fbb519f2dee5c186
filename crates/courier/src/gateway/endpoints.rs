//! Endpoint URL construction

use url::Url;

use crate::models::{Credentials, MessageKind, SyncKey};
use crate::transport::TransportError;

const SYNC_CHECK_PATH: &str = "synccheck";
const SYNC_PATH: &str = "webwxsync";
const UPLOAD_PATH: &str = "webwxuploadmedia";
const LANG: &str = "zh_CN";

/// Heartbeat URL carrying the cursor, session identifiers and a timestamp
pub fn sync_check_url(
    credentials: &Credentials,
    cursor: &SyncKey,
    now_millis: i64,
) -> Result<String, TransportError> {
    let now = now_millis.to_string();
    let synckey = cursor.to_query_value();
    build(
        &credentials.sync_url,
        SYNC_CHECK_PATH,
        &[
            ("r", now.as_str()),
            ("skey", credentials.skey()),
            ("sid", credentials.sid()),
            ("uin", credentials.uin()),
            ("deviceid", credentials.device_id()),
            ("synckey", synckey.as_str()),
            ("_", now.as_str()),
        ],
    )
}

/// Message fetch URL
pub fn sync_url(credentials: &Credentials) -> Result<String, TransportError> {
    build(
        &credentials.base_url,
        SYNC_PATH,
        &[
            ("sid", credentials.sid()),
            ("skey", credentials.skey()),
            ("pass_ticket", credentials.pass_ticket.as_str()),
        ],
    )
}

/// Send URL; the path depends on the message kind
pub fn send_url(credentials: &Credentials, kind: MessageKind) -> Result<String, TransportError> {
    let path = match kind {
        MessageKind::Text => "webwxsendmsg",
        MessageKind::Image => "webwxsendmsgimg",
        MessageKind::File => "webwxsendappmsg",
        MessageKind::Video => "webwxsendvideomsg",
    };

    let mut params = vec![("lang", LANG), ("pass_ticket", credentials.pass_ticket.as_str())];
    if kind.is_media() {
        params.push(("fun", "async"));
        params.push(("f", "json"));
    }

    build(&credentials.base_url, path, &params)
}

/// Chunked media upload URL
pub fn upload_url(credentials: &Credentials) -> Result<String, TransportError> {
    build(&credentials.base_url, UPLOAD_PATH, &[("f", "json")])
}

fn build(base: &str, path: &str, params: &[(&str, &str)]) -> Result<String, TransportError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path);
    Url::parse_with_params(&raw, params)
        .map(String::from)
        .map_err(|e| TransportError::InvalidUrl(format!("{raw}: {e}")))
}
