//! Fixtures shared by unit tests

use std::sync::Arc;

use crate::models::{BaseRequest, Credentials, SyncKey};
use crate::session::SessionState;
use crate::transport::InMemoryTransport;

pub const NO_CHANGE: &str = r#"window.synccheck={retcode:"0",selector:"0"}"#;
pub const CHANGED: &str = r#"window.synccheck={retcode:"0",selector:"2"}"#;
pub const LOGGED_OUT: &str = r#"window.synccheck={retcode:"1101",selector:"0"}"#;

pub fn credentials() -> Credentials {
    Credentials {
        base_request: BaseRequest {
            uin: "1001".into(),
            sid: "sid-1".into(),
            skey: "@crypt_k".into(),
            device_id: "e000000000000001".into(),
        },
        pass_ticket: "ticket".into(),
        self_user_name: "@me".into(),
        base_url: "https://gw.example/cgi-bin/mmwebwx-bin".into(),
        sync_url: "https://push.gw.example/cgi-bin/mmwebwx-bin".into(),
    }
}

pub fn session(cursor: SyncKey) -> Arc<SessionState> {
    Arc::new(SessionState::new(credentials(), cursor))
}

pub fn transport() -> Arc<InMemoryTransport> {
    InMemoryTransport::shared()
}

/// Sync response body with the given message ids and cursor pairs
pub fn sync_body(msg_ids: &[&str], cursor: &[(i64, i64)]) -> String {
    let messages: Vec<_> = msg_ids
        .iter()
        .map(|id| serde_json::json!({"MsgId": id, "MsgType": 1, "Content": format!("body {id}")}))
        .collect();
    serde_json::json!({
        "BaseResponse": {"Ret": 0, "ErrMsg": ""},
        "AddMsgCount": messages.len(),
        "AddMsgList": messages,
        "SyncKey": SyncKey::from_pairs(cursor.iter().copied()),
    })
    .to_string()
}
