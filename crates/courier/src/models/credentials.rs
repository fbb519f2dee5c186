//! Session credentials produced by the login handshake

use serde::{Deserialize, Serialize};

/// The `BaseRequest` object every JSON request carries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseRequest {
    #[serde(rename = "Uin")]
    pub uin: String,
    /// Identity token
    #[serde(rename = "Sid")]
    pub sid: String,
    /// Session key
    #[serde(rename = "Skey")]
    pub skey: String,
    #[serde(rename = "DeviceID")]
    pub device_id: String,
}

/// Everything the core needs to talk to the gateway on behalf of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub base_request: BaseRequest,
    pub pass_ticket: String,
    /// Our own user name, used as `FromUserName`
    pub self_user_name: String,
    /// Base URL for sync, send and upload endpoints (no trailing slash needed)
    pub base_url: String,
    /// Base URL for the heartbeat endpoint
    pub sync_url: String,
}

impl Credentials {
    pub fn uin(&self) -> &str {
        &self.base_request.uin
    }

    pub fn sid(&self) -> &str {
        &self.base_request.sid
    }

    pub fn skey(&self) -> &str {
        &self.base_request.skey
    }

    pub fn device_id(&self) -> &str {
        &self.base_request.device_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_request_wire_names() {
        let base = BaseRequest {
            uin: "1001".into(),
            sid: "sid-1".into(),
            skey: "@crypt_abc".into(),
            device_id: "e123456789012345".into(),
        };
        let value = serde_json::to_value(&base).unwrap();
        assert_eq!(value["Uin"], "1001");
        assert_eq!(value["Sid"], "sid-1");
        assert_eq!(value["Skey"], "@crypt_abc");
        assert_eq!(value["DeviceID"], "e123456789012345");
    }
}
