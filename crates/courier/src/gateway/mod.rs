//! Gateway wire protocol
//!
//! This module provides:
//! - Endpoint URL construction
//! - The strict heartbeat (`synccheck`) response parser
//! - Request and response types for the JSON endpoints

mod endpoints;
mod synccheck;

pub use endpoints::{send_url, sync_check_url, sync_url, upload_url};
pub use synccheck::{MalformedSyncCheck, SyncCheck, parse_sync_check};

/// Gateway API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    use crate::models::{BaseRequest, InboundMessage, OutboundMessage, SendResponse, SyncKey, UploadResult};

    /// Status block present in every JSON response
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct BaseResponse {
        #[serde(rename = "Ret", default)]
        pub ret: i64,
        #[serde(rename = "ErrMsg", default)]
        pub err_msg: String,
    }

    impl BaseResponse {
        /// Error text, if the gateway sent any
        pub fn message(&self) -> Option<String> {
            if self.err_msg.is_empty() {
                None
            } else {
                Some(self.err_msg.clone())
            }
        }
    }

    /// Body of a sync request
    #[derive(Debug, Serialize)]
    pub struct SyncRequest<'a> {
        #[serde(rename = "BaseRequest")]
        pub base_request: &'a BaseRequest,
        #[serde(rename = "SyncKey")]
        pub sync_key: &'a SyncKey,
        /// Negated unix seconds
        pub rr: i64,
    }

    /// Response to a sync request
    #[derive(Debug, Deserialize)]
    pub struct SyncResponse {
        #[serde(rename = "BaseResponse", default)]
        pub base_response: BaseResponse,
        #[serde(rename = "AddMsgCount", default)]
        pub add_msg_count: u32,
        #[serde(rename = "AddMsgList", default)]
        pub add_msg_list: Vec<InboundMessage>,
        #[serde(rename = "SyncKey", default)]
        pub sync_key: SyncKey,
    }

    /// Body of a send-message request
    #[derive(Debug, Serialize)]
    pub struct SendRequest<'a> {
        #[serde(rename = "BaseRequest")]
        pub base_request: &'a BaseRequest,
        #[serde(rename = "Msg")]
        pub msg: &'a OutboundMessage,
        #[serde(rename = "Scene")]
        pub scene: u32,
    }

    /// Response to a send-message request
    #[derive(Debug, Deserialize)]
    pub struct SendMessageResponse {
        #[serde(rename = "BaseResponse", default)]
        pub base_response: BaseResponse,
        #[serde(rename = "MsgID", default)]
        pub msg_id: String,
        #[serde(rename = "LocalID", default)]
        pub local_id: String,
    }

    impl From<SendMessageResponse> for SendResponse {
        fn from(rsp: SendMessageResponse) -> Self {
            Self {
                status: rsp.base_response.ret,
                error_text: rsp.base_response.message(),
                msg_id: Some(rsp.msg_id).filter(|s| !s.is_empty()),
                local_id: Some(rsp.local_id).filter(|s| !s.is_empty()),
            }
        }
    }

    /// JSON descriptor sent as the `uploadmediarequest` form field
    #[derive(Debug, Serialize)]
    pub struct UploadMediaRequest<'a> {
        #[serde(rename = "UploadType")]
        pub upload_type: u32,
        #[serde(rename = "BaseRequest")]
        pub base_request: &'a BaseRequest,
        #[serde(rename = "ClientMediaId")]
        pub client_media_id: i64,
        #[serde(rename = "TotalLen")]
        pub total_len: u64,
        #[serde(rename = "StartPos")]
        pub start_pos: u64,
        #[serde(rename = "DataLen")]
        pub data_len: u64,
        #[serde(rename = "MediaType")]
        pub media_type: u32,
        #[serde(rename = "FromUserName")]
        pub from_user_name: &'a str,
        #[serde(rename = "ToUserName")]
        pub to_user_name: &'a str,
        #[serde(rename = "FileMd5")]
        pub file_md5: &'a str,
    }

    /// Response to one upload chunk
    #[derive(Debug, Deserialize)]
    pub struct UploadMediaResponse {
        #[serde(rename = "BaseResponse", default)]
        pub base_response: BaseResponse,
        #[serde(rename = "MediaId", default)]
        pub media_id: String,
    }

    impl From<UploadMediaResponse> for UploadResult {
        fn from(rsp: UploadMediaResponse) -> Self {
            Self {
                status: rsp.base_response.ret,
                error_text: rsp.base_response.message(),
                media_id: Some(rsp.media_id).filter(|s| !s.is_empty()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::api::*;
    use crate::models::{SendResponse, SyncKey, UploadResult};

    #[test]
    fn test_sync_response_decoding() {
        let json = r#"{
            "BaseResponse": {"Ret": 0, "ErrMsg": ""},
            "AddMsgCount": 1,
            "AddMsgList": [{"MsgId": "1", "MsgType": 1, "Content": "hi"}],
            "SyncKey": {"Count": 1, "List": [{"Key": 1, "Val": 7}]},
            "ContinueFlag": 0
        }"#;

        let rsp: SyncResponse = serde_json::from_str(json).unwrap();
        assert_eq!(rsp.base_response.ret, 0);
        assert_eq!(rsp.add_msg_count, 1);
        assert_eq!(rsp.add_msg_list[0].content, "hi");
        assert_eq!(rsp.sync_key, SyncKey::from_pairs([(1, 7)]));
    }

    #[test]
    fn test_upload_response_conversion() {
        let rsp: UploadMediaResponse = serde_json::from_str(
            r#"{"BaseResponse": {"Ret": 0, "ErrMsg": ""}, "MediaId": "@crypt_m1", "StartPos": 10}"#,
        )
        .unwrap();
        let result = UploadResult::from(rsp);
        assert!(result.is_success());
        assert_eq!(result.media_id.as_deref(), Some("@crypt_m1"));
        assert_eq!(result.error_text, None);
    }

    #[test]
    fn test_send_response_conversion() {
        let rsp: SendMessageResponse = serde_json::from_str(
            r#"{"BaseResponse": {"Ret": 1204, "ErrMsg": "denied"}, "MsgID": "", "LocalID": ""}"#,
        )
        .unwrap();
        let response = SendResponse::from(rsp);
        assert_eq!(response.status, 1204);
        assert_eq!(response.error_text.as_deref(), Some("denied"));
        assert_eq!(response.msg_id, None);
    }
}
