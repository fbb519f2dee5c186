//! Message models for inbound and outbound gateway messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unique identifier for a message (gateway `MsgId`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message delivered by the sync endpoint
///
/// The fields the core cares about are typed; everything else the gateway
/// sent is preserved verbatim in `extra` so handlers can reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "MsgId", default)]
    pub msg_id: MessageId,
    #[serde(rename = "FromUserName", default)]
    pub from_user_name: String,
    #[serde(rename = "ToUserName", default)]
    pub to_user_name: String,
    #[serde(rename = "MsgType", default)]
    pub msg_type: u32,
    #[serde(rename = "Content", default)]
    pub content: String,
    /// Unix seconds
    #[serde(rename = "CreateTime", default)]
    pub create_time: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InboundMessage {
    /// Create a message with the given id and type, mostly useful in tests
    pub fn new(msg_id: impl Into<MessageId>, msg_type: u32) -> Self {
        Self {
            msg_id: msg_id.into(),
            from_user_name: String::new(),
            to_user_name: String::new(),
            msg_type,
            content: String::new(),
            create_time: 0,
            extra: Map::new(),
        }
    }

    /// When the gateway says the message was created
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.create_time, 0)
    }

    /// Look up a field that has no typed accessor
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Outbound message type tags, which also select the send endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Image,
    /// Generic file, sent as an app message
    File,
    Video,
}

impl MessageKind {
    /// Wire value of the `Type` field
    pub fn code(self) -> u32 {
        match self {
            MessageKind::Text => 1,
            MessageKind::Image => 3,
            MessageKind::File => 6,
            MessageKind::Video => 43,
        }
    }

    /// Parse a wire `Type` value
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(MessageKind::Text),
            3 => Some(MessageKind::Image),
            6 => Some(MessageKind::File),
            43 => Some(MessageKind::Video),
            _ => None,
        }
    }

    /// Whether the message references uploaded media
    pub fn is_media(self) -> bool {
        !matches!(self, MessageKind::Text)
    }
}

/// The `Msg` object of a send request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "Type")]
    pub msg_type: u32,
    #[serde(rename = "Content")]
    pub content: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "LocalID")]
    pub local_id: String,
    #[serde(rename = "ClientMsgId")]
    pub client_msg_id: String,
    #[serde(rename = "MediaId")]
    pub media_id: String,
}

impl OutboundMessage {
    /// Create a message of the given kind with a fresh client id
    pub fn new(kind: MessageKind, from: impl Into<String>, to: impl Into<String>) -> Self {
        let id = client_msg_id();
        Self {
            msg_type: kind.code(),
            content: String::new(),
            from_user_name: from.into(),
            to_user_name: to.into(),
            local_id: id.clone(),
            client_msg_id: id,
            media_id: String::new(),
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn media_id(mut self, media_id: impl Into<String>) -> Self {
        self.media_id = media_id.into();
        self
    }

    /// The kind this message was built for, if the type tag is known
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_code(self.msg_type)
    }
}

/// Client-side message ids are millisecond timestamps
fn client_msg_id() -> String {
    Utc::now().timestamp_millis().to_string()
}

/// Outcome of a send request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResponse {
    pub status: i64,
    pub msg_id: Option<String>,
    pub local_id: Option<String>,
    pub error_text: Option<String>,
}
