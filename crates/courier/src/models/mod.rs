//! Domain models for gateway entities

mod credentials;
mod media;
mod message;
mod sync_key;

pub use credentials::{BaseRequest, Credentials};
pub use media::{MediaKind, UploadResult};
pub use message::{InboundMessage, MessageId, MessageKind, OutboundMessage, SendResponse};
pub use sync_key::{SyncKey, SyncKeyEntry};
