//! Outbound messages
//!
//! Text goes straight to the send endpoint. Images, videos and files are
//! uploaded through the [`ChunkUploader`] first unless a media id from an
//! earlier upload is supplied.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::gateway::api::{SendMessageResponse, SendRequest};
use crate::gateway::send_url;
use crate::models::{MediaKind, MessageKind, OutboundMessage, SendResponse};
use crate::session::SessionState;
use crate::sync::DEFAULT_REQUEST_TIMEOUT;
use crate::transport::{Transport, TransportError};
use crate::upload::{ChunkUploader, UploadError, UploadJob};

/// Recipient used when none is given
pub const FILE_HELPER: &str = "filehelper";

/// A send that the gateway did not accept
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("send request failed: {0}")]
    Transport(#[from] TransportError),
    #[error("could not decode send response: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("gateway rejected message with status {status}")]
    Rejected {
        status: i64,
        message: Option<String>,
    },
    #[error("attachment upload failed: {0}")]
    Upload(#[from] UploadError),
}

/// Sends messages on behalf of the session
pub struct MessageSender {
    transport: Arc<dyn Transport>,
    state: Arc<SessionState>,
    uploader: ChunkUploader,
    timeout: Duration,
}

impl MessageSender {
    pub fn new(transport: Arc<dyn Transport>, state: Arc<SessionState>) -> Self {
        let uploader = ChunkUploader::new(transport.clone(), state.clone());
        Self::with_uploader(transport, state, uploader)
    }

    pub fn with_uploader(
        transport: Arc<dyn Transport>,
        state: Arc<SessionState>,
        uploader: ChunkUploader,
    ) -> Self {
        Self {
            transport,
            state,
            uploader,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Post a prepared message
    ///
    /// The endpoint is chosen by the message's type tag; unknown tags go to
    /// the text endpoint.
    pub fn send_raw(&self, message: &OutboundMessage) -> Result<SendResponse, SendError> {
        let credentials = self.state.credentials();
        let kind = message.kind().unwrap_or(MessageKind::Text);
        let url = send_url(&credentials, kind)?;

        let request = SendRequest {
            base_request: &credentials.base_request,
            msg: message,
            scene: 0,
        };
        let body = serde_json::to_value(&request).map_err(SendError::Malformed)?;
        let text = self.transport.post_json(&url, &body, self.timeout)?;
        let response: SendMessageResponse = serde_json::from_str(&text).map_err(SendError::Malformed)?;

        let response = SendResponse::from(response);
        if response.status != 0 {
            warn!("Send to {} rejected with status {}", message.to_user_name, response.status);
            return Err(SendError::Rejected {
                status: response.status,
                message: response.error_text,
            });
        }
        Ok(response)
    }

    /// Send a text message; an empty recipient means [`FILE_HELPER`]
    pub fn send_text(&self, text: &str, to: &str) -> Result<SendResponse, SendError> {
        let message = OutboundMessage::new(MessageKind::Text, self.self_user_name(), recipient(to)).content(text);
        self.send_raw(&message)
    }

    /// Send an image, uploading it first when no media id is given
    pub fn send_image(
        &self,
        path: impl AsRef<Path>,
        to: &str,
        media_id: Option<&str>,
    ) -> Result<SendResponse, SendError> {
        let to = recipient(to);
        let media_id = self.media_id(path.as_ref(), to, MediaKind::Image, media_id)?;
        let message = OutboundMessage::new(MessageKind::Image, self.self_user_name(), to).media_id(media_id);
        self.send_raw(&message)
    }

    /// Send a video, uploading it first when no media id is given
    pub fn send_video(
        &self,
        path: impl AsRef<Path>,
        to: &str,
        media_id: Option<&str>,
    ) -> Result<SendResponse, SendError> {
        let to = recipient(to);
        let media_id = self.media_id(path.as_ref(), to, MediaKind::Video, media_id)?;
        let message = OutboundMessage::new(MessageKind::Video, self.self_user_name(), to).media_id(media_id);
        self.send_raw(&message)
    }

    /// Upload a file and send it as an attachment card
    pub fn send_file(&self, path: impl AsRef<Path>, to: &str) -> Result<SendResponse, SendError> {
        let path = path.as_ref();
        let to = recipient(to);
        self.uploader.data_ticket()?;
        let job = UploadJob::open(path, to, MediaKind::Document)?;
        let (title, size) = (job.file_name.clone(), job.total_len);

        let upload = self.uploader.upload(job)?;
        let media_id = upload.media_id.unwrap_or_default();
        let content = app_message(&title, size, &media_id);

        info!("Sending file {} to {}", title, to);
        let message = OutboundMessage::new(MessageKind::File, self.self_user_name(), to).content(content);
        self.send_raw(&message)
    }

    fn media_id(
        &self,
        path: &Path,
        to: &str,
        kind: MediaKind,
        known: Option<&str>,
    ) -> Result<String, SendError> {
        if let Some(id) = known.filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }
        let result = self.uploader.upload_file(path, to, kind)?;
        Ok(result.media_id.unwrap_or_default())
    }

    fn self_user_name(&self) -> String {
        self.state.credentials().self_user_name
    }
}

fn recipient(to: &str) -> &str {
    if to.is_empty() { FILE_HELPER } else { to }
}

/// XML descriptor of a file attachment
fn app_message(title: &str, size: u64, media_id: &str) -> String {
    let ext = Path::new(title)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        "<appmsg appid='wxeb7ec651dd0aefa9' sdkver=''><title>{}</title><des></des><action></action>\
         <type>6</type><content></content><url></url><lowurl></lowurl>\
         <appattach><totallen>{}</totallen><attachid>{}</attachid><fileext>{}</fileext></appattach>\
         <extinfo></extinfo></appmsg>",
        xml_escape(title),
        size,
        xml_escape(media_id),
        xml_escape(&ext)
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncKey;
    use crate::test_support;
    use crate::transport::InMemoryTransport;
    use crate::upload::DATA_TICKET_COOKIE;
    use std::io::Write;

    const SENT: &str = r#"{"BaseResponse": {"Ret": 0, "ErrMsg": ""}, "MsgID": "900", "LocalID": "1"}"#;
    const UPLOADED: &str = r#"{"BaseResponse": {"Ret": 0, "ErrMsg": ""}, "MediaId": "@crypt_up"}"#;

    fn sender(transport: &Arc<InMemoryTransport>) -> MessageSender {
        MessageSender::new(transport.clone(), test_support::session(SyncKey::default()))
    }

    fn temp_file(name: &str, content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::File::create(&path).unwrap().write_all(content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_send_text() {
        let transport = test_support::transport();
        transport.push_ok("webwxsendmsg", SENT);

        let response = sender(&transport).send_text("hello", "@bob").unwrap();
        assert_eq!(response.msg_id.as_deref(), Some("900"));

        let request = &transport.requests_to("webwxsendmsg")[0];
        assert_eq!(request.query("lang").as_deref(), Some("zh_CN"));
        assert_eq!(request.query("pass_ticket").as_deref(), Some("ticket"));
        assert_eq!(request.query("fun"), None);

        let body = request.json().unwrap();
        assert_eq!(body["Scene"], 0);
        assert_eq!(body["BaseRequest"]["Uin"], "1001");
        assert_eq!(body["Msg"]["Type"], 1);
        assert_eq!(body["Msg"]["Content"], "hello");
        assert_eq!(body["Msg"]["FromUserName"], "@me");
        assert_eq!(body["Msg"]["ToUserName"], "@bob");
    }

    #[test]
    fn test_empty_recipient_is_file_helper() {
        let transport = test_support::transport();
        transport.push_ok("webwxsendmsg", SENT);

        sender(&transport).send_text("note", "").unwrap();
        let request = &transport.requests_to("webwxsendmsg")[0];
        assert_eq!(request.json().unwrap()["Msg"]["ToUserName"], "filehelper");
    }

    #[test]
    fn test_rejected_send() {
        let transport = test_support::transport();
        transport.push_ok("webwxsendmsg", r#"{"BaseResponse": {"Ret": 1201, "ErrMsg": "no such user"}}"#);

        let err = sender(&transport).send_text("hi", "@ghost").unwrap_err();
        match err {
            SendError::Rejected { status, message } => {
                assert_eq!(status, 1201);
                assert_eq!(message.as_deref(), Some("no such user"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_image_with_known_media_id_skips_upload() {
        let transport = test_support::transport();
        transport.push_ok("webwxsendmsgimg", SENT);

        sender(&transport)
            .send_image("/does/not/matter.png", "@bob", Some("@crypt_known"))
            .unwrap();

        assert_eq!(transport.count("webwxuploadmedia"), 0);
        let request = &transport.requests_to("webwxsendmsgimg")[0];
        assert_eq!(request.query("fun").as_deref(), Some("async"));
        assert_eq!(request.query("f").as_deref(), Some("json"));
        assert_eq!(request.json().unwrap()["Msg"]["Type"], 3);
        assert_eq!(request.json().unwrap()["Msg"]["MediaId"], "@crypt_known");
    }

    #[test]
    fn test_image_uploads_first() {
        let transport = test_support::transport();
        transport.set_cookie(DATA_TICKET_COOKIE, "data-ticket");
        transport.push_ok("webwxuploadmedia", UPLOADED);
        transport.push_ok("webwxsendmsgimg", SENT);
        let (_dir, path) = temp_file("cat.png", b"png bytes");

        sender(&transport).send_image(&path, "@bob", None).unwrap();

        let endpoints: Vec<String> = transport.requests().iter().map(|r| r.endpoint()).collect();
        assert_eq!(endpoints, vec!["webwxuploadmedia", "webwxsendmsgimg"]);
        let upload = &transport.requests_to("webwxuploadmedia")[0];
        assert_eq!(upload.form().unwrap().field("mediatype"), Some("pic"));
        let send = &transport.requests_to("webwxsendmsgimg")[0];
        assert_eq!(send.json().unwrap()["Msg"]["MediaId"], "@crypt_up");
    }

    #[test]
    fn test_failed_upload_sends_nothing() {
        let transport = test_support::transport();
        let (_dir, path) = temp_file("clip.mp4", b"video");

        let err = sender(&transport).send_video(&path, "@bob", None).unwrap_err();
        assert!(matches!(err, SendError::Upload(UploadError::MissingTicket)));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_send_file_as_app_message() {
        let transport = test_support::transport();
        transport.set_cookie(DATA_TICKET_COOKIE, "data-ticket");
        transport.push_ok("webwxuploadmedia", UPLOADED);
        transport.push_ok("webwxsendappmsg", SENT);
        let (_dir, path) = temp_file("report.pdf", b"%PDF-1.4");

        sender(&transport).send_file(&path, "@bob").unwrap();

        let upload = &transport.requests_to("webwxuploadmedia")[0];
        assert_eq!(upload.form().unwrap().field("mediatype"), Some("doc"));

        let send = &transport.requests_to("webwxsendappmsg")[0];
        let msg = &send.json().unwrap()["Msg"];
        assert_eq!(msg["Type"], 6);
        let content = msg["Content"].as_str().unwrap();
        assert!(content.contains("<title>report.pdf</title>"));
        assert!(content.contains("<totallen>8</totallen>"));
        assert!(content.contains("<attachid>@crypt_up</attachid>"));
        assert!(content.contains("<fileext>pdf</fileext>"));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a<b>&'\""), "a&lt;b&gt;&amp;&apos;&quot;");
    }
}
