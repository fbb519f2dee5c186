//! Media upload models

use serde::{Deserialize, Serialize};

/// What kind of media an upload carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Document,
    Image,
    Video,
}

impl MediaKind {
    /// Value of the `mediatype` form field
    pub fn form_value(self) -> &'static str {
        match self {
            MediaKind::Document => "doc",
            MediaKind::Image => "pic",
            MediaKind::Video => "video",
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doc" | "document" | "file" => Ok(MediaKind::Document),
            "pic" | "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// Outcome of an upload, taken from the last chunk's response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// Gateway status; anything but 0 is a failure
    pub status: i64,
    pub media_id: Option<String>,
    pub error_text: Option<String>,
}

impl UploadResult {
    /// Status reported before any chunk has been answered
    pub const NOT_SENT: i64 = -1005;

    pub(crate) fn not_sent() -> Self {
        Self {
            status: Self::NOT_SENT,
            media_id: None,
            error_text: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_values() {
        assert_eq!(MediaKind::Document.form_value(), "doc");
        assert_eq!(MediaKind::Image.form_value(), "pic");
        assert_eq!(MediaKind::Video.form_value(), "video");
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("pic".parse::<MediaKind>(), Ok(MediaKind::Image));
        assert_eq!("document".parse::<MediaKind>(), Ok(MediaKind::Document));
        assert!("audio".parse::<MediaKind>().is_err());
    }
}
