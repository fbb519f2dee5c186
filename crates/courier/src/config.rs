//! Configuration loading for gateway sessions
//!
//! The session file is looked up in order of priority:
//! 1. An explicit path given by the caller
//! 2. The `COURIER_SESSION_FILE` environment variable
//! 3. `~/.config/courier/session.json`
//!
//! Tuning options live in `~/.config/courier/options.json` and fall back to
//! defaults when the file is absent.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{Credentials, SyncKey};
use crate::sync::ErrorBackoff;
use crate::upload::DEFAULT_CHUNK_SIZE;

/// Session filename in the courier config directory
const SESSION_FILE: &str = "session.json";

/// Options filename in the courier config directory
const OPTIONS_FILE: &str = "options.json";

/// Environment variable overriding the session file location
pub const SESSION_FILE_ENV: &str = "COURIER_SESSION_FILE";

/// Everything login produced, as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    pub credentials: Credentials,
    /// Last committed cursor
    #[serde(default)]
    pub sync_key: SyncKey,
    /// Cookies to seed the HTTP transport with, e.g. `webwx_data_ticket`
    #[serde(default)]
    pub cookies: HashMap<String, String>,
}

impl SessionFile {
    /// Load the session from the first location that applies
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf)> {
        let path = Self::locate(explicit)
            .context("No session file: pass a path, set COURIER_SESSION_FILE, or create ~/.config/courier/session.json")?;
        let session = Self::from_file(&path)?;
        Ok((session, path))
    }

    /// Resolve the session file path without reading it
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        let from_env = std::env::var_os(SESSION_FILE_ENV).map(PathBuf::from);
        locate_with(explicit, from_env, Self::default_path())
    }

    /// Load a session from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
            .with_context(|| format!("Failed to load session from {}", path.display()))
    }

    /// Parse a session from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse session JSON")
    }

    /// Write the session back, replacing the file atomically
    pub fn save_to(&self, path: &Path) -> Result<()> {
        config::save_json_file(path, self)
    }

    /// Get the default session file path (~/.config/courier/session.json)
    pub fn default_path() -> Option<PathBuf> {
        config::config_path(SESSION_FILE)
    }
}

fn locate_with(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    default: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = from_env.filter(|p| !p.as_os_str().is_empty()) {
        return Some(path);
    }
    default.filter(|p| p.exists())
}

/// Timeouts, chunk size and loop tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayOptions {
    pub heartbeat_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub chunk_size: u64,
    /// Wait between consecutive loop errors; absent means no wait
    pub error_backoff: Option<ErrorBackoff>,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: 30,
            request_timeout_secs: 60,
            upload_timeout_secs: 120,
            chunk_size: DEFAULT_CHUNK_SIZE,
            error_backoff: None,
        }
    }
}

impl GatewayOptions {
    /// Load `options.json` from the config directory, or the defaults
    pub fn load() -> Result<Self> {
        if config::config_exists(OPTIONS_FILE) {
            return config::load_json(OPTIONS_FILE);
        }
        Ok(Self::default())
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SESSION_JSON: &str = r#"{
        "credentials": {
            "base_request": {"Uin": "1001", "Sid": "sid-1", "Skey": "@crypt_k", "DeviceID": "e1"},
            "pass_ticket": "ticket",
            "self_user_name": "@me",
            "base_url": "https://gw.example/cgi-bin/mmwebwx-bin",
            "sync_url": "https://push.gw.example/cgi-bin/mmwebwx-bin"
        },
        "cookies": {"webwx_data_ticket": "dt"}
    }"#;

    #[test]
    fn test_parse_session_without_cursor() {
        let session = SessionFile::from_json(SESSION_JSON).unwrap();
        assert_eq!(session.credentials.sid(), "sid-1");
        assert!(session.sync_key.is_empty());
        assert_eq!(session.cookies.get("webwx_data_ticket").map(String::as_str), Some("dt"));
    }

    #[test]
    fn test_save_and_reload_keeps_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut session = SessionFile::from_json(SESSION_JSON).unwrap();
        session.sync_key = SyncKey::from_pairs([(1, 42)]);
        session.save_to(&path).unwrap();

        let loaded = SessionFile::from_file(&path).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn test_missing_credentials_is_error() {
        assert!(SessionFile::from_json(r#"{"sync_key": {"Count": 0, "List": []}}"#).is_err());
    }

    #[test]
    fn test_locate_priority() {
        let dir = tempfile::tempdir().unwrap();
        let default = dir.path().join("session.json");
        let explicit = PathBuf::from("/tmp/explicit.json");
        let env = PathBuf::from("/tmp/env.json");

        assert_eq!(
            locate_with(Some(&explicit), Some(env.clone()), Some(default.clone())),
            Some(explicit)
        );
        assert_eq!(locate_with(None, Some(env.clone()), Some(default.clone())), Some(env));

        // The default only counts when it exists.
        assert_eq!(locate_with(None, None, Some(default.clone())), None);
        std::fs::write(&default, SESSION_JSON).unwrap();
        assert_eq!(locate_with(None, None, Some(default.clone())), Some(default));
    }

    #[test]
    fn test_options_defaults_fill_gaps() {
        let options: GatewayOptions =
            serde_json::from_str(r#"{"heartbeat_timeout_secs": 5, "error_backoff": {"base_ms": 10, "max_ms": 100}}"#)
                .unwrap();
        assert_eq!(options.heartbeat_timeout(), Duration::from_secs(5));
        assert_eq!(options.request_timeout(), Duration::from_secs(60));
        assert_eq!(options.chunk_size, 524_288);
        assert_eq!(options.error_backoff.unwrap().delay(2), Duration::from_millis(20));
    }
}
