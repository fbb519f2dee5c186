//! Command implementations
//!
//! The core is blocking, so every call into it runs on tokio's blocking pool.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use courier::{GatewayOptions, InboundMessage, LogErrorSink, MediaKind, Session, SessionFile, StopReason};

/// A session together with where it was loaded from
pub struct LoadedSession {
    pub session: Session,
    pub file: SessionFile,
    pub path: PathBuf,
}

pub fn load_session(explicit: Option<&Path>) -> Result<LoadedSession> {
    let (file, path) = SessionFile::load(explicit)?;
    let options = GatewayOptions::load().context("Failed to load options.json")?;
    info!("Loaded session for uin {} from {}", file.credentials.uin(), path.display());

    let session = Session::from_file(file.clone(), options);
    Ok(LoadedSession { session, file, path })
}

/// Run the loop until Ctrl-C or the gateway ends the session
pub async fn listen(loaded: LoadedSession, json: bool) -> Result<()> {
    let LoadedSession {
        session,
        mut file,
        path,
    } = loaded;

    let handle = session
        .session_loop()
        .on_stop(|reason| info!("Loop finished: {:?}", reason))
        .spawn(
            move |msg: InboundMessage| -> anyhow::Result<()> {
                print_message(&msg, json)?;
                Ok(())
            },
            LogErrorSink,
        )
        .context("Failed to start session loop")?;
    let stop = handle.stop_handle();

    let mut join = tokio::task::spawn_blocking(move || handle.join());
    let joined = tokio::select! {
        joined = &mut join => joined,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Stopping; waiting for the in-flight request to finish");
            stop.stop();
            join.await
        }
    };
    let reason = joined
        .context("Session loop task failed")?
        .map_err(|_| anyhow!("Session loop panicked"))?;

    file.sync_key = session.cursor();
    file.save_to(&path)?;
    info!("Saved cursor {} to {}", file.sync_key, path.display());

    match reason {
        StopReason::Requested => Ok(()),
        StopReason::SessionInvalidated => {
            warn!("The gateway logged this session out; log in again to continue");
            Ok(())
        }
        StopReason::GatewayStatus(status) => Err(anyhow!("Gateway ended the session with status {status}")),
    }
}

pub async fn send_text(loaded: LoadedSession, to: String, text: String) -> Result<()> {
    let sender = loaded.session.sender();
    let response = tokio::task::spawn_blocking(move || sender.send_text(&text, &to))
        .await
        .context("Send task failed")??;

    println!("{}", response.msg_id.unwrap_or_default());
    Ok(())
}

pub async fn upload(loaded: LoadedSession, path: PathBuf, to: String, kind: MediaKind) -> Result<()> {
    let uploader = loaded.session.uploader();
    let result = tokio::task::spawn_blocking(move || uploader.upload_file(&path, to, kind))
        .await
        .context("Upload task failed")??;

    println!("{}", result.media_id.unwrap_or_default());
    Ok(())
}

fn print_message(msg: &InboundMessage, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(msg)?);
        return Ok(());
    }

    let at = msg
        .sent_at()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    println!(
        "[{}] {} -> {} (type {}): {}",
        at, msg.from_user_name, msg.to_user_name, msg.msg_type, msg.content
    );
    Ok(())
}
