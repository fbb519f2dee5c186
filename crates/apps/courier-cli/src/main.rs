//! Courier - command-line runner for a gateway session
//!
//! Loads a stored session, then either listens for inbound messages until
//! Ctrl-C or the gateway ends the session, or performs a single send/upload.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::error;

use courier::MediaKind;

mod commands;

/// Courier - gateway session runner
#[derive(Debug, PartialEq, Parser)]
#[command(name = "courier")]
#[command(version, about = "Run a gateway session: listen, send or upload")]
struct Cli {
    /// Session file (default: $COURIER_SESSION_FILE, then ~/.config/courier/session.json)
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Run the session loop and print inbound messages
    Listen {
        /// Print each message as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Send a text message
    SendText {
        /// Recipient user name (empty sends to filehelper)
        to: String,
        text: String,
    },

    /// Upload a file and print its media id
    Upload {
        path: PathBuf,
        to: String,
        /// doc, pic or video
        #[arg(default_value = "doc", value_parser = parse_kind)]
        kind: MediaKind,
    },
}

fn parse_kind(s: &str) -> Result<MediaKind, String> {
    s.parse()
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let loaded = commands::load_session(cli.session.as_deref())?;

    match cli.command {
        Command::Listen { json } => commands::listen(loaded, json).await,
        Command::SendText { to, text } => commands::send_text(loaded, to, text).await,
        Command::Upload { path, to, kind } => commands::upload(loaded, path, to, kind).await,
    }
}
