//! Agora chat terminal client.
//!
//! # Usage
//!
//! ```bash
//! AGORA_TOKEN=... agora-chat --group 7 --room 3 --username alice
//!
//! # Against a local backend, logging to a file
//! agora-chat --server http://localhost:8080 --api http://localhost:8080/api \
//!     --group 7 --room 3 --log-file agora.log --log-level debug
//! ```

use std::{fs::File, path::PathBuf, sync::Mutex};

use agora_app::{AppConfig, Runtime};
use agora_client::{
    ChatSession, Credential, SessionOptions,
    rest::{DEFAULT_API_BASE, RestChatApi},
    system_env::SystemEnv,
    transport::websocket_url,
};
use agora_tui::TerminalDriver;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Agora chat terminal client
#[derive(Parser, Debug)]
#[command(name = "agora-chat")]
#[command(about = "Terminal client for one Agora group chat room")]
#[command(version)]
struct Args {
    /// Chat server base URL (the WebSocket endpoint is derived from it)
    #[arg(short, long, default_value = "https://forum.rjsgud.com")]
    server: String,

    /// REST API base URL
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api: String,

    /// Group id
    #[arg(short, long)]
    group: u64,

    /// Chat room id
    #[arg(short, long)]
    room: u64,

    /// Bearer token
    #[arg(long, env = "AGORA_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Your username; your own messages are not marked as read
    #[arg(short, long)]
    username: Option<String>,

    /// Write logs to this file (the terminal is taken by the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
        let file = File::create(path)?;

        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(filter)
            .init();
    }

    tracing::info!(group = args.group, room = args.room, "agora chat starting");

    let credential = args.token.and_then(Credential::new);
    if credential.is_none() {
        tracing::warn!("no token given, live chat disabled");
    }

    let options = SessionOptions::for_room(args.group, args.room);
    let live = ChatSession::spawn(websocket_url(&args.server), options, &credential, SystemEnv);
    let api = RestChatApi::new(args.api, credential);

    let config = AppConfig {
        group: args.group,
        room: args.room,
        username: args.username,
        ..AppConfig::default()
    };

    let driver = TerminalDriver::new()?;
    let runtime = Runtime::new(driver, SystemEnv, config, live, api)?;

    Ok(runtime.run().await?)
}
