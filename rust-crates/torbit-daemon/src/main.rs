//! Torbit Chat Daemon
//!
//! Listens on a TCP port (telnet style) or a Unix socket and relays every
//! chat line to all connected participants.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use torbit_broadcaster::Coordinator;
use tracing::{error, info};

use torbit_daemon::config::DaemonConfig;
use torbit_daemon::server::{ChatListener, ChatServer};
use torbit_daemon::{logging, version};

#[derive(Parser, Debug)]
#[command(name = "torbit-daemon")]
#[command(version, about = "Line-based chat broadcaster")]
struct Args {
    /// Configuration file (created with defaults if missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Console log level, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Override `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Override `server.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Print build metadata and exit
    #[arg(long)]
    build_info: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.build_info {
        print!("{}", version::version_long());
        return Ok(());
    }

    // Load configuration
    let mut config = match &args.config {
        Some(path) => DaemonConfig::load_from(path),
        None => DaemonConfig::load(),
    }
    .context("Failed to load configuration")?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate().context("Invalid configuration")?;

    logging::init(&args.log_level, &config.log_file_location)?;

    info!("Starting {}", version::version_short());
    info!("Configuration loaded from {}", config.config_path.display());
    info!("Audit log: {}", config.log_file_location.display());
    info!(
        "Room: {} (bot: {}, policy: {:?}, echo: {})",
        config.room_label, config.chat_bot, config.chat.name_policy, config.chat.echo_to_sender
    );

    let shutdown = CancellationToken::new();
    let (coordinator, coordinator_task) =
        Coordinator::spawn(config.coordinator_config(), shutdown.clone());

    let listener = ChatListener::bind(&config)
        .await
        .context("Failed to start listener")?;

    let server = ChatServer::new(
        listener,
        coordinator,
        config.bridge_config(),
        shutdown.clone(),
    );

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_token.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let result = server.run().await;

    // Cleanup
    info!("Shutting down...");
    shutdown.cancel();
    if let Err(e) = coordinator_task.await {
        error!("Coordinator task failed: {}", e);
    }
    drop(server);
    info!("Torbit Chat daemon stopped");

    result
}
