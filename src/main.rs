//! Switchboard — JSON-RPC 2.0 dispatcher server
//!
//! Serves the demo method set over WebSocket (one dispatcher per connection)
//! or over stdin/stdout as newline-delimited JSON.
//!
//! Usage:
//!   switchboard                       # WebSocket on 127.0.0.1:7070
//!   switchboard --port 8080           # Custom port
//!   switchboard --stdio               # One dispatcher on stdin/stdout
//!   switchboard --verbose --log-file  # Debug logs to ~/.switchboard/logs/switchboard.log

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use switchboard::demo;
use switchboard_server::Dispatcher;
use switchboard_transport::{LineChannel, TransportConfig, TransportServer, WsChannel};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "switchboard", about = "Switchboard — JSON-RPC 2.0 dispatcher")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "7070")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "32")]
    max_connections: usize,

    /// Serve a single dispatcher on stdin/stdout instead of WebSocket
    #[arg(long)]
    stdio: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.switchboard/logs/switchboard.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Some(ref log_file_arg) = cli.log_file {
        let log_path = if log_file_arg == "DEFAULT" {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".switchboard/logs/switchboard.log")
        } else {
            PathBuf::from(log_file_arg)
        };

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        // stdout may carry JSON-RPC traffic
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}

async fn serve_stdio() {
    let (channel, writer) = LineChannel::stdio();
    let dispatcher = Dispatcher::attach_with(channel, demo::register);
    info!("Serving {} method(s) on stdio", dispatcher.methods().len());

    dispatcher.closed().await;
    drop(dispatcher);
    // The writer finishes once the dispatcher's channel is dropped.
    let _ = writer.await;
    info!("stdin closed, exiting");
}

async fn serve_websocket(cli: &Cli) -> anyhow::Result<()> {
    let config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        max_connections: Some(cli.max_connections),
        verbose_logging: cli.verbose,
    };

    let mut transport = TransportServer::start(config, |channel: WsChannel| {
        let client_id = channel.client_id().to_string();
        let _dispatcher = Dispatcher::attach_with(channel, demo::register);
        debug!("Dispatcher attached for {client_id}");
    })
    .await
    .context("Failed to start transport server")?;

    eprintln!();
    eprintln!("  Switchboard listening on ws://{}:{}/ws", cli.hostname, transport.port());
    eprintln!("  Health:     http://{}:{}/health", cli.hostname, transport.port());
    eprintln!();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    transport.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    if cli.stdio {
        serve_stdio().await;
        Ok(())
    } else {
        serve_websocket(&cli).await
    }
}
