//! ws-relay: real-time WebSocket relay, entry point.
//!
//! # Usage
//!
//! ```text
//! ws-relay [OPTIONS]
//!
//! Options:
//!   --bind <IP>                 Listener IP address [default: 0.0.0.0]
//!   --port <PORT>               Listener port [default: 3000]
//!   --direct-path <PATH>        Direct broadcast endpoint [default: /ws]
//!   --channel-path <PATH>       Ordered channel endpoint [default: /channel]
//!   --queue-capacity <N>        Channel queue bound [default: 10]
//!   --read-buffer-size <BYTES>  Bytes per read / per relayed message [default: 1024]
//!   --no-echo                   Do not deliver payloads back to their sender
//!   --config <FILE>             TOML file with any of the settings above
//! ```
//!
//! # Precedence
//!
//! CLI flag > environment variable > `--config` file > built-in default.
//!
//! | Variable                   | Flag                 |
//! |----------------------------|----------------------|
//! | `WS_RELAY_BIND`            | `--bind`             |
//! | `WS_RELAY_PORT`            | `--port`             |
//! | `WS_RELAY_DIRECT_PATH`     | `--direct-path`      |
//! | `WS_RELAY_CHANNEL_PATH`    | `--channel-path`     |
//! | `WS_RELAY_QUEUE_CAPACITY`  | `--queue-capacity`   |
//! | `WS_RELAY_READ_BUFFER`     | `--read-buffer-size` |
//! | `WS_RELAY_NO_ECHO`         | `--no-echo`          |
//! | `WS_RELAY_CONFIG`          | `--config`           |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ws_relay::domain::RelayConfig;
use ws_relay::infrastructure::{load_config, run_server};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Real-time WebSocket relay with direct and ordered channel broadcast groups.
///
/// Every flag is optional; an absent flag leaves the value from the config
/// file (or the built-in default) untouched.
#[derive(Debug, Parser)]
#[command(name = "ws-relay", version)]
struct Cli {
    /// IP address to bind the listener to.
    #[arg(long, env = "WS_RELAY_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "WS_RELAY_PORT")]
    port: Option<u16>,

    /// Request path of the direct broadcast endpoint.
    #[arg(long, env = "WS_RELAY_DIRECT_PATH")]
    direct_path: Option<String>,

    /// Request path of the ordered channel endpoint.
    #[arg(long, env = "WS_RELAY_CHANNEL_PATH")]
    channel_path: Option<String>,

    /// Number of channel messages that may wait for the consumer.
    #[arg(long, env = "WS_RELAY_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    /// Maximum bytes per read; larger messages are relayed in pieces.
    #[arg(long, env = "WS_RELAY_READ_BUFFER")]
    read_buffer_size: Option<usize>,

    /// Do not deliver a payload back to the connection that sent it.
    ///
    /// From the environment, unset/empty/`0`/`false`/`no`/`off` keep echo on;
    /// any other value turns it off.
    #[arg(
        long,
        env = "WS_RELAY_NO_ECHO",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    no_echo: bool,

    /// Optional TOML config file.
    #[arg(long, env = "WS_RELAY_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Resolves the final [`RelayConfig`]: file (or defaults), then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, `--bind` is not
    /// an IP address, or the merged configuration fails validation.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => RelayConfig::default(),
        };

        if let Some(bind) = &self.bind {
            let ip: IpAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(path) = self.direct_path {
            config.direct_path = path;
        }
        if let Some(path) = self.channel_path {
            config.channel_path = path;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(size) = self.read_buffer_size {
            config.read_buffer_size = size;
        }
        if self.no_echo {
            config.echo_to_sender = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_relay_config()?;

    info!("ws-relay starting on {}", config.bind_addr);

    // Cleared by Ctrl+C; the accept loop polls it between accepts.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("ws-relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
