//! WebSocket server: accept loop, endpoint dispatch, per-connection tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections.
//! 3. Upgrading each one to a WebSocket, reading the request path during the
//!    handshake to decide between the direct and channel endpoint (anything
//!    else is refused with `404 Not Found`).
//! 4. Handing the split connection to the matching relay loop in its own task.
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! The accept loop never waits on a connection: it spawns a task and goes
//! straight back to `accept()`, so one client's relay loop cannot hold up the
//! next client.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::application::{run_channel_relay, run_direct_relay, PeerSink, RelayHub};
use crate::domain::{ConnectionId, Group, RelayConfig};
use crate::infrastructure::ws_conn::{WsPayloadSource, WsPeerSink};

/// How long `accept()` may block before the `running` flag is checked again.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `config.bind_addr`, starts a [`RelayHub`], and serves until
/// `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound (port in use, missing
/// permission, ...).
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind relay listener on {}", config.bind_addr))?;

    info!(
        "relay listening on {} (direct: {}, channel: {})",
        config.bind_addr, config.direct_path, config.channel_path
    );

    let hub = Arc::new(RelayHub::start(config));
    serve(listener, hub, running).await
}

/// Runs the accept loop on an already bound listener.
///
/// Split out from [`run_server`] so callers can bind port 0 and learn the
/// real address before serving.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<RelayHub>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new TCP connection from {peer_addr}");
                // One task per connection so a slow handshake or a long
                // relay loop never blocks the next `accept()`.
                let hub = Arc::clone(&hub);
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, hub).await;
                });
            }
            Ok(Err(e)) => {
                // e.g. too many open file descriptors; keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {
                // No connection within the poll interval.
            }
        }
    }

    Ok(())
}

// ── Per-connection handler ────────────────────────────────────────────────────

/// Entry point of each per-connection task; logs how the connection ended.
async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, hub: Arc<RelayHub>) {
    match run_connection(stream, peer_addr, &hub).await {
        Ok(()) => debug!("connection {peer_addr} closed"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
    }
}

/// Completes the handshake and runs the relay loop for the chosen endpoint.
///
/// # Errors
///
/// Returns an error if the handshake fails (including refused paths) or the
/// relay loop reports one.
async fn run_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: &RelayHub,
) -> anyhow::Result<()> {
    let config = hub.config();
    let mut route: Option<Group> = None;

    // ── Step 1: Complete the WebSocket handshake ──────────────────────────────
    //
    // The request path is only visible inside the handshake callback, so the
    // endpoint is picked there.  Unknown paths are refused before upgrading.
    let ws_stream = accept_hdr_async(stream, |request: &Request, response: Response| {
        let path = request.uri().path();
        match config.route_for(path) {
            Some(group) => {
                route = Some(group);
                Ok(response)
            }
            None => {
                debug!("{peer_addr} requested unknown endpoint {path}");
                Err(not_found(path))
            }
        }
    })
    .await
    .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let group = route.context("handshake accepted without an endpoint")?;
    let id = ConnectionId::new(peer_addr);

    // ── Step 2: Split the connection ──────────────────────────────────────────
    //
    // The write half moves into its own writer task; the registry only ever
    // sees the queue handle in front of it.  The read half stays with the
    // relay loop below.
    let (write, read) = ws_stream.split();
    let sink: Arc<dyn PeerSink> = Arc::new(WsPeerSink::spawn(write, id.clone()));
    let source = WsPayloadSource::new(read, config.read_buffer_size);

    // ── Step 3: Run the endpoint's relay loop until end of stream ─────────────
    //
    // The loop deactivates the connection on the way out, which releases the
    // last sink handle and lets the writer close the socket.
    match group {
        Group::Direct => run_direct_relay(hub, id, source, sink).await?,
        Group::Channel => run_channel_relay(hub, id, source, sink).await?,
    }
    Ok(())
}

/// Handshake rejection for paths that are neither endpoint.
fn not_found(path: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(format!("no relay endpoint at {path}")));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

// ── Tests ─────────────────────────────────────────────────────────────────────
