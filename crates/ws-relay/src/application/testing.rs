//! In-memory fakes for the transport seams, shared by the unit tests.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::ports::{PayloadSource, PeerSink, RelayError};
use crate::domain::ConnectionId;

pub(crate) fn conn_id(port: u16) -> ConnectionId {
    ConnectionId::new(SocketAddr::from(([127, 0, 0, 1], port)))
}

/// Sink that forwards every delivered payload into an unbounded channel.
pub(crate) struct ChannelSink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelSink {
    pub(crate) fn new() -> (Arc<dyn PeerSink>, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl PeerSink for ChannelSink {
    fn send(&self, payload: Vec<u8>) -> Result<(), RelayError> {
        self.tx
            .send(payload)
            .map_err(|_| RelayError::Send("receiver dropped".to_string()))
    }
}

/// Sink that discards payloads and raises a flag when the last handle to it
/// is dropped.
pub(crate) struct DropFlagSink {
    dropped: Arc<AtomicBool>,
}

impl DropFlagSink {
    pub(crate) fn new() -> (Arc<dyn PeerSink>, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        let sink = Self {
            dropped: Arc::clone(&dropped),
        };
        (Arc::new(sink), dropped)
    }
}

impl PeerSink for DropFlagSink {
    fn send(&self, _payload: Vec<u8>) -> Result<(), RelayError> {
        Ok(())
    }
}

impl Drop for DropFlagSink {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Source that replays a fixed script, then reports end of stream.
pub(crate) struct ScriptedSource {
    steps: VecDeque<Result<Option<Vec<u8>>, RelayError>>,
}

impl ScriptedSource {
    pub(crate) fn new(steps: Vec<Result<Option<Vec<u8>>, RelayError>>) -> Self {
        Self {
            steps: steps.into(),
        }
    }
}

#[async_trait]
impl PayloadSource for ScriptedSource {
    async fn read(&mut self) -> Result<Option<Vec<u8>>, RelayError> {
        self.steps.pop_front().unwrap_or(Ok(None))
    }
}

/// Source driven by the test: every sent `Vec<u8>` becomes one read, and
/// dropping the sender is end of stream.
pub(crate) struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl ChannelSource {
    pub(crate) fn new() -> (Self, mpsc::UnboundedSender<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }
}

#[async_trait]
impl PayloadSource for ChannelSource {
    async fn read(&mut self) -> Result<Option<Vec<u8>>, RelayError> {
        Ok(self.rx.recv().await)
    }
}

/// Waits up to one second for the next delivered payload.
pub(crate) async fn recv_within(rx: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> Vec<u8> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for a payload")
        .expect("sink channel closed")
}

/// Asserts that nothing is delivered within a short grace period.
pub(crate) async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<Vec<u8>>) {
    let extra = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
    assert!(extra.is_err(), "unexpected payload: {extra:?}");
}
