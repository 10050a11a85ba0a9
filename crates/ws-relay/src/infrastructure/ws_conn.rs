//! WebSocket adapters for the [`PeerSink`] and [`PayloadSource`] seams.
//!
//! After the handshake, a `WebSocketStream` is split into two halves:
//!
//! - The write half is moved into a writer task that owns it outright.  The
//!   task drains an unbounded outbound queue, one frame at a time, so frames
//!   leave in exactly the order they were queued.  The [`WsPeerSink`] handle
//!   registered in the connection's group only holds the queue's sender.
//! - The read half goes into a [`WsPayloadSource`], owned by the connection's
//!   relay loop.
//!
//! When the last [`WsPeerSink`] handle is dropped (the registry releases its
//! copy on deactivation) the writer finishes the close handshake and exits,
//! which drops the write half and, with the read half, the socket itself.
//!
//! # Reads and frame boundaries
//!
//! The relay deals in raw bytes with a fixed read size.  A Text or Binary
//! message is turned into bytes and handed out `read_buffer_size` bytes at a
//! time, so a 2500-byte message with a 1024-byte buffer produces three reads
//! (1024 + 1024 + 452).  Empty messages produce no read at all.
//!
//! # Outgoing frame type
//!
//! Payloads that are valid UTF-8 are written as Text frames, anything else
//! as Binary.  A chunk that cuts a multi-byte character in half is therefore
//! sent as Binary.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::application::{PayloadSource, PeerSink, RelayError};
use crate::domain::ConnectionId;

// ── Write side ────────────────────────────────────────────────────────────────

/// Handle to the outbound queue of one WebSocket connection.
pub struct WsPeerSink {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl WsPeerSink {
    /// Spawns the writer task for `write` and returns the handle feeding it.
    pub fn spawn<S>(write: SplitSink<WebSocketStream<S>, WsMessage>, id: ConnectionId) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, queue) = mpsc::unbounded_channel();
        // Fire-and-forget: the task ends on its own once every handle is gone
        // or the peer stops accepting writes.
        tokio::spawn(write_frames(write, queue, id));
        Self { outbound }
    }
}

impl PeerSink for WsPeerSink {
    fn send(&self, payload: Vec<u8>) -> Result<(), RelayError> {
        self.outbound
            .send(payload)
            .map_err(|_| RelayError::Send("writer has shut down".to_string()))
    }
}

/// Writes queued payloads to the socket until the queue closes or a write
/// fails, then closes the write half.
async fn write_frames<S>(
    mut write: SplitSink<WebSocketStream<S>, WsMessage>,
    mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
    id: ConnectionId,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    while let Some(payload) = queue.recv().await {
        if let Err(e) = write.send(into_frame(payload)).await {
            // Dropping `queue` makes every later `send` on the handle fail.
            warn!("write to {id} failed: {e}");
            return;
        }
    }

    // Every handle is gone: flush any pending close reply, or start the close
    // handshake ourselves.
    if let Err(e) = write.close().await {
        debug!("closing {id}: {e}");
    }
    debug!("writer for {id} finished");
}

fn into_frame(payload: Vec<u8>) -> WsMessage {
    match String::from_utf8(payload) {
        Ok(text) => WsMessage::Text(text),
        Err(not_utf8) => WsMessage::Binary(not_utf8.into_bytes()),
    }
}

// ── Read side ─────────────────────────────────────────────────────────────────

/// Read half of a WebSocket connection, chunked to a fixed read size.
pub struct WsPayloadSource<S> {
    read: SplitStream<WebSocketStream<S>>,
    pending: Option<Vec<u8>>,
    read_buffer_size: usize,
}

impl<S> WsPayloadSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(read: SplitStream<WebSocketStream<S>>, read_buffer_size: usize) -> Self {
        Self {
            read,
            pending: None,
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    /// Splits off the next chunk of `buf`, keeping the rest for later reads.
    fn take_chunk(&mut self, mut buf: Vec<u8>) -> Vec<u8> {
        if buf.len() > self.read_buffer_size {
            let rest = buf.split_off(self.read_buffer_size);
            self.pending = Some(rest);
        }
        buf
    }
}

#[async_trait]
impl<S> PayloadSource for WsPayloadSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read(&mut self) -> Result<Option<Vec<u8>>, RelayError> {
        loop {
            if let Some(buf) = self.pending.take() {
                return Ok(Some(self.take_chunk(buf)));
            }

            let bytes = match self.read.next().await {
                None => return Ok(None),
                Some(Ok(WsMessage::Text(text))) => text.into_bytes(),
                Some(Ok(WsMessage::Binary(data))) => data,
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!("close frame received: {frame:?}");
                    return Ok(None);
                }
                // Pings are answered by tungstenite itself.
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {
                    continue
                }
                Some(Err(e)) if ends_stream(&e) => {
                    debug!("stream ended by transport: {e}");
                    return Ok(None);
                }
                Some(Err(e)) => return Err(RelayError::Read(e.to_string())),
            };

            if !bytes.is_empty() {
                self.pending = Some(bytes);
            }
        }
    }
}

/// Errors after which the WebSocket can never yield another message.
fn ends_stream(e: &WsError) -> bool {
    matches!(
        e,
        WsError::ConnectionClosed | WsError::AlreadyClosed | WsError::Io(_) | WsError::Protocol(_)
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use super::*;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::error::{CapacityError, ProtocolError};
    use tokio_tungstenite::tungstenite::protocol::{Role, WebSocketConfig};

    /// An in-memory server/client WebSocket pair (no handshake needed).
    async fn ws_pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        ws_pair_with(None).await
    }

    async fn ws_pair_with(
        server_config: Option<WebSocketConfig>,
    ) -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, server_config).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (server, client)
    }

    fn source(
        server: WebSocketStream<DuplexStream>,
        read_buffer_size: usize,
    ) -> WsPayloadSource<DuplexStream> {
        let (_write, read) = server.split();
        WsPayloadSource::new(read, read_buffer_size)
    }

    fn peer_id() -> ConnectionId {
        ConnectionId::new(SocketAddr::from(([127, 0, 0, 1], 5000)))
    }

    async fn next_frame(client: &mut WebSocketStream<DuplexStream>) -> WsMessage {
        tokio::time::timeout(Duration::from_secs(1), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read error")
    }

    #[tokio::test]
    async fn test_text_message_is_one_read() {
        let (server, mut client) = ws_pair().await;
        let mut src = source(server, 1024);

        client.send(WsMessage::Text("hello".to_string())).await.unwrap();

        assert_eq!(src.read().await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_large_message_is_split_into_buffer_sized_reads() {
        // Arrange: 2500 bytes through a 1024-byte read buffer
        let (server, mut client) = ws_pair().await;
        let mut src = source(server, 1024);
        let data: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();

        // Act
        client.send(WsMessage::Binary(data.clone())).await.unwrap();
        let first = src.read().await.unwrap().unwrap();
        let second = src.read().await.unwrap().unwrap();
        let third = src.read().await.unwrap().unwrap();

        // Assert
        assert_eq!(first.len(), 1024);
        assert_eq!(second.len(), 1024);
        assert_eq!(third.len(), 452);
        assert_eq!([first, second, third].concat(), data);
    }

    #[tokio::test]
    async fn test_control_frames_and_empty_messages_are_skipped() {
        let (server, mut client) = ws_pair().await;
        let mut src = source(server, 1024);

        client.send(WsMessage::Ping(b"are you there".to_vec())).await.unwrap();
        client.send(WsMessage::Binary(Vec::new())).await.unwrap();
        client.send(WsMessage::Binary(b"data".to_vec())).await.unwrap();

        assert_eq!(src.read().await.unwrap(), Some(b"data".to_vec()));
    }

    #[tokio::test]
    async fn test_close_frame_is_end_of_stream() {
        let (server, mut client) = ws_pair().await;
        let mut src = source(server, 1024);

        client.close(None).await.unwrap();

        assert_eq!(src.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropped_peer_is_end_of_stream() {
        let (server, client) = ws_pair().await;
        let mut src = source(server, 1024);

        drop(client);

        assert_eq!(src.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_message_is_a_read_error_not_end_of_stream() {
        // Arrange: the server side rejects messages above 16 bytes
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(16);
        let (server, mut client) = ws_pair_with(Some(config)).await;
        let mut src = source(server, 1024);

        // Act
        client.send(WsMessage::Binary(vec![7; 64])).await.unwrap();
        let first = src.read().await;

        // Assert: reported as a failed read, which the relay loop retries
        assert!(matches!(first, Err(RelayError::Read(_))), "got {first:?}");

        // The next read either yields the following message or reports end
        // of stream; it never repeats the failure.
        client.send(WsMessage::Text("ok".to_string())).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), src.read())
            .await
            .expect("read after the failure must not hang");
        assert!(
            matches!(&second, Ok(Some(bytes)) if bytes == b"ok") || matches!(second, Ok(None)),
            "got {second:?}"
        );
    }

    #[test]
    fn test_transport_errors_end_the_stream() {
        assert!(ends_stream(&WsError::ConnectionClosed));
        assert!(ends_stream(&WsError::AlreadyClosed));
        assert!(ends_stream(&WsError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset
        ))));
        assert!(ends_stream(&WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake
        )));
    }

    #[test]
    fn test_capacity_error_does_not_end_the_stream() {
        let too_long = WsError::Capacity(CapacityError::MessageTooLong {
            size: 64,
            max_size: 16,
        });

        assert!(!ends_stream(&too_long));
    }

    #[tokio::test]
    async fn test_sink_sends_utf8_as_text_frame() {
        let (server, mut client) = ws_pair().await;
        let (write, _read) = server.split();
        let sink = WsPeerSink::spawn(write, peer_id());

        sink.send("héllo".as_bytes().to_vec()).unwrap();

        assert_eq!(next_frame(&mut client).await, WsMessage::Text("héllo".to_string()));
    }

    #[tokio::test]
    async fn test_sink_sends_non_utf8_as_binary_frame() {
        let (server, mut client) = ws_pair().await;
        let (write, _read) = server.split();
        let sink = WsPeerSink::spawn(write, peer_id());

        sink.send(vec![0xde, 0xad, 0xbe, 0xef]).unwrap();

        assert_eq!(
            next_frame(&mut client).await,
            WsMessage::Binary(vec![0xde, 0xad, 0xbe, 0xef])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sink_writes_frames_in_queue_order() {
        // Arrange
        let (server, mut client) = ws_pair().await;
        let (write, _read) = server.split();
        let sink = WsPeerSink::spawn(write, peer_id());

        // Act: queue a burst without waiting in between
        for i in 0..500u32 {
            sink.send(i.to_string().into_bytes()).unwrap();
        }

        // Assert
        for i in 0..500u32 {
            assert_eq!(next_frame(&mut client).await, WsMessage::Text(i.to_string()));
        }
    }

    #[tokio::test]
    async fn test_dropping_last_handle_closes_connection() {
        let (server, mut client) = ws_pair().await;
        let (write, _read) = server.split();
        let sink = WsPeerSink::spawn(write, peer_id());
        sink.send(b"last words".to_vec()).unwrap();

        drop(sink);

        assert_eq!(next_frame(&mut client).await, WsMessage::Text("last words".to_string()));
        assert!(matches!(next_frame(&mut client).await, WsMessage::Close(_)));
    }

    #[tokio::test]
    async fn test_sink_reports_error_once_peer_is_gone() {
        let (server, client) = ws_pair().await;
        let (write, _read) = server.split();
        let sink = WsPeerSink::spawn(write, peer_id());
        drop(client);

        // The first writes may still land in the duplex buffer; keep queueing
        // until the writer has hit the broken pipe and shut down.
        let mut failed = false;
        for _ in 0..100 {
            if sink.send(b"anyone?".to_vec()).is_err() {
                failed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(failed);
    }
}
