//! The client façade: owns the TCP connection, runs a background read loop
//! against the core codec, and exposes both an outbound send API and an
//! inbound event stream. Auto-replies to PING with PONG and echoes CLOSE,
//! per spec §4.6 — the caller never has to implement the control-frame
//! handshake itself.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::config::WebSocketConfig;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::Error;
use crate::event::{Event, EventStream};
use crate::frame::OpCode;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A running client connection. Dropping it closes the write half; the
/// background read task exits on its own once the socket reads EOF, a
/// CLOSE frame arrives, a decode error occurs, or `config.read_timeout`
/// elapses waiting for more bytes.
pub struct Connection {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    encoder: Encoder,
    events: EventStream,
    closed: Arc<AtomicBool>,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, config: WebSocketConfig) -> Self {
        let (read_half, write_half) = stream.into_split();
        let writer = Arc::new(Mutex::new(write_half));
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(read_loop(read_half, tx, writer.clone(), config, closed.clone()));

        Connection {
            writer,
            encoder: Encoder::new(true),
            events: EventStream::new(rx),
            closed,
        }
    }

    /// The stream of inbound events: one `Message`/`Ping`/`Pong`/`Close`/
    /// `Error` per thing the background task observed.
    pub fn events(&mut self) -> &mut EventStream {
        &mut self.events
    }

    pub async fn send_text(&self, payload: &str) -> Result<(), Error> {
        let frame = self.encoder.build_text_frame(payload.as_bytes())?;
        self.write_frame(frame).await
    }

    pub async fn send_binary(&self, payload: &[u8]) -> Result<(), Error> {
        let frame = self.encoder.build_binary_frame(payload)?;
        self.write_frame(frame).await
    }

    pub async fn send_ping(&self, payload: &[u8]) -> Result<(), Error> {
        let frame = self.encoder.build_ping_frame(payload)?;
        self.write_frame(frame).await
    }

    pub async fn send_close(&self, payload: &[u8]) -> Result<(), Error> {
        let frame = self.encoder.build_close_frame(payload)?;
        self.write_frame(frame).await
    }

    async fn write_frame(&self, frame: Vec<u8>) -> Result<(), Error> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::ConnectionClosed);
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        Ok(())
    }
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    tx: mpsc::Sender<Event>,
    writer: Arc<Mutex<OwnedWriteHalf>>,
    config: WebSocketConfig,
    closed: Arc<AtomicBool>,
) {
    let mut decoder = Decoder::new();
    let encoder = Encoder::new(true);
    let read_chunk = config.max_frame_size.min(64 * 1024).max(1024);
    let mut buf = vec![0u8; read_chunk];
    let mut message_accumulated: usize = 0;

    'read: loop {
        // Deliberately a plain `read`, not `read_exact` on a fixed size —
        // whatever the kernel hands back gets fed straight to the decoder,
        // which is what actually exercises its chunk-invariance. Bounded by
        // `read_timeout` so a peer that opens a frame and then goes silent
        // doesn't hang this loop forever.
        let n = match timeout(config.read_timeout, read_half.read(&mut buf)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(err)) => {
                log::warn!("read loop: socket error: {err}");
                let _ = tx.send(Event::Error(Error::from(err))).await;
                break;
            }
            Err(_elapsed) => {
                log::warn!("read loop: timed out after {:?} waiting for data", config.read_timeout);
                let err = io::Error::new(io::ErrorKind::TimedOut, "read timed out");
                let _ = tx.send(Event::Error(Error::from(err))).await;
                break;
            }
        };

        let mut frames = Vec::new();
        let result = decoder.feed(&buf[..n], |opcode, payload, fin| {
            frames.push((opcode, payload, fin));
        });

        if let Err(err) = result {
            log::warn!("read loop: decode error, closing connection: {err}");
            let _ = tx.send(Event::Error(Error::from(err))).await;
            break;
        }

        for (opcode, payload, fin) in frames {
            match opcode {
                OpCode::Ping => {
                    if let Ok(pong) = encoder.build_pong_frame(&payload) {
                        let mut w = writer.lock().await;
                        let _ = w.write_all(&pong).await;
                    }
                    if tx.send(Event::Ping(payload)).await.is_err() {
                        break 'read;
                    }
                }
                OpCode::Pong => {
                    if tx.send(Event::Pong(payload)).await.is_err() {
                        break 'read;
                    }
                }
                OpCode::Close => {
                    log::debug!("read loop: received CLOSE, echoing and shutting down");
                    if let Ok(echo) = encoder.build_close_frame(&payload) {
                        let mut w = writer.lock().await;
                        let _ = w.write_all(&echo).await;
                    }
                    let _ = tx.send(Event::Close(payload)).await;
                    break 'read;
                }
                OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                    message_accumulated += payload.len();
                    if message_accumulated > config.max_message_size {
                        log::warn!(
                            "read loop: fragmented message reached {message_accumulated} bytes, \
                             exceeding max_message_size {}",
                            config.max_message_size
                        );
                        let _ = tx
                            .send(Event::Error(Error::MaxMessageSize(
                                message_accumulated,
                                config.max_message_size,
                            )))
                            .await;
                        break 'read;
                    }

                    if fin {
                        message_accumulated = 0;
                    }

                    if tx.send(Event::Message { opcode, payload, fin }).await.is_err() {
                        break 'read;
                    }
                }
            }
        }
    }

    closed.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client_task = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server_stream, _) = listener.accept().await.unwrap();
        let client_stream = client_task.await.unwrap();

        let connection = Connection::new(client_stream, WebSocketConfig::default());
        (connection, server_stream)
    }

    #[tokio::test]
    async fn auto_replies_pong_to_ping() {
        let (mut connection, mut server) = connected_pair().await;

        let ping = Encoder::new(false).build_ping_frame(b"hi").unwrap();
        server.write_all(&ping).await.unwrap();

        match connection.events().next().await {
            Some(Event::Ping(payload)) => assert_eq!(payload, b"hi"),
            other => panic!("expected Ping event, got {other:?}"),
        }

        let mut reply = [0u8; 2 + 2];
        server.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[0], 0x8A); // FIN=1, opcode=Pong
        assert_eq!(&reply[2..4], b"hi");
    }

    #[tokio::test]
    async fn echoes_close_and_surfaces_event() {
        let (mut connection, mut server) = connected_pair().await;

        let close = Encoder::new(false).build_close_frame(&[]).unwrap();
        server.write_all(&close).await.unwrap();

        match connection.events().next().await {
            Some(Event::Close(payload)) => assert!(payload.is_empty()),
            other => panic!("expected Close event, got {other:?}"),
        }

        let mut reply = [0u8; 2];
        server.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[0], 0x88); // FIN=1, opcode=Close
        assert_eq!(reply[1], 0x00);
    }

    #[tokio::test]
    async fn surfaces_text_message_events() {
        let (mut connection, mut server) = connected_pair().await;

        let text = Encoder::new(false).build_text_frame(b"hello").unwrap();
        server.write_all(&text).await.unwrap();

        match connection.events().next().await {
            Some(Event::Message { opcode, payload, fin }) => {
                assert_eq!(opcode, OpCode::Text);
                assert_eq!(payload, b"hello");
                assert!(fin);
            }
            other => panic!("expected Message event, got {other:?}"),
        }
    }

    /// Builds a raw unmasked frame with an arbitrary FIN bit, for payloads
    /// under 126 bytes. `Encoder::build_frame` always sets FIN=1, so
    /// fragmented (FIN=0) frames needed to exercise reassembly-adjacent
    /// behavior are hand-built here, the same way `decoder.rs`'s tests do.
    fn build_raw_frame(fin: bool, opcode: OpCode, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(2 + payload.len());
        let fin_bit = if fin { 0x80 } else { 0x00 };
        frame.push(fin_bit | opcode.as_u8());
        frame.push(payload.len() as u8);
        frame.extend_from_slice(payload);
        frame
    }

    #[tokio::test]
    async fn rejects_fragmented_message_past_max_size() {
        let mut config = WebSocketConfig::default();
        config.max_message_size = 4;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client_task = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (mut server, _) = listener.accept().await.unwrap();
        let client_stream = client_task.await.unwrap();

        let mut connection = Connection::new(client_stream, config);

        let first = build_raw_frame(false, OpCode::Text, b"over");
        server.write_all(&first).await.unwrap();
        let second = build_raw_frame(true, OpCode::Continuation, b"flow");
        server.write_all(&second).await.unwrap();

        let first_event = connection.events().next().await;
        assert!(matches!(
            first_event,
            Some(Event::Message { fin: false, .. })
        ));

        match connection.events().next().await {
            Some(Event::Error(Error::MaxMessageSize(accumulated, limit))) => {
                assert!(accumulated > limit);
                assert_eq!(limit, 4);
            }
            other => panic!("expected MaxMessageSize error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_after_close_returns_connection_closed() {
        let (connection, mut server) = connected_pair().await;

        let close = Encoder::new(false).build_close_frame(&[]).unwrap();
        server.write_all(&close).await.unwrap();

        // Give the background read loop a beat to process the CLOSE and
        // mark the connection closed before we try to send on it.
        for _ in 0..100 {
            if connection.closed.load(Ordering::Relaxed) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let result = connection.send_text("too late").await;
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }
}
