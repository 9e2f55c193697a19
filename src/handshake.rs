//! Client-side opening handshake: RFC 6455 §1.3's minimal HTTP/1.1 upgrade
//! dance, nothing past it. No subprotocol/extension negotiation, no TLS.

use base64::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::WebSocketConfig;
use crate::connection::Connection;
use crate::error::Error;

const UUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Opens a TCP connection to `url`, performs the upgrade handshake, and
/// returns a running [`Connection`]. `url` must use the `ws` scheme —
/// `wss` is rejected outright since this client does not speak TLS.
pub async fn connect(url: &str, config: WebSocketConfig) -> Result<Connection, Error> {
    let parsed = Url::parse(url)?;

    match parsed.scheme() {
        "ws" => {}
        "wss" => return Err(Error::TlsNotSupported),
        _ => return Err(Error::InvalidSchemeUrl),
    }

    let host = parsed.host_str().ok_or(Error::UrlNoHost)?.to_string();
    let port = parsed.port_or_known_default().unwrap_or(80);
    let path = match parsed.query() {
        Some(q) => format!("{}?{}", parsed.path(), q),
        None => parsed.path().to_string(),
    };

    let stream = timeout(config.handshake_timeout, TcpStream::connect((host.as_str(), port)))
        .await
        .map_err(|_| Error::HandshakeTimeout)??;

    timeout(
        config.handshake_timeout,
        perform_handshake(stream, &host, port, &path, config),
    )
    .await
    .map_err(|_| Error::HandshakeTimeout)?
}

async fn perform_handshake(
    mut stream: TcpStream,
    host: &str,
    port: u16,
    path: &str,
    config: WebSocketConfig,
) -> Result<Connection, Error> {
    let key = generate_websocket_key();
    let request = construct_http_request(host, port, path, &key);
    log::debug!("handshake: sending upgrade request to {host}:{port}{path}");
    stream.write_all(request.as_bytes()).await?;

    let response = read_http_response(&mut stream).await?;

    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut parsed = httparse::Response::new(&mut headers);
    parsed.parse(&response)?;

    if parsed.code != Some(101) {
        return Err(Error::NoUpgrade);
    }

    let accept = parsed
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("Sec-WebSocket-Accept"))
        .map(|h| String::from_utf8_lossy(h.value).into_owned())
        .ok_or(Error::NoUpgrade)?;

    if accept != generate_websocket_accept_value(&key) {
        return Err(Error::InvalidAcceptKey);
    }

    log::debug!("handshake: upgrade accepted");
    Ok(Connection::new(stream, config))
}

/// Reads from `stream` byte-by-byte until the blank line terminating the
/// HTTP response headers, then returns everything read so far. The
/// handshake response is small and arrives once, unlike the frame stream
/// the core codec has to handle incrementally, so there's no need for the
/// resumable machinery here.
async fn read_http_response(stream: &mut TcpStream) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err(Error::NoUpgrade);
        }
        buf.push(byte[0]);
        if buf.len() >= 4 && &buf[buf.len() - 4..] == b"\r\n\r\n" {
            return Ok(buf);
        }
    }
}

fn construct_http_request(host: &str, port: u16, path: &str, key: &str) -> String {
    let path = if path.is_empty() { "/" } else { path };
    format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n"
    )
}

fn generate_websocket_key() -> String {
    let mut rng = StdRng::from_rng(&mut rand::rng());
    let nonce: [u8; 16] = rng.random();
    BASE64_STANDARD.encode(nonce)
}

fn generate_websocket_accept_value(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(UUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}
