use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;
use url::ParseError;

use crate::decoder::DecodeError;
use crate::encoder::EncodeError;

/// Crate-wide error surface. Wraps the core codec errors plus everything
/// the ambient handshake/connection layer can fail with.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("{0}")]
    Encode(#[from] EncodeError),

    #[error("{source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("{source}")]
    Utf8 {
        #[from]
        source: FromUtf8Error,
    },

    #[error("{source}")]
    UrlParse {
        #[from]
        source: ParseError,
    },

    #[error("{source}")]
    HttpParse {
        #[from]
        source: httparse::Error,
    },

    #[error("invalid scheme in WebSocket URL, expected ws:// or wss://")]
    InvalidSchemeUrl,

    #[error("WebSocket URL has no host")]
    UrlNoHost,

    #[error("wss:// URLs require TLS, which this client does not implement")]
    TlsNotSupported,

    #[error("handshake timed out before the server replied")]
    HandshakeTimeout,

    #[error("server response was not a valid HTTP/1.1 101 Switching Protocols")]
    NoUpgrade,

    #[error("server did not send a valid Sec-WebSocket-Accept value")]
    InvalidAcceptKey,

    #[error("message payload of {0} bytes exceeds max_message_size {1}")]
    MaxMessageSize(usize, usize),

    #[error("connection is already closed")]
    ConnectionClosed,
}
