//! Minimal async WebSocket client for the Tokio stack.
//!
//! The crate's core is a resumable, byte-driven RFC 6455 frame codec: a
//! [`decoder::Decoder`] that can be fed arbitrarily-sized chunks as they
//! arrive off the wire and an [`encoder::Encoder`] that serializes frames
//! for sending. Neither touches a socket — [`connection::Connection`] and
//! [`handshake::connect`] are thin ambient collaborators that wire the
//! codec to a real `tokio::net::TcpStream`.
//!
//! No TLS, no subprotocol/extension negotiation, no permessage-deflate,
//! no server-side accept handshake, and no cross-frame message
//! reassembly — see `DESIGN.md` for what's deliberately out of scope.

pub mod codec;
pub mod config;
mod connection;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod event;
pub mod frame;
pub mod handshake;
mod mask;

pub use codec::Codec;
pub use config::WebSocketConfig;
pub use connection::Connection;
pub use decoder::{DecodeError, Decoder};
pub use encoder::{EncodeError, Encoder};
pub use error::Error;
pub use event::{Event, EventStream};
pub use frame::OpCode;
pub use handshake::connect;
