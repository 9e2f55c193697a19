use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::Receiver;

use crate::error::Error;
use crate::frame::OpCode;

/// One event per thing the client façade surfaces to its owner. Mirrors
/// spec §6's downstream collaborator interface: `message`/`ping`/`pong`/
/// `close`/`error`.
///
/// `Message` carries the opcode (`Text`, `Binary`, or `Continuation`) and
/// FIN bit of the underlying frame verbatim — this façade does not
/// reassemble a fragmented message into one logical payload (see
/// DESIGN.md Open Questions); a caller that needs that layers it on top
/// using the FIN bit to know when a sequence is complete.
#[derive(Debug)]
pub enum Event {
    Message { opcode: OpCode, payload: Vec<u8>, fin: bool },
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(Vec<u8>),
    Error(Error),
}

/// Adapts the connection's `mpsc::Receiver<Event>` to a `futures::Stream`
/// so callers can `while let Some(event) = stream.next().await` instead of
/// touching the channel directly.
pub struct EventStream {
    receiver: Receiver<Event>,
}

impl EventStream {
    pub fn new(receiver: Receiver<Event>) -> Self {
        Self { receiver }
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver).poll_recv(cx)
    }
}
