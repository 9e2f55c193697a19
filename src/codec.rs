//! The codec façade: wires the [`Decoder`](crate::decoder::Decoder) as a
//! byte sink and the [`Encoder`](crate::encoder::Encoder) as a frame
//! source behind one object, per spec §4.4.

use crate::decoder::{DecodeError, Decoder};
use crate::encoder::{EncodeError, Encoder};
use crate::frame::OpCode;

/// Couples a [`Decoder`] and an [`Encoder`] behind a single masking policy
/// and frame-ready callback. Once `feed` surfaces a [`DecodeError`], the
/// codec is terminal: further `feed` calls return that same error without
/// touching the decoder, since its internal state is no longer
/// trustworthy.
pub struct Codec<L>
where
    L: FnMut(OpCode, Vec<u8>, bool),
{
    decoder: Decoder,
    encoder: Encoder,
    listener: L,
    dead: Option<DecodeError>,
}

impl<L> Codec<L>
where
    L: FnMut(OpCode, Vec<u8>, bool),
{
    /// `masking` must be `true` for a client-side codec and `false` for a
    /// server-side one — set once, by whichever side knows its role from
    /// the handshake.
    pub fn new(masking: bool, listener: L) -> Self {
        Self {
            decoder: Decoder::new(),
            encoder: Encoder::new(masking),
            listener,
            dead: None,
        }
    }

    /// Feeds raw bytes into the decoder. Invokes the listener once per
    /// completed frame. Once this returns an error the codec is terminal;
    /// further calls return the same error without touching the decoder.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), DecodeError> {
        if let Some(err) = &self.dead {
            return Err(err.clone());
        }

        let result = self.decoder.feed(chunk, &mut self.listener);
        if let Err(ref err) = result {
            self.dead = Some(err.clone());
        }
        result
    }

    pub fn is_dead(&self) -> bool {
        self.dead.is_some()
    }

    pub fn build_text_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.encoder.build_text_frame(payload)
    }

    pub fn build_binary_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.encoder.build_binary_frame(payload)
    }

    pub fn build_close_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.encoder.build_close_frame(payload)
    }

    pub fn build_ping_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.encoder.build_ping_frame(payload)
    }

    pub fn build_pong_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.encoder.build_pong_frame(payload)
    }

    pub fn build_continuation_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.encoder.build_continuation_frame(payload)
    }
}
