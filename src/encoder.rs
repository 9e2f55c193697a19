//! The frame serializer. Builds a single complete RFC 6455 frame for a
//! given opcode and payload, masking it if the codec is configured as a
//! client (per RFC 6455 §5.1, frames sent from client to server MUST be
//! masked; server-to-client frames MUST NOT).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::frame::{OpCode, MAX_PAYLOAD_LEN};
use crate::mask::apply_mask;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("payload length {0} is not representable without loss")]
    UnsupportedLength(u64),
}

/// Builds frames for one side of a connection. `masking` is fixed at
/// construction: `true` for a client (every frame gets a fresh random
/// mask), `false` for a server.
pub struct Encoder {
    masking: bool,
}

impl Encoder {
    pub fn new(masking: bool) -> Self {
        Self { masking }
    }

    /// Builds a complete, single-frame (FIN=1, all RSVs=0) message for
    /// `opcode` carrying `payload`.
    pub fn build_frame(&self, opcode: OpCode, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let len = payload.len() as u64;
        if len >= MAX_PAYLOAD_LEN {
            return Err(EncodeError::UnsupportedLength(len));
        }

        let ext_len_size = match len {
            0..=125 => 0,
            126..=65535 => 2,
            _ => 8,
        };
        let mask_size = if self.masking { 4 } else { 0 };
        let payload_offset = 2 + ext_len_size + mask_size;

        let mut frame = Vec::with_capacity(payload_offset + payload.len());
        frame.push(0x80 | opcode.as_u8());

        let len_byte = match len {
            0..=125 => len as u8,
            126..=65535 => 126,
            _ => 127,
        };
        frame.push(if self.masking { 0x80 | len_byte } else { len_byte });

        match len {
            0..=125 => {}
            126..=65535 => frame.extend_from_slice(&(len as u16).to_be_bytes()),
            _ => frame.extend_from_slice(&len.to_be_bytes()),
        }

        let mask = if self.masking {
            // A fresh CSPRNG per frame, seeded from the OS each time, so a
            // mask is never reused across frames.
            let mut rng = StdRng::from_rng(&mut rand::rng());
            let key = [
                rng.random::<u8>(),
                rng.random::<u8>(),
                rng.random::<u8>(),
                rng.random::<u8>(),
            ];
            frame.extend_from_slice(&key);
            Some(key)
        } else {
            None
        };

        frame.extend_from_slice(payload);

        if let Some(mask) = mask {
            apply_mask(&mut frame, mask, payload_offset);
        }

        debug_assert_eq!(frame.len(), payload_offset + payload.len());
        Ok(frame)
    }

    pub fn build_text_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.build_frame(OpCode::Text, payload)
    }

    pub fn build_binary_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.build_frame(OpCode::Binary, payload)
    }

    pub fn build_close_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.build_frame(OpCode::Close, payload)
    }

    pub fn build_ping_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.build_frame(OpCode::Ping, payload)
    }

    pub fn build_pong_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.build_frame(OpCode::Pong, payload)
    }

    pub fn build_continuation_frame(&self, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        self.build_frame(OpCode::Continuation, payload)
    }
}
