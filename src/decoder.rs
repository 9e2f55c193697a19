//! The resumable RFC 6455 frame decoder: a byte-driven state machine that
//! assembles complete frames out of arbitrary, possibly-fragmented byte
//! deliveries.
//!
//! [`Decoder`] has no I/O dependency. The caller feeds it whatever bytes
//! happen to have arrived via [`Decoder::feed`]; for every frame that
//! completes during that call, the supplied listener is invoked once,
//! synchronously, before `feed` returns.

use bytes::{Buf, BytesMut};
use thiserror::Error;

use crate::frame::{FrameHeader, OpCode, MAX_PAYLOAD_LEN};
use crate::mask::apply_mask;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("RSV bit set without a negotiated extension")]
    RsvNonZero,

    #[error("invalid opcode nibble: {0:#x}")]
    InvalidOpcode(u8),

    #[error("control frame arrived with FIN=0")]
    ExpectedFinal,

    #[error("payload length {0} is not representable without loss")]
    UnsupportedLength(u64),

    #[error("control frame declared a 7-bit length field of {0}, payloads must be <= 125 bytes")]
    ControlFrameTooLong(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitHeader,
    AwaitPayload,
}

/// A sans-IO RFC 6455 frame decoder. One instance per connection; it resets
/// its internal state after every frame it emits. After the first error it
/// is left in an unspecified state — the caller must drop the connection
/// rather than call `feed` again.
pub struct Decoder {
    phase: Phase,
    buffer: BytesMut,
    header: Option<FrameHeader>,
    payload: Vec<u8>,
    written: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            phase: Phase::AwaitHeader,
            buffer: BytesMut::new(),
            header: None,
            payload: Vec::new(),
            written: 0,
        }
    }

    /// Consumes `chunk` entirely, invoking `listener(opcode, payload, fin)`
    /// once per frame completed during this call. `fin` is the frame's own
    /// FIN bit; reassembling CONTINUATION frames into one logical message
    /// is left to the caller.
    ///
    /// A zero-length `chunk` is a no-op. On the first protocol violation,
    /// returns the offending [`DecodeError`]; the caller must not call
    /// `feed` again afterwards.
    pub fn feed<F>(&mut self, chunk: &[u8], mut listener: F) -> Result<(), DecodeError>
    where
        F: FnMut(OpCode, Vec<u8>, bool),
    {
        self.buffer.extend_from_slice(chunk);

        loop {
            match self.phase {
                Phase::AwaitHeader => {
                    if !self.try_complete_header()? {
                        return Ok(());
                    }
                }
                Phase::AwaitPayload => {
                    let payload_len = self
                        .header
                        .as_ref()
                        .expect("await-payload phase implies a header")
                        .payload_len as usize;

                    let needed = payload_len - self.written;
                    let take = needed.min(self.buffer.len());
                    if take > 0 {
                        self.payload[self.written..self.written + take]
                            .copy_from_slice(&self.buffer[..take]);
                        self.buffer.advance(take);
                        self.written += take;
                    }

                    if self.written == payload_len {
                        self.emit(&mut listener);
                    } else {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Parses a header off the front of `self.buffer` if enough bytes have
    /// arrived, allocates the payload buffer and moves to the payload
    /// phase. Returns `Ok(false)` without consuming anything if the buffer
    /// is still short.
    fn try_complete_header(&mut self) -> Result<bool, DecodeError> {
        if self.buffer.len() < 2 {
            return Ok(false);
        }

        let b0 = self.buffer[0];
        let b1 = self.buffer[1];

        if b0 & 0x70 != 0 {
            return Err(DecodeError::RsvNonZero);
        }

        let fin = b0 & 0x80 != 0;
        let opcode = OpCode::from_nibble(b0 & 0x0F)?;

        if opcode.is_control() && !fin {
            return Err(DecodeError::ExpectedFinal);
        }

        let masked = b1 & 0x80 != 0;
        let len7 = b1 & 0x7F;

        // RFC 6455 caps control frame payloads at 125 bytes; any use of the
        // extended-length escape on a control opcode is already a
        // violation, and we can reject it before reading further.
        if opcode.is_control() && len7 >= 126 {
            return Err(DecodeError::ControlFrameTooLong(len7));
        }

        let ext_len_size = match len7 {
            0..=125 => 0,
            126 => 2,
            127 => 8,
            _ => unreachable!("len7 is masked to 7 bits"),
        };
        let mask_size = if masked { 4 } else { 0 };
        let header_size = 2 + ext_len_size + mask_size;

        if self.buffer.len() < header_size {
            return Ok(false);
        }

        let payload_len: u64 = match len7 {
            0..=125 => len7 as u64,
            126 => u16::from_be_bytes([self.buffer[2], self.buffer[3]]) as u64,
            127 => {
                let mut be = [0u8; 8];
                be.copy_from_slice(&self.buffer[2..10]);
                u64::from_be_bytes(be)
            }
            _ => unreachable!("len7 is masked to 7 bits"),
        };

        if payload_len >= MAX_PAYLOAD_LEN {
            return Err(DecodeError::UnsupportedLength(payload_len));
        }

        let mask = if masked {
            let offset = 2 + ext_len_size;
            let mut m = [0u8; 4];
            m.copy_from_slice(&self.buffer[offset..offset + 4]);
            Some(m)
        } else {
            None
        };

        self.buffer.advance(header_size);

        self.header = Some(FrameHeader {
            fin,
            opcode,
            masked,
            payload_len,
            payload_offset: header_size,
            mask,
        });
        self.payload = vec![0u8; payload_len as usize];
        self.written = 0;
        self.phase = Phase::AwaitPayload;

        Ok(true)
    }

    /// Unmasks the assembled payload (if masked), hands it to the listener
    /// by move, and resets to await the next header.
    fn emit<F>(&mut self, listener: &mut F)
    where
        F: FnMut(OpCode, Vec<u8>, bool),
    {
        let header = self.header.take().expect("emit implies a completed header");
        let mut payload = std::mem::take(&mut self.payload);

        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask, 0);
        }

        listener(header.opcode, payload, header.fin);

        self.phase = Phase::AwaitHeader;
        self.written = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;

    fn collect(chunks: &[&[u8]]) -> Result<Vec<(OpCode, Vec<u8>, bool)>, DecodeError> {
        let mut decoder = Decoder::new();
        let mut emitted = Vec::new();
        for chunk in chunks {
            decoder.feed(chunk, |op, payload, fin| emitted.push((op, payload, fin)))?;
        }
        Ok(emitted)
    }

    #[test]
    fn unmasked_text_short() {
        let bytes = [0x81, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F];
        let emitted = collect(&[&bytes]).unwrap();
        assert_eq!(emitted, vec![(OpCode::Text, b"Hello".to_vec(), true)]);
    }

    #[test]
    fn masked_text_short() {
        let bytes = [
            0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58,
        ];
        let emitted = collect(&[&bytes]).unwrap();
        assert_eq!(emitted, vec![(OpCode::Text, b"Hello".to_vec(), true)]);
    }

    #[test]
    fn extended_16_length_split_across_two_chunks() {
        let payload = vec![0xABu8; 200];
        let mut frame = vec![0x82, 0x7E, 0x00, 0xC8];
        frame.extend_from_slice(&payload);

        let emitted = collect(&[&frame[..50], &frame[50..]]).unwrap();
        assert_eq!(emitted, vec![(OpCode::Binary, payload, true)]);
    }

    #[test]
    fn two_frames_in_one_delivery() {
        let mut chunk = vec![0x81, 0x03, 0x61, 0x62, 0x63];
        chunk.extend_from_slice(&[0x89, 0x00]);

        let emitted = collect(&[&chunk]).unwrap();
        assert_eq!(
            emitted,
            vec![
                (OpCode::Text, b"abc".to_vec(), true),
                (OpCode::Ping, Vec::new(), true),
            ]
        );
    }

    #[test]
    fn header_split_byte_by_byte() {
        let bytes = [0x81u8, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F];
        let chunks: Vec<&[u8]> = bytes.iter().map(std::slice::from_ref).collect();
        let emitted = collect(&chunks).unwrap();
        assert_eq!(emitted, vec![(OpCode::Text, b"Hello".to_vec(), true)]);
    }

    #[test]
    fn round_trip_ping_with_empty_payload() {
        let encoder = Encoder::new(false);
        let frame = encoder.build_ping_frame(&[]).unwrap();
        let emitted = collect(&[&frame]).unwrap();
        assert_eq!(emitted, vec![(OpCode::Ping, Vec::new(), true)]);
    }

    #[test]
    fn round_trip_every_opcode_masked_and_unmasked() {
        let opcodes = [
            OpCode::Text,
            OpCode::Binary,
            OpCode::Ping,
            OpCode::Pong,
            OpCode::Close,
            OpCode::Continuation,
        ];

        for masking in [false, true] {
            let encoder = Encoder::new(masking);
            let payload = b"round trip payload".to_vec();

            for op in opcodes {
                let frame = encoder.build_frame(op, &payload).unwrap();
                let emitted = collect(&[&frame]).unwrap();
                assert_eq!(emitted, vec![(op, payload.clone(), true)]);
            }
        }
    }

    #[test]
    fn length_boundaries_round_trip() {
        let encoder = Encoder::new(true);
        for len in [0usize, 125, 126, 65535, 65536, 65537] {
            let payload = vec![0x5Au8; len];
            let frame = encoder.build_binary_frame(&payload).unwrap();
            let emitted = collect(&[&frame]).unwrap();
            assert_eq!(emitted, vec![(OpCode::Binary, payload, true)]);
        }
    }

    #[test]
    fn rejects_rsv_bits() {
        let bytes = [0xC1, 0x00]; // FIN=1, RSV1=1, opcode=Text, len=0
        let err = collect(&[&bytes]).unwrap_err();
        assert_eq!(err, DecodeError::RsvNonZero);
    }

    #[test]
    fn rejects_reserved_opcodes() {
        for opcode in [3, 4, 5, 6, 7, 11, 12, 13, 14, 15] {
            let bytes = [0x80 | opcode, 0x00];
            let err = collect(&[&bytes]).unwrap_err();
            assert_eq!(err, DecodeError::InvalidOpcode(opcode));
        }
    }

    #[test]
    fn rejects_fragmented_control_frames() {
        let bytes = [0x09, 0x00]; // FIN=0, opcode=Ping
        let err = collect(&[&bytes]).unwrap_err();
        assert_eq!(err, DecodeError::ExpectedFinal);
    }

    #[test]
    fn rejects_oversized_control_frame() {
        let bytes = [0x89, 0x7E, 0x00, 0xC8]; // Ping claiming extended-16 length
        let err = collect(&[&bytes]).unwrap_err();
        assert_eq!(err, DecodeError::ControlFrameTooLong(126));
    }

    #[test]
    fn zero_payload_emits_within_same_feed_call() {
        let bytes = [0x81, 0x00];
        let mut decoder = Decoder::new();
        let mut count = 0;
        decoder.feed(&bytes, |_, _, _| count += 1).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn chunk_invariance_against_single_call() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0x81, 0x03, b'a', b'b', b'c']);
        stream.extend_from_slice(&[0x82, 0x7E, 0x00, 0xC8]);
        stream.extend_from_slice(&vec![0x11u8; 200]);
        stream.extend_from_slice(&[0x89, 0x00]);

        let whole = collect(&[&stream]).unwrap();

        let byte_chunks: Vec<&[u8]> = stream.iter().map(std::slice::from_ref).collect();
        let one_byte_at_a_time = collect(&byte_chunks).unwrap();

        assert_eq!(whole, one_byte_at_a_time);
    }
}
