//! HDLC-style frame codec.
//!
//! Wire format:
//! ```text
//! ┌──────┬─────────┬─────────┬───────────────┬───────────┬──────┐
//! │ 0x7E │ address │ control │ payload (N B) │ FCS (4 B) │ 0x7E │
//! │ flag │   u8    │  0x03   │               │ CRC-32 LE │ flag │
//! └──────┴─────────┴─────────┴───────────────┴───────────┴──────┘
//! ```
//!
//! Everything between the flags is byte-stuffed: `0x7E` and `0x7D` are
//! sent as `0x7D, b ^ 0x20`, so the flags stay unambiguous in binary
//! payloads.  The FCS covers address, control and payload.
//!
//! The decoder is fed one byte at a time.  It never holds more than the
//! frame currently in progress, and after any outcome (good frame, bad
//! FCS, overflow) it resynchronises on the next flag.  A closing flag also
//! opens the next frame, so back-to-back frames may share a flag.

use heapless::Vec as FrameBuf;

use crate::error::FrameError;

/// Frame delimiter.
pub const FLAG: u8 = 0x7E;

/// Escape marker for reserved bytes inside a frame.
pub const ESCAPE: u8 = 0x7D;

const ESCAPE_XOR: u8 = 0x20;

/// Unnumbered-information control byte.
const UI_CONTROL: u8 = 0x03;

/// Address carrying RPC packets (`'R'`).
pub const RPC_ADDRESS: u8 = b'R';

/// Address carrying log records.
pub const LOG_ADDRESS: u8 = 1;

const HEADER_SIZE: usize = 2;
const FCS_SIZE: usize = 4;
const MIN_FRAME_SIZE: usize = HEADER_SIZE + FCS_SIZE;

/// Unescaped bytes the decoder can hold for one frame.
pub const DECODER_CAPACITY: usize = 1024;

/// Largest payload that still fits in the decoder.
pub const MAX_PAYLOAD_SIZE: usize = DECODER_CAPACITY - MIN_FRAME_SIZE;

/// A complete, FCS-checked frame.  Borrows the decoder buffer until the
/// next call to [`FrameDecoder::process`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame<'a> {
    pub address: u8,
    pub payload: &'a [u8],
}

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Discarding bytes until a flag.
    Interframe,
    /// Accumulating frame content.
    Frame,
    /// Previous byte was an escape.
    FrameEscape,
}

/// Streaming frame decoder.
pub struct FrameDecoder {
    state: DecoderState,
    buf: FrameBuf<u8, DECODER_CAPACITY>,
    /// The buffer still holds the last delivered frame.
    delivered: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Interframe,
            buf: FrameBuf::new(),
            delivered: false,
        }
    }

    /// Consume one byte of the stream.
    ///
    /// Returns `Ok(Some(frame))` when a flag closes a frame whose FCS
    /// checks out, `Ok(None)` while a frame is still incomplete, and an
    /// error when the frame in progress had to be dropped.
    pub fn process(&mut self, byte: u8) -> Result<Option<DecodedFrame<'_>>, FrameError> {
        if self.delivered {
            self.buf.clear();
            self.delivered = false;
        }

        match self.state {
            DecoderState::Interframe => {
                if byte == FLAG {
                    self.state = DecoderState::Frame;
                }
                Ok(None)
            }
            DecoderState::Frame => match byte {
                FLAG => self.finish_frame(),
                ESCAPE => {
                    self.state = DecoderState::FrameEscape;
                    Ok(None)
                }
                _ => self.push(byte),
            },
            DecoderState::FrameEscape => {
                if byte == FLAG {
                    // Aborted escape; the flag still opens the next frame.
                    self.buf.clear();
                    self.state = DecoderState::Frame;
                    return Err(FrameError::Corrupt);
                }
                self.state = DecoderState::Frame;
                self.push(byte ^ ESCAPE_XOR)
            }
        }
    }

    /// Drop any frame in progress (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::Interframe;
        self.buf.clear();
        self.delivered = false;
    }

    fn push(&mut self, byte: u8) -> Result<Option<DecodedFrame<'_>>, FrameError> {
        if self.buf.push(byte).is_err() {
            self.buf.clear();
            self.state = DecoderState::Interframe;
            return Err(FrameError::Overflow);
        }
        Ok(None)
    }

    fn finish_frame(&mut self) -> Result<Option<DecodedFrame<'_>>, FrameError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        if self.buf.len() < MIN_FRAME_SIZE || !fcs_matches(&self.buf) {
            self.buf.clear();
            return Err(FrameError::Corrupt);
        }

        self.delivered = true;
        let body = &self.buf[..self.buf.len() - FCS_SIZE];
        Ok(Some(DecodedFrame {
            address: body[0],
            payload: &body[HEADER_SIZE..],
        }))
    }
}

fn fcs_matches(frame: &[u8]) -> bool {
    let (body, fcs) = frame.split_at(frame.len() - FCS_SIZE);
    let expected = u32::from_le_bytes([fcs[0], fcs[1], fcs[2], fcs[3]]);
    crc32fast::hash(body) == expected
}

/// Encode `payload` for `address` into a complete frame.
pub fn encode_frame(address: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::with_capacity(payload.len() + 2 * MIN_FRAME_SIZE);
    encode_into(address, payload, &mut out)?;
    Ok(out)
}

/// Append the encoded frame to `out`.
///
/// Fails with [`FrameError::Overflow`] when the payload is larger than a
/// decoder on the other end could accept.
pub fn encode_into(address: u8, payload: &[u8], out: &mut Vec<u8>) -> Result<(), FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::Overflow);
    }

    let header = [address, UI_CONTROL];
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header);
    hasher.update(payload);
    let fcs = hasher.finalize().to_le_bytes();

    out.push(FLAG);
    for &b in header.iter().chain(payload).chain(fcs.iter()) {
        if b == FLAG || b == ESCAPE {
            out.push(ESCAPE);
            out.push(b ^ ESCAPE_XOR);
        } else {
            out.push(b);
        }
    }
    out.push(FLAG);
    Ok(())
}
