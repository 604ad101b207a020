//! Request encoder and response assembler for the board's RAM protocol.
//!
//! Wire format, every frame in both directions:
//! ```text
//! ┌─────────┬────────┬───────────────────────────┬──────────┐
//! │ Len (1B)│ Op (1B)│ Body (Len - 3 bytes)      │ Sum (1B) │
//! └─────────┴────────┴───────────────────────────┴──────────┘
//! ```
//!
//! Vector read / write body:
//! ```text
//! ┌──────────────┬───────────┬───────────┬──────────────┬─────────────────┐
//! │ Addr (4B LE) │ Count (1B)│ ESize (1B)│ Stride (2B LE)│ Data (writes)  │
//! └──────────────┴───────────┴───────────┴──────────────┴─────────────────┘
//! ```
//!
//! Responses carry the same length prefix and trailing checksum; the bytes
//! in between are the payload.  The serial link may deliver a response in
//! several pieces, so [`ResponseAssembler`] accumulates bytes until the
//! declared length is reached.

use heapless::Vec as FixedVec;

use super::checksum::Checksum;
use crate::error::{Error, FrameError, Result};

/// Firmware function call.
pub const OP_CALL: u8 = 0xFA;
/// Strided memory read.
pub const OP_READ_VECTOR: u8 = 0xFB;
/// Strided memory write.
pub const OP_WRITE_VECTOR: u8 = 0xFC;
/// Ack probe command byte.
pub const OP_ACK: u8 = 0xFE;
/// Payload byte of a healthy ack reply.
pub const ACK_OK: u8 = 0x06;

/// Largest frame the one-byte length prefix can describe.
pub const MAX_FRAME_LEN: usize = 255;
/// Vector writes above this size are rejected by the firmware.
pub const MAX_WRITE_FRAME_LEN: usize = 240;
/// Largest payload the firmware returns for a single read.
pub const MAX_READ_PAYLOAD: usize = 250;
/// Vector header plus checksum.
pub const VECTOR_OVERHEAD: usize = 11;
/// Length byte plus checksum byte.
const MIN_FRAME_LEN: usize = 2;

/// Stack buffer holding one encoded frame.
pub type FrameBuf = FixedVec<u8, MAX_FRAME_LEN>;

/// Outbound request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request<'a> {
    /// Visit `count` records `stride` bytes apart, reading `element_size`
    /// bytes from each.
    ReadVector {
        address: u32,
        count: u8,
        element_size: u8,
        stride: u16,
    },
    /// Counterpart of `ReadVector`; `payload` holds `count * element_size`
    /// bytes.
    WriteVector {
        address: u32,
        count: u8,
        element_size: u8,
        stride: u16,
        payload: &'a [u8],
    },
    /// Call the firmware function at `address` with 32-bit arguments.
    Call { address: u32, args: &'a [u32] },
    /// Liveness probe.
    Ack,
    /// Board command frame `[len, command, body…, sum]`.
    Command { command: u8, body: &'a [u8] },
}

impl Request<'_> {
    /// Flat read of `len` bytes starting at `address`.
    pub fn read_flat(address: u32, len: u8) -> Self {
        Request::ReadVector {
            address,
            count: 1,
            element_size: len,
            stride: 0,
        }
    }

    /// Total encoded length, checksum included.
    pub fn frame_len(&self) -> usize {
        match self {
            Self::ReadVector { .. } => VECTOR_OVERHEAD,
            Self::WriteVector { payload, .. } => VECTOR_OVERHEAD + payload.len(),
            Self::Call { args, .. } => 8 + 4 * args.len(),
            Self::Ack => 4,
            Self::Command { body, .. } => 3 + body.len(),
        }
    }

    /// Encode into a length-prefixed, checksummed frame.
    ///
    /// The checksum is computed fresh on every call.
    pub fn encode(&self, checksum: &impl Checksum) -> Result<FrameBuf> {
        let len = self.frame_len();
        let limit = match self {
            Self::WriteVector { .. } => MAX_WRITE_FRAME_LEN,
            _ => MAX_FRAME_LEN,
        };
        if len > limit {
            return Err(Error::PayloadTooLarge {
                frame_len: len,
                limit,
            });
        }

        let mut out = FrameBuf::new();
        push(&mut out, &[len as u8])?;
        match *self {
            Self::ReadVector {
                address,
                count,
                element_size,
                stride,
            } => {
                push(&mut out, &[OP_READ_VECTOR])?;
                push_vector_header(&mut out, address, count, element_size, stride)?;
            }
            Self::WriteVector {
                address,
                count,
                element_size,
                stride,
                payload,
            } => {
                let expected = count as usize * element_size as usize;
                if payload.len() != expected {
                    return Err(Error::LengthMismatch {
                        expected,
                        actual: payload.len(),
                    });
                }
                push(&mut out, &[OP_WRITE_VECTOR])?;
                push_vector_header(&mut out, address, count, element_size, stride)?;
                push(&mut out, payload)?;
            }
            Self::Call { address, args } => {
                push(&mut out, &[OP_CALL])?;
                push(&mut out, &address.to_le_bytes())?;
                push(&mut out, &[args.len() as u8])?;
                for arg in args {
                    push(&mut out, &arg.to_le_bytes())?;
                }
            }
            Self::Ack => push(&mut out, &[OP_ACK, ACK_OK])?,
            Self::Command { command, body } => {
                push(&mut out, &[command])?;
                push(&mut out, body)?;
            }
        }
        let sum = checksum.checksum(&out);
        push(&mut out, &[sum])?;
        debug_assert_eq!(out.len(), len);
        Ok(out)
    }
}

fn push(out: &mut FrameBuf, bytes: &[u8]) -> Result<()> {
    out.extend_from_slice(bytes).map_err(|_| Error::PayloadTooLarge {
        frame_len: out.len() + bytes.len(),
        limit: MAX_FRAME_LEN,
    })
}

fn push_vector_header(
    out: &mut FrameBuf,
    address: u32,
    count: u8,
    element_size: u8,
    stride: u16,
) -> Result<()> {
    push(out, &address.to_le_bytes())?;
    push(out, &[count, element_size])?;
    push(out, &stride.to_le_bytes())
}

/// Payload of a complete response frame: everything between the length
/// byte and the checksum.
pub fn strip_frame(frame: &[u8]) -> &[u8] {
    if frame.len() < MIN_FRAME_LEN {
        return &[];
    }
    &frame[1..frame.len() - 1]
}

/// Compare the trailing checksum with one computed over the frame body.
pub fn verify_frame(frame: &[u8], checksum: &impl Checksum) -> core::result::Result<(), FrameError> {
    let Some((&actual, body)) = frame.split_last() else {
        return Err(FrameError::BadLength(0));
    };
    let expected = checksum.checksum(body);
    if expected == actual {
        Ok(())
    } else {
        Err(FrameError::Checksum { expected, actual })
    }
}

// ---------------------------------------------------------------------------
// Response reassembly
// ---------------------------------------------------------------------------

/// Reassembly progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// Nothing buffered yet.
    AwaitingLength,
    /// Length known, more bytes to come.
    Partial { declared: usize, received: usize },
    /// Buffered byte count equals the declared length.
    Complete { declared: usize },
}

/// Accumulates response pieces until the first byte equals the number of
/// bytes buffered.
pub struct ResponseAssembler {
    buf: FrameBuf,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self {
            buf: FrameBuf::new(),
        }
    }

    pub fn state(&self) -> AssemblyState {
        match self.buf.first() {
            None => AssemblyState::AwaitingLength,
            Some(&len) if len as usize == self.buf.len() => AssemblyState::Complete {
                declared: len as usize,
            },
            Some(&len) => AssemblyState::Partial {
                declared: len as usize,
                received: self.buf.len(),
            },
        }
    }

    /// Bytes still missing from the current frame (1 while the length
    /// byte itself is outstanding).
    pub fn needed(&self) -> usize {
        match self.state() {
            AssemblyState::AwaitingLength => 1,
            AssemblyState::Partial { declared, received } => declared - received,
            AssemblyState::Complete { .. } => 0,
        }
    }

    /// Append `data`.  Returns the whole frame once it is complete.
    ///
    /// Bytes beyond the declared length are an overrun; a declared length
    /// too short to hold the checksum is rejected immediately.  The
    /// assembler must be [`reset`](Self::reset) after an error.
    pub fn feed(&mut self, data: &[u8]) -> core::result::Result<Option<&[u8]>, FrameError> {
        for (i, &byte) in data.iter().enumerate() {
            if let AssemblyState::Complete { declared } = self.state() {
                return Err(FrameError::Overrun {
                    declared,
                    received: declared + data.len() - i,
                });
            }
            if self.buf.is_empty() && (byte as usize) < MIN_FRAME_LEN {
                return Err(FrameError::BadLength(byte));
            }
            // Declared lengths never exceed the buffer capacity.
            let _ = self.buf.push(byte);
        }

        match self.state() {
            AssemblyState::Complete { .. } => Ok(Some(self.buf.as_slice())),
            _ => Ok(None),
        }
    }

    /// Discard any buffered bytes.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────
