//! Chunked memory reads.
//!
//! A single vector-read response carries at most 250 payload bytes, so a
//! longer flat read is split into consecutive pieces:
//!
//! ```text
//! Chunk 1: [address,           250 bytes]
//! Chunk 2: [address + 250,     250 bytes]
//! Chunk N: [address + 250(N-1), L - 250(N-1) bytes]   (final)
//! ```
//!
//! The caller concatenates the chunk payloads in order.

use super::codec::MAX_READ_PAYLOAD;

/// Maximum bytes requested by one read.
pub const MAX_READ_CHUNK: usize = MAX_READ_PAYLOAD;

/// One flat read request in a chunked sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadChunk {
    pub address: u32,
    pub len: u8,
}

/// Iterator over the chunks covering `[address, address + len)`.
#[derive(Debug, Clone)]
pub struct ReadPlan {
    next: u32,
    remaining: usize,
}

/// Split a flat read of `len` bytes into `ceil(len / 250)` chunks.
///
/// A zero-length read yields no chunks at all.
pub fn plan_reads(address: u32, len: usize) -> ReadPlan {
    ReadPlan {
        next: address,
        remaining: len,
    }
}

impl ReadPlan {
    /// Number of chunks left to issue.
    pub fn chunk_count(&self) -> usize {
        self.remaining.div_ceil(MAX_READ_CHUNK)
    }
}

impl Iterator for ReadPlan {
    type Item = ReadChunk;

    fn next(&mut self) -> Option<ReadChunk> {
        if self.remaining == 0 {
            return None;
        }
        let len = self.remaining.min(MAX_READ_CHUNK);
        let chunk = ReadChunk {
            address: self.next,
            len: len as u8,
        };
        self.next = self.next.wrapping_add(len as u32);
        self.remaining -= len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.chunk_count();
        (n, Some(n))
    }
}

impl ExactSizeIterator for ReadPlan {}
