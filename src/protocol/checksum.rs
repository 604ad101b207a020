//! Frame checksum.
//!
//! The board and the host must agree on one single-byte checksum over all
//! preceding frame bytes.

/// Single-byte frame checksum.
pub trait Checksum {
    fn checksum(&self, bytes: &[u8]) -> u8;
}

/// Byte sum modulo 256, as computed by the stock board firmware.
///
/// The ack probe `[0x04, 0xFE, 0x06, 0x08]` ends with exactly this sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SumChecksum;

impl Checksum for SumChecksum {
    fn checksum(&self, bytes: &[u8]) -> u8 {
        bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
    }
}

impl<F> Checksum for F
where
    F: Fn(&[u8]) -> u8,
{
    fn checksum(&self, bytes: &[u8]) -> u8 {
        self(bytes)
    }
}
