//! Unified error types for the ARMH7 link.
//!
//! A single `Error` enum that every layer converts into, so the device
//! facade and the integration layer above it handle failures uniformly.
//! Nothing in the crate swallows an error: retry policy belongs to the
//! caller.

use core::fmt;

use crate::schema::NumericType;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A required firmware symbol is missing from the image's symbol table.
    UnresolvedSymbol(String),
    /// The serial channel failed or went silent.
    Transport(TransportError),
    /// A response frame could not be reassembled or validated.
    FrameIntegrity(FrameError),
    /// A request frame would exceed the firmware's size ceiling.
    PayloadTooLarge { frame_len: usize, limit: usize },
    /// A write was requested for a numeric type the accessor cannot encode.
    UnsupportedFieldType {
        field: &'static str,
        numeric_type: NumericType,
    },
    /// A record, module or servo index outside the valid range.
    InvalidIndex {
        what: &'static str,
        index: usize,
        limit: usize,
    },
    /// The field does not belong to the record kind it was used with.
    UnknownField {
        record: &'static str,
        field: String,
    },
    /// A value does not fit the integer type of the field it targets.
    ValueOutOfRange { field: &'static str, value: f64 },
    /// Two parallel inputs disagree in length.
    LengthMismatch { expected: usize, actual: usize },
    /// The firmware image could not be read or parsed.
    Firmware(String),
    /// Configuration is invalid or could not be loaded.
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedSymbol(name) => write!(f, "unresolved firmware symbol `{name}`"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::FrameIntegrity(e) => write!(f, "frame integrity: {e}"),
            Self::PayloadTooLarge { frame_len, limit } => {
                write!(f, "frame of {frame_len} bytes exceeds the {limit}-byte limit")
            }
            Self::UnsupportedFieldType {
                field,
                numeric_type,
            } => write!(f, "field `{field}` has unsupported type {numeric_type:?}"),
            Self::InvalidIndex { what, index, limit } => {
                write!(f, "{what} index {index} out of range (limit {limit})")
            }
            Self::UnknownField { record, field } => {
                write!(f, "`{field}` is not a field of {record}")
            }
            Self::ValueOutOfRange { field, value } => {
                write!(f, "value {value} does not fit field `{field}`")
            }
            Self::LengthMismatch { expected, actual } => {
                write!(f, "expected {expected} values, got {actual}")
            }
            Self::Firmware(msg) => write!(f, "firmware image: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The serial port could not be opened.
    Open(String),
    /// The underlying channel reported a write failure.
    Write(String),
    /// The underlying channel reported a read failure.
    Read(String),
    /// The channel accepted zero bytes of a pending write.
    WriteStalled,
    /// No response byte arrived within the read budget.
    Timeout { attempts: u32 },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(msg) => write!(f, "open failed: {msg}"),
            Self::Write(msg) => write!(f, "write failed: {msg}"),
            Self::Read(msg) => write!(f, "read failed: {msg}"),
            Self::WriteStalled => write!(f, "write stalled"),
            Self::Timeout { attempts } => {
                write!(f, "no response after {attempts} read attempts")
            }
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Frame integrity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Declared length cannot hold a length byte and a checksum.
    BadLength(u8),
    /// More bytes arrived than the frame declared.
    Overrun { declared: usize, received: usize },
    /// The read budget ran out with a partial frame buffered.
    Incomplete { declared: usize, received: usize },
    /// Trailing checksum does not match the frame contents.
    Checksum { expected: u8, actual: u8 },
    /// Payload length disagrees with what the request asked for.
    UnexpectedPayload { expected: usize, actual: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadLength(len) => write!(f, "declared length {len} too short"),
            Self::Overrun { declared, received } => {
                write!(f, "received {received} bytes for a {declared}-byte frame")
            }
            Self::Incomplete { declared, received } => {
                write!(f, "only {received} of {declared} bytes arrived")
            }
            Self::Checksum { expected, actual } => {
                write!(f, "checksum 0x{actual:02X}, expected 0x{expected:02X}")
            }
            Self::UnexpectedPayload { expected, actual } => {
                write!(f, "payload of {actual} bytes, expected {expected}")
            }
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::FrameIntegrity(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
