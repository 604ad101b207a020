//! Transport abstraction and the request/response link built on it.
//!
//! Concrete implementations:
//! - USB serial to the board (`adapters::serial`)
//! - simulated boards in the test suite
//!
//! [`Link`] is generic over `Transport`, so the protocol logic never
//! touches a port directly.  The board answers every request with exactly
//! one length-prefixed frame and never speaks unprompted, so the link is
//! strictly half-duplex: write one frame, reassemble one reply.

use std::time::{Duration, Instant};

use log::{debug, warn};

use super::checksum::{Checksum, SumChecksum};
use super::codec::{
    AssemblyState, MAX_FRAME_LEN, Request, ResponseAssembler, strip_frame, verify_frame,
};
use crate::config::LinkConfig;
use crate::error::{FrameError, Result, TransportError};

/// Byte-oriented transport channel.
pub trait Transport {
    /// Error type for this transport.
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read.
    /// Returns 0 if nothing arrived within the channel's read timeout.
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error>;

    /// Write `data` to the transport.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> core::result::Result<usize, Self::Error>;

    /// Flush any buffered output.
    fn flush(&mut self) -> core::result::Result<(), Self::Error>;

    /// Drop every received byte not yet read.
    ///
    /// Called before each request so that the tail of an abandoned reply
    /// is never taken for the next one.
    fn discard_input(&mut self) -> core::result::Result<(), Self::Error>;
}

/// Bounds on one request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Read calls allowed per response, empty reads included.
    pub max_read_attempts: u32,
    /// Wall-clock ceiling per response.
    pub response_timeout: Duration,
    /// Check the trailing checksum of every response.
    pub verify_checksum: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            max_read_attempts: 200,
            response_timeout: Duration::from_millis(1000),
            verify_checksum: false,
        }
    }
}

impl From<&LinkConfig> for LinkSettings {
    fn from(config: &LinkConfig) -> Self {
        Self {
            max_read_attempts: config.max_read_attempts,
            response_timeout: Duration::from_millis(config.response_timeout_ms),
            verify_checksum: config.verify_response_checksum,
        }
    }
}

/// Request/response channel to the board.
pub struct Link<T, C = SumChecksum> {
    transport: T,
    checksum: C,
    settings: LinkSettings,
    assembler: ResponseAssembler,
    read_buf: [u8; MAX_FRAME_LEN],
}

impl<T: Transport> Link<T, SumChecksum> {
    pub fn new(transport: T, settings: LinkSettings) -> Self {
        Self::with_checksum(transport, SumChecksum, settings)
    }
}

impl<T: Transport, C: Checksum> Link<T, C> {
    pub fn with_checksum(transport: T, checksum: C, settings: LinkSettings) -> Self {
        Self {
            transport,
            checksum,
            settings,
            assembler: ResponseAssembler::new(),
            read_buf: [0; MAX_FRAME_LEN],
        }
    }

    /// Encode `request`, send it and return the response payload.
    pub fn transact(&mut self, request: &Request<'_>) -> Result<Vec<u8>> {
        let frame = request.encode(&self.checksum)?;
        self.send_and_receive(&frame)
    }

    /// Send a pre-encoded frame and return the response payload with the
    /// length byte and checksum stripped.
    pub fn send_and_receive(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        debug!("tx {:02X?}", frame);
        self.write_frame(frame)?;
        let payload = self.read_response()?;
        debug!("rx {:02X?}", payload);
        Ok(payload)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.transport
            .discard_input()
            .map_err(|e| TransportError::Read(format!("{e:?}")))?;
        let mut written = 0;
        while written < frame.len() {
            let n = self
                .transport
                .write(&frame[written..])
                .map_err(|e| TransportError::Write(format!("{e:?}")))?;
            if n == 0 {
                return Err(TransportError::WriteStalled.into());
            }
            written += n;
        }
        self.transport
            .flush()
            .map_err(|e| TransportError::Write(format!("{e:?}")))?;
        Ok(())
    }

    fn read_response(&mut self) -> Result<Vec<u8>> {
        let started = Instant::now();
        self.assembler.reset();

        let mut attempts = 0;
        loop {
            if attempts >= self.settings.max_read_attempts
                || started.elapsed() >= self.settings.response_timeout
            {
                return Err(self.exhausted(attempts));
            }
            attempts += 1;

            let want = self.assembler.needed();
            let n = self
                .transport
                .read(&mut self.read_buf[..want])
                .map_err(|e| TransportError::Read(format!("{e:?}")))?;
            if n == 0 {
                continue;
            }

            match self.assembler.feed(&self.read_buf[..n]) {
                Ok(Some(frame)) => {
                    if self.settings.verify_checksum {
                        verify_frame(frame, &self.checksum)?;
                    }
                    let payload = strip_frame(frame).to_vec();
                    self.assembler.reset();
                    return Ok(payload);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Discarding malformed response: {e}");
                    self.assembler.reset();
                    return Err(e.into());
                }
            }
        }
    }

    fn exhausted(&mut self, attempts: u32) -> crate::error::Error {
        let state = self.assembler.state();
        self.assembler.reset();
        match state {
            AssemblyState::Partial { declared, received } => {
                warn!("Response stalled at {received}/{declared} bytes");
                FrameError::Incomplete { declared, received }.into()
            }
            _ => TransportError::Timeout { attempts }.into(),
        }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

// ── Tests ────────────────────────────────────────────────────
