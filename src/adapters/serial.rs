//! Serial transport over the board's USB-serial link.
//!
//! The board enumerates as a USB CDC/FTDI device and talks at 1 Mbaud by
//! default.  A short per-read timeout keeps the reassembly loop in
//! [`Link`] responsive; a read that times out reports zero bytes so the
//! loop can retry within its own budget.

use std::io::{self, Read, Write};
use std::time::Duration;

use log::{info, warn};
use serialport::{ClearBuffer, SerialPort};

use crate::config::LinkConfig;
use crate::device::Armh7Device;
use crate::error::{Result, TransportError};
use crate::protocol::transport::{Link, LinkSettings, Transport};
use crate::symbols::{REQUIRED_SYMBOLS, SymbolTable};

pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `config.port` at `config.baud_rate`.
    pub fn open(config: &LinkConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.read_timeout_ms))
            .open()
            .map_err(|e| TransportError::Open(format!("{}: {e}", config.port)))?;
        info!("Opened {} @ {} baud", config.port, config.baud_rate);
        Ok(Self { port })
    }

    pub fn port_name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Transport for SerialTransport {
    type Error = io::Error;

    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Self::Error> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, data: &[u8]) -> core::result::Result<usize, Self::Error> {
        self.port.write(data)
    }

    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        self.port.flush()
    }

    fn discard_input(&mut self) -> core::result::Result<(), Self::Error> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Names of the serial ports present on this host.
pub fn available_ports() -> Vec<String> {
    serialport::available_ports()
        .map(|v| v.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}

/// Resolve the firmware symbols, open the port and check the board
/// answers the ack probe.
pub fn open_device(config: &LinkConfig) -> Result<Armh7Device<SerialTransport>> {
    config.validate()?;
    let symbols = SymbolTable::from_elf_file(config.firmware()?, REQUIRED_SYMBOLS)?;
    let transport = SerialTransport::open(config)?;
    let device = Armh7Device::new(Link::new(transport, LinkSettings::from(config)), symbols);
    if !device.check_ack()? {
        warn!("Board on {} did not acknowledge", config.port);
    }
    Ok(device)
}
