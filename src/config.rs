//! Link configuration parameters
//!
//! Everything needed to open a session with the board.  Loaded from a
//! JSON file; any field left out takes its default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    // --- Serial ---
    /// Serial device path
    pub port: String,
    /// Line rate in baud
    pub baud_rate: u32,
    /// Per-read timeout of the serial port (milliseconds)
    pub read_timeout_ms: u64,

    // --- Response reassembly ---
    /// Wall-clock ceiling for one response (milliseconds)
    pub response_timeout_ms: u64,
    /// Read calls allowed per response, empty reads included
    pub max_read_attempts: u32,
    /// Check the checksum byte of every response
    pub verify_response_checksum: bool,

    // --- Firmware ---
    /// ELF image the board was flashed with
    pub firmware_path: Option<PathBuf>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // Serial
            port: "/dev/ttyUSB1".into(),
            baud_rate: 1_000_000,
            read_timeout_ms: 10,

            // Reassembly
            response_timeout_ms: 1000,
            max_read_attempts: 200, // ceiling only; the response timeout usually ends the wait first
            verify_response_checksum: false,

            // Firmware
            firmware_path: None,
        }
    }
}

impl LinkConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port.is_empty() {
            return Err(Error::Config("port must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(Error::Config("baud_rate must be positive".into()));
        }
        if self.max_read_attempts == 0 {
            return Err(Error::Config("max_read_attempts must be positive".into()));
        }
        if self.response_timeout_ms == 0 {
            return Err(Error::Config("response_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Firmware image path, required to resolve symbols.
    pub fn firmware(&self) -> Result<&Path> {
        self.firmware_path
            .as_deref()
            .ok_or_else(|| Error::Config("firmware_path is not set".into()))
    }
}
