//! Firmware symbol resolution.
//!
//! The board exposes no registry of its own: every variable and function
//! the host touches is located through the symbol table of the ELF image
//! the board was flashed with.  The table is resolved once, eagerly, for a
//! fixed list of names; a missing name is fatal at session start.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info};
use object::{Object, ObjectSymbol};

use crate::error::{Error, Result};

/// Names the host must be able to resolve before talking to the board.
pub const REQUIRED_SYMBOLS: &[&str] = &[
    "walking_command",
    "walking_mode",
    "rom_to_flash",
    "flash_to_rom",
    "Mfilter",
    "set_sidata_command",
    "set_sdata_command",
    "set_edata_command",
    "sidata_to_dataram",
    "dataflash_to_dataram",
    "servo_vector",
    "dataram_to_dataflash",
    "_sidata",
    "_sdata",
    "uwTickPrio",
    "__fdlib_version",
    "_impure_ptr",
    "_edata",
    "_sbss",
    "_ebss",
    "servo_idmode_scan",
    "buzzer_init_sound",
    "servo_idmode_scan_single",
    "imu_data_",
    "Sensor_vector",
    "Worm_vector",
    "SysB",
    "data_address",
];

/// Immutable name → address map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    entries: HashMap<String, u32>,
}

impl SymbolTable {
    /// Build a table from pre-resolved pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            entries: pairs.into_iter().map(|(n, a)| (n.into(), a)).collect(),
        }
    }

    /// Parse an ELF image and resolve every name in `required`.
    ///
    /// Only the requested names are kept.  The first occurrence of a name
    /// wins, matching a linear scan of the image's symbol table.
    pub fn from_elf_bytes(data: &[u8], required: &[&str]) -> Result<Self> {
        let file = object::File::parse(data)
            .map_err(|e| Error::Firmware(format!("not a readable object file: {e}")))?;

        let mut entries = HashMap::with_capacity(required.len());
        for symbol in file.symbols() {
            let Ok(name) = symbol.name() else { continue };
            if entries.contains_key(name) || !required.contains(&name) {
                continue;
            }
            let address = u32::try_from(symbol.address()).map_err(|_| {
                Error::Firmware(format!(
                    "symbol `{name}` at 0x{:X} is outside the 32-bit address space",
                    symbol.address()
                ))
            })?;
            debug!("symbol {name} @ 0x{address:08X}");
            entries.insert(name.to_owned(), address);
        }

        let table = Self { entries };
        table.require(required)?;
        info!("Resolved {} firmware symbols", table.len());
        Ok(table)
    }

    /// Read and parse the ELF image at `path`.
    pub fn from_elf_file(path: impl AsRef<Path>, required: &[&str]) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::Firmware(format!("{}: {e}", path.display())))?;
        Self::from_elf_bytes(&data, required)
    }

    /// Fail on the first name in `names` that does not resolve.
    pub fn require(&self, names: &[&str]) -> Result<()> {
        names.iter().try_for_each(|n| self.resolve(n).map(|_| ()))
    }

    pub fn resolve(&self, name: &str) -> Result<u32> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnresolvedSymbol(name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
