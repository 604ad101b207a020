//! Joint-base sensor boards.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{Field, Record, SENSOR_INDEX_BASE, Value, sensor};

/// Decoded `SensorbaseStruct`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointBaseSensor {
    /// Sensor ID as addressed by the host (`array index + 40`).
    pub id: usize,
    pub port: u8,
    pub board_revision: u8,
    pub magenc: u16,
    pub proximity: [u16; 4],
    pub adc: [u16; 4],
    pub temperature: f32,
}

impl JointBaseSensor {
    pub fn from_record(index: usize, record: &Record) -> Result<Self> {
        let quad = |field: &Field| -> Result<[u16; 4]> {
            let v = record.get_array(field)?;
            Ok(core::array::from_fn(|i| v[i].as_i64() as u16))
        };
        Ok(Self {
            id: index + SENSOR_INDEX_BASE,
            port: record.i64(&sensor::PORT)? as u8,
            board_revision: record.i64(&sensor::BOARD_REVISION)? as u8,
            magenc: record.i64(&sensor::MAGENC)? as u16,
            proximity: quad(&sensor::PROXIMITY)?,
            adc: quad(&sensor::ADC)?,
            temperature: record.f64(&sensor::TEMPERATURE)? as f32,
        })
    }
}

/// A sensor slot is populated when its port is set and the ID the board
/// stored matches the slot position.
pub fn is_valid_slot(index: usize, port: Value, id: Value) -> bool {
    port.as_i64() > 0 && id.as_i64() == ((index + SENSOR_INDEX_BASE) / 2) as i64
}
