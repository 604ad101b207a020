//! Static layout tables for the record arrays resident in board RAM.
//!
//! Every record kind the host touches is described by a `'static`
//! [`StructSchema`]: its firmware symbol, record size, field offsets and
//! the number of consecutive records in the array.  The tables are
//! read-only and shared by the whole process.
//!
//! The offsets are a naturally aligned layout of the firmware's field
//! lists; check them against the firmware's struct header before relying
//! on them for a new board build.
//!
//! ```text
//!  symbol("servo_vector")
//!  │
//!  ▼
//!  ┌──────────── record 0 ────────────┬──────────── record 1 ───── …
//!  │ flag │ … │ current_angle │ params │ flag │ … │ current_angle │
//!  └──────────────────────────────────┴─────────────────────────── …
//!  ◀──────────── record_size ────────▶
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Error, FrameError, Result};

/// Number of servo slots in the firmware's servo array.
pub const RCB4_DOF: u32 = 36;

/// Number of sensor / worm-module slots.
pub const MAX_SENSOR_NUM: u32 = 20;

/// Joint-base sensor IDs start at this index.
pub const SENSOR_INDEX_BASE: usize = 40;

// ---------------------------------------------------------------------------
// Numeric wire types
// ---------------------------------------------------------------------------

/// On-wire numeric encoding of a field.  All values are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericType {
    Int32,
    UInt8,
    UInt16,
    Float32,
    Float64,
}

impl NumericType {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::UInt8 => 1,
            Self::UInt16 => 2,
            Self::Int32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Decode one element from the front of `bytes`.
    ///
    /// Returns `None` if fewer than [`size`](Self::size) bytes are given.
    pub fn decode(self, bytes: &[u8]) -> Option<Value> {
        let raw = bytes.get(..self.size())?;
        let value = match self {
            Self::UInt8 => Value::UInt8(raw[0]),
            Self::UInt16 => Value::UInt16(u16::from_le_bytes(raw.try_into().ok()?)),
            Self::Int32 => Value::Int32(i32::from_le_bytes(raw.try_into().ok()?)),
            Self::Float32 => Value::Float32(f32::from_le_bytes(raw.try_into().ok()?)),
            Self::Float64 => Value::Float64(f64::from_le_bytes(raw.try_into().ok()?)),
        };
        Some(value)
    }

    /// Whether `value`, rounded, is representable.  Floats accept anything;
    /// `Int32` spans `i32::MIN..=u32::MAX` so that addresses fit.
    pub fn accepts(self, value: f64) -> bool {
        let (min, max) = match self {
            Self::UInt8 => (0.0, f64::from(u8::MAX)),
            Self::UInt16 => (0.0, f64::from(u16::MAX)),
            Self::Int32 => (f64::from(i32::MIN), f64::from(u32::MAX)),
            Self::Float32 | Self::Float64 => return true,
        };
        (min..=max).contains(&value.round())
    }

    /// Encode `value` into the first [`size`](Self::size) bytes of `out`.
    ///
    /// Integer types round to the nearest integer first.  `Int32` keeps the
    /// bit pattern of values in the `u32` range so that 32-bit addresses
    /// survive the trip.  Unsigned narrow types saturate.
    pub fn encode(self, value: f64, out: &mut [u8]) -> Option<()> {
        let out = out.get_mut(..self.size())?;
        match self {
            Self::UInt8 => out[0] = value.round() as u8,
            Self::UInt16 => out.copy_from_slice(&(value.round() as u16).to_le_bytes()),
            Self::Int32 => out.copy_from_slice(&((value.round() as i64) as i32).to_le_bytes()),
            Self::Float32 => out.copy_from_slice(&(value as f32).to_le_bytes()),
            Self::Float64 => out.copy_from_slice(&value.to_le_bytes()),
        }
        Some(())
    }
}

/// A decoded field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    UInt8(u8),
    UInt16(u16),
    Float32(f32),
    Float64(f64),
}

impl Value {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int32(v) => v as f64,
            Self::UInt8(v) => v as f64,
            Self::UInt16(v) => v as f64,
            Self::Float32(v) => v as f64,
            Self::Float64(v) => v,
        }
    }

    /// Integer view; floats truncate toward zero.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Int32(v) => v as i64,
            Self::UInt8(v) => v as i64,
            Self::UInt16(v) => v as i64,
            Self::Float32(v) => v as i64,
            Self::Float64(v) => v as i64,
        }
    }

    pub fn numeric_type(self) -> NumericType {
        match self {
            Self::Int32(_) => NumericType::Int32,
            Self::UInt8(_) => NumericType::UInt8,
            Self::UInt16(_) => NumericType::UInt16,
            Self::Float32(_) => NumericType::Float32,
            Self::Float64(_) => NumericType::Float64,
        }
    }
}

// ---------------------------------------------------------------------------
// Field and record descriptors
// ---------------------------------------------------------------------------

/// One field of a firmware struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    /// Byte offset from the start of the record.
    pub offset: u16,
    pub numeric_type: NumericType,
    /// Element count; 1 for scalars.
    pub count: u16,
}

impl Field {
    pub const fn scalar(name: &'static str, offset: u16, numeric_type: NumericType) -> Self {
        Self {
            name,
            offset,
            numeric_type,
            count: 1,
        }
    }

    pub const fn array(
        name: &'static str,
        offset: u16,
        numeric_type: NumericType,
        count: u16,
    ) -> Self {
        Self {
            name,
            offset,
            numeric_type,
            count,
        }
    }

    /// Size of a single element.
    pub const fn size(&self) -> usize {
        self.numeric_type.size()
    }

    /// Bytes occupied inside the record.
    pub const fn span(&self) -> usize {
        self.numeric_type.size() * self.count as usize
    }

    pub const fn is_scalar(&self) -> bool {
        self.count == 1
    }
}

/// Layout of a record type repeated `array_length` times in board RAM.
#[derive(Debug, PartialEq, Eq)]
pub struct StructSchema {
    /// C type name, for diagnostics.
    pub name: &'static str,
    /// Firmware variable holding record 0.
    pub symbol: &'static str,
    pub record_size: u16,
    pub fields: &'static [Field],
    pub array_length: u32,
}

impl StructSchema {
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, field: &Field) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Reject fields that belong to another record kind.
    pub fn check_field(&self, field: &Field) -> Result<()> {
        if self.contains(field) {
            Ok(())
        } else {
            Err(Error::UnknownField {
                record: self.name,
                field: field.name.to_owned(),
            })
        }
    }

    pub fn check_index(&self, index: usize) -> Result<()> {
        if index < self.array_length as usize {
            Ok(())
        } else {
            Err(Error::InvalidIndex {
                what: self.name,
                index,
                limit: self.array_length as usize,
            })
        }
    }

    /// Address of record `index`: `base + index * record_size`.
    pub fn record_address(&self, base: u32, index: usize) -> Result<u32> {
        self.check_index(index)?;
        let offset = index as u64 * u64::from(self.record_size);
        u32::try_from(u64::from(base) + offset).map_err(|_| Error::InvalidIndex {
            what: self.name,
            index,
            limit: self.array_length as usize,
        })
    }

    /// Address of `field` inside record `index`.
    pub fn field_address(&self, base: u32, index: usize, field: &Field) -> Result<u32> {
        self.check_field(field)?;
        let record = self.record_address(base, index)?;
        record
            .checked_add(u32::from(field.offset))
            .ok_or(Error::InvalidIndex {
                what: self.name,
                index,
                limit: self.array_length as usize,
            })
    }
}

// ---------------------------------------------------------------------------
// Record kinds
// ---------------------------------------------------------------------------

/// Closed set of record arrays the host knows how to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Servo,
    Sensor,
    WormModule,
    Imu,
    DataAddress,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        Self::Servo,
        Self::Sensor,
        Self::WormModule,
        Self::Imu,
        Self::DataAddress,
    ];

    pub fn schema(self) -> &'static StructSchema {
        match self {
            Self::Servo => &SERVO_SCHEMA,
            Self::Sensor => &SENSOR_SCHEMA,
            Self::WormModule => &WORM_SCHEMA,
            Self::Imu => &IMU_SCHEMA,
            Self::DataAddress => &DATA_ADDRESS_SCHEMA,
        }
    }
}

use NumericType::{Float32, Int32, UInt8, UInt16};

/// `ServoStruct` fields.
pub mod servo {
    use super::{Field, UInt8, UInt16};

    pub const FLAG: Field = Field::scalar("flag", 0, UInt8);
    pub const ROTATION: Field = Field::scalar("rotation", 1, UInt8);
    pub const FEEDBACK: Field = Field::scalar("feedback", 2, UInt8);
    pub const MODE: Field = Field::scalar("mode", 3, UInt8);
    pub const REF_ANGLE: Field = Field::scalar("ref_angle", 4, UInt16);
    pub const CURRENT_ANGLE: Field = Field::scalar("current_angle", 6, UInt16);
    pub const TEMPERATURE: Field = Field::scalar("temperature", 8, UInt16);
    pub const CURRENT: Field = Field::scalar("current", 10, UInt16);
    pub const ERROR_ANGLE: Field = Field::scalar("error_angle", 12, UInt16);
    /// EEPROM image, one nibble per byte.
    pub const PARAMS: Field = Field::array("params", 16, UInt8, 64);
}

/// `SensorbaseStruct` fields.
pub mod sensor {
    use super::{Field, Float32, UInt8, UInt16};

    pub const PORT: Field = Field::scalar("port", 0, UInt8);
    pub const ID: Field = Field::scalar("id", 1, UInt8);
    pub const BOARD_REVISION: Field = Field::scalar("board_revision", 2, UInt8);
    pub const MAGENC: Field = Field::scalar("magenc", 4, UInt16);
    pub const PROXIMITY: Field = Field::array("ps", 6, UInt16, 4);
    pub const ADC: Field = Field::array("adc", 14, UInt16, 4);
    pub const TEMPERATURE: Field = Field::scalar("temperature", 24, Float32);
}

/// `WormmoduleStruct` fields.
pub mod worm {
    use super::{Field, Float32, UInt8, UInt16};

    pub const MODULE_TYPE: Field = Field::scalar("module_type", 0, UInt8);
    pub const SERVO_ID: Field = Field::scalar("servo_id", 1, UInt8);
    pub const SENSOR_ID: Field = Field::scalar("sensor_id", 2, UInt8);
    pub const MOVE_STATE: Field = Field::scalar("move_state", 3, UInt8);
    pub const MAGENC_INIT: Field = Field::scalar("magenc_init", 4, UInt16);
    pub const MAGENC_PRESENT: Field = Field::scalar("magenc_present", 6, UInt16);
    pub const PRESENT_ANGLE: Field = Field::scalar("present_angle", 8, Float32);
    pub const REF_ANGLE: Field = Field::scalar("ref_angle", 12, Float32);
    pub const THRESHOLD: Field = Field::scalar("threshold", 16, Float32);
    pub const THRESHOLD_SCALE: Field = Field::scalar("threshold_scale", 20, Float32);
    pub const LINEAR_UPPER_LIMIT: Field = Field::scalar("linear_upper_limit", 24, Float32);
    pub const TIMEOUT_TIME_SCALE: Field = Field::scalar("timeout_time_scale", 28, Float32);
    pub const GEAR_RATIO: Field = Field::scalar("gear_ratio", 32, Float32);

    /// `module_type` value of a worm actuator.
    pub const WORM_ACTUATOR: u8 = 1;
}

/// Madgwick filter state.
pub mod imu {
    use super::{Field, Float32};

    pub const Q0: Field = Field::scalar("q0", 0, Float32);
    pub const Q1: Field = Field::scalar("q1", 4, Float32);
    pub const Q2: Field = Field::scalar("q2", 8, Float32);
    pub const Q3: Field = Field::scalar("q3", 12, Float32);
    pub const ROLL: Field = Field::scalar("roll", 16, Float32);
    pub const PITCH: Field = Field::scalar("pitch", 20, Float32);
    pub const YAW: Field = Field::scalar("yaw", 24, Float32);
    pub const GYRO: Field = Field::array("gyro", 28, Float32, 3);
    pub const ACC: Field = Field::array("acc", 40, Float32, 3);
    pub const BETA: Field = Field::scalar("beta", 52, Float32);
}

/// Flash bookkeeping record read by the firmware's `rom_to_flash`.
pub mod data_address {
    use super::{Field, Int32};

    pub const SIDATA: Field = Field::scalar("_sidata", 0, Int32);
    pub const SDATA: Field = Field::scalar("_sdata", 4, Int32);
    pub const EDATA: Field = Field::scalar("_edata", 8, Int32);
    pub const DATA_SIZE: Field = Field::scalar("data_size", 12, Int32);
}

pub static SERVO_SCHEMA: StructSchema = StructSchema {
    name: "ServoStruct",
    symbol: "servo_vector",
    record_size: 80,
    fields: &[
        servo::FLAG,
        servo::ROTATION,
        servo::FEEDBACK,
        servo::MODE,
        servo::REF_ANGLE,
        servo::CURRENT_ANGLE,
        servo::TEMPERATURE,
        servo::CURRENT,
        servo::ERROR_ANGLE,
        servo::PARAMS,
    ],
    array_length: RCB4_DOF,
};

pub static SENSOR_SCHEMA: StructSchema = StructSchema {
    name: "SensorbaseStruct",
    symbol: "Sensor_vector",
    record_size: 28,
    fields: &[
        sensor::PORT,
        sensor::ID,
        sensor::BOARD_REVISION,
        sensor::MAGENC,
        sensor::PROXIMITY,
        sensor::ADC,
        sensor::TEMPERATURE,
    ],
    array_length: MAX_SENSOR_NUM,
};

pub static WORM_SCHEMA: StructSchema = StructSchema {
    name: "WormmoduleStruct",
    symbol: "Worm_vector",
    record_size: 36,
    fields: &[
        worm::MODULE_TYPE,
        worm::SERVO_ID,
        worm::SENSOR_ID,
        worm::MOVE_STATE,
        worm::MAGENC_INIT,
        worm::MAGENC_PRESENT,
        worm::PRESENT_ANGLE,
        worm::REF_ANGLE,
        worm::THRESHOLD,
        worm::THRESHOLD_SCALE,
        worm::LINEAR_UPPER_LIMIT,
        worm::TIMEOUT_TIME_SCALE,
        worm::GEAR_RATIO,
    ],
    array_length: MAX_SENSOR_NUM,
};

pub static IMU_SCHEMA: StructSchema = StructSchema {
    name: "Madgwick",
    symbol: "Mfilter",
    record_size: 56,
    fields: &[
        imu::Q0,
        imu::Q1,
        imu::Q2,
        imu::Q3,
        imu::ROLL,
        imu::PITCH,
        imu::YAW,
        imu::GYRO,
        imu::ACC,
        imu::BETA,
    ],
    array_length: 1,
};

pub static DATA_ADDRESS_SCHEMA: StructSchema = StructSchema {
    name: "DataAddress",
    symbol: "data_address",
    record_size: 16,
    fields: &[
        data_address::SIDATA,
        data_address::SDATA,
        data_address::EDATA,
        data_address::DATA_SIZE,
    ],
    array_length: 1,
};

// ---------------------------------------------------------------------------
// Decoded record
// ---------------------------------------------------------------------------

/// Raw bytes of one record instance, decoded field by field on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: &'static StructSchema,
    bytes: Vec<u8>,
}

impl Record {
    pub fn new(schema: &'static StructSchema, bytes: Vec<u8>) -> Result<Self> {
        let expected = schema.record_size as usize;
        if bytes.len() != expected {
            return Err(FrameError::UnexpectedPayload {
                expected,
                actual: bytes.len(),
            }
            .into());
        }
        Ok(Self { schema, bytes })
    }

    pub fn schema(&self) -> &'static StructSchema {
        self.schema
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// First (or only) element of `field`.
    pub fn get(&self, field: &Field) -> Result<Value> {
        self.schema.check_field(field)?;
        self.element(field, 0)
    }

    /// All elements of an array field.
    pub fn get_array(&self, field: &Field) -> Result<Vec<Value>> {
        self.schema.check_field(field)?;
        (0..field.count as usize)
            .map(|i| self.element(field, i))
            .collect()
    }

    /// Look a field up by name.
    pub fn value(&self, name: &str) -> Result<Value> {
        let field = self.schema.field(name).ok_or_else(|| Error::UnknownField {
            record: self.schema.name,
            field: name.to_owned(),
        })?;
        self.get(field)
    }

    /// Scalar field as `f64`.
    pub fn f64(&self, field: &Field) -> Result<f64> {
        self.get(field).map(Value::as_f64)
    }

    /// Scalar field as `i64`.
    pub fn i64(&self, field: &Field) -> Result<i64> {
        self.get(field).map(Value::as_i64)
    }

    fn element(&self, field: &Field, i: usize) -> Result<Value> {
        let start = field.offset as usize + i * field.size();
        self.bytes
            .get(start..)
            .and_then(|b| field.numeric_type.decode(b))
            .ok_or(
                FrameError::UnexpectedPayload {
                    expected: start + field.size(),
                    actual: self.bytes.len(),
                }
                .into(),
            )
    }
}
