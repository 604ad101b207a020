//! Servo EEPROM parameter decoding.
//!
//! The firmware mirrors each servo's 64-byte EEPROM image into
//! `ServoStruct.params`, one nibble per byte.  A parameter is rebuilt by
//! gathering its nibbles (1-based byte positions, most significant first).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Named parameters of the servo EEPROM image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EepromParam {
    FixHeader,
    StretchGain,
    Speed,
    Punch,
    DeadBand,
    Dumping,
    SafeTimer,
    /// b7 slave, b4 rotation, b3 pwm, b1 free, b0 reverse.
    ModeFlag,
    PulseMaxLimit,
    PulseMinLimit,
    /// 0x10 = 115200, 0x00 = 1250000.
    IcsBaudRate,
    TemperatureLimit,
    CurrentLimit,
    Response,
    UserOffset,
    ServoId,
    Stretch1,
    Stretch2,
    Stretch3,
}

impl EepromParam {
    pub const ALL: [EepromParam; 19] = [
        Self::FixHeader,
        Self::StretchGain,
        Self::Speed,
        Self::Punch,
        Self::DeadBand,
        Self::Dumping,
        Self::SafeTimer,
        Self::ModeFlag,
        Self::PulseMaxLimit,
        Self::PulseMinLimit,
        Self::IcsBaudRate,
        Self::TemperatureLimit,
        Self::CurrentLimit,
        Self::Response,
        Self::UserOffset,
        Self::ServoId,
        Self::Stretch1,
        Self::Stretch2,
        Self::Stretch3,
    ];

    /// 1-based byte positions holding this parameter's nibbles.
    pub const fn nibbles(self) -> &'static [usize] {
        match self {
            Self::FixHeader => &[1, 2],
            Self::StretchGain => &[3, 4],
            Self::Speed => &[5, 6],
            Self::Punch => &[7, 8],
            Self::DeadBand => &[9, 10],
            Self::Dumping => &[11, 12],
            Self::SafeTimer => &[13, 14],
            Self::ModeFlag => &[15, 16],
            Self::PulseMaxLimit => &[17, 18, 19, 20],
            Self::PulseMinLimit => &[21, 22, 23, 24],
            Self::IcsBaudRate => &[27, 28],
            Self::TemperatureLimit => &[29, 30],
            Self::CurrentLimit => &[31, 32],
            Self::Response => &[51, 52],
            Self::UserOffset => &[53, 54],
            Self::ServoId => &[57, 58],
            Self::Stretch1 => &[59, 60],
            Self::Stretch2 => &[61, 62],
            Self::Stretch3 => &[63, 64],
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::FixHeader => "fix_header",
            Self::StretchGain => "stretch_gain",
            Self::Speed => "speed",
            Self::Punch => "punch",
            Self::DeadBand => "dead_band",
            Self::Dumping => "dumping",
            Self::SafeTimer => "safe_timer",
            Self::ModeFlag => "mode_flag",
            Self::PulseMaxLimit => "pulse_max_limit",
            Self::PulseMinLimit => "pulse_min_limit",
            Self::IcsBaudRate => "ics_baud_rate",
            Self::TemperatureLimit => "temperature_limit",
            Self::CurrentLimit => "current_limit",
            Self::Response => "response",
            Self::UserOffset => "user_offset",
            Self::ServoId => "servo_id",
            Self::Stretch1 => "stretch_1",
            Self::Stretch2 => "stretch_2",
            Self::Stretch3 => "stretch_3",
        }
    }

    /// Decode this parameter from a nibble-per-byte image.
    pub fn decode(self, image: &[u8]) -> Option<u32> {
        four_bit_to_num(self.nibbles(), image)
    }
}

impl fmt::Display for EepromParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Concatenate the low nibbles of `values` at the 1-based `indices`.
///
/// Returns `None` if an index is 0 or past the end of `values`.
pub fn four_bit_to_num(indices: &[usize], values: &[u8]) -> Option<u32> {
    indices.iter().try_fold(0u32, |acc, &index| {
        let nibble = values.get(index.checked_sub(1)?)? & 0x0F;
        Some((acc << 4) | u32::from(nibble))
    })
}
