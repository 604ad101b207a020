//! Worm-gear module calibration.

use serde::{Deserialize, Serialize};

use super::command::NEUTRAL_POSITION;
use crate::schema::{Field, worm};

/// Magnetic encoder counts per revolution.
pub const MAGENC_RANGE: i32 = 1 << 14;

/// Servo position offset that drives a worm module towards its target.
pub const WORM_DRIVE_OFFSET: f64 = 135.0 * 30.0;
/// Velocity used while driving a worm module.
pub const WORM_DRIVE_VELOCITY: f64 = 10.0;

/// Calibration values for one worm module.
///
/// Every field is optional: `None` leaves the stored value untouched.
/// `move_state` is always reset to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WormCalibration {
    pub module_type: Option<u8>,
    pub servo_idx: Option<u8>,
    pub sensor_idx: Option<u8>,
    /// Stored modulo 2^14.
    pub magenc_offset: Option<i32>,
    pub upper_limit: Option<f32>,
    pub threshold_scale: Option<f32>,
    pub timeout_time_scale: Option<f32>,
    pub gear_ratio: Option<f32>,
}

impl WormCalibration {
    /// Stock limits and scales for a newly fitted module.
    pub fn factory() -> Self {
        Self {
            upper_limit: Some(69.0),
            threshold_scale: Some(5.0),
            timeout_time_scale: Some(1.25),
            gear_ratio: Some(20.0),
            ..Self::default()
        }
    }

    pub fn module_type(mut self, v: u8) -> Self {
        self.module_type = Some(v);
        self
    }

    pub fn servo_idx(mut self, v: u8) -> Self {
        self.servo_idx = Some(v);
        self
    }

    pub fn sensor_idx(mut self, v: u8) -> Self {
        self.sensor_idx = Some(v);
        self
    }

    pub fn magenc_offset(mut self, v: i32) -> Self {
        self.magenc_offset = Some(v);
        self
    }

    /// Field writes in the order the firmware expects them.
    pub fn writes(&self) -> Vec<(&'static Field, f64)> {
        let mut out = Vec::with_capacity(9);
        let mut push = |field: &'static Field, value: Option<f64>| {
            if let Some(v) = value {
                out.push((field, v));
            }
        };
        push(&worm::MODULE_TYPE, self.module_type.map(f64::from));
        push(&worm::SERVO_ID, self.servo_idx.map(f64::from));
        push(&worm::SENSOR_ID, self.sensor_idx.map(f64::from));
        push(&worm::MOVE_STATE, Some(0.0));
        push(
            &worm::MAGENC_INIT,
            self.magenc_offset
                .map(|v| f64::from(v.rem_euclid(MAGENC_RANGE))),
        );
        push(&worm::LINEAR_UPPER_LIMIT, self.upper_limit.map(f64::from));
        push(&worm::THRESHOLD_SCALE, self.threshold_scale.map(f64::from));
        push(&worm::TIMEOUT_TIME_SCALE, self.timeout_time_scale.map(f64::from));
        push(&worm::GEAR_RATIO, self.gear_ratio.map(f64::from));
        out
    }
}

/// Servo position that drives a worm module in direction `sign`.
pub fn drive_target(sign: f64) -> f64 {
    sign * WORM_DRIVE_OFFSET + NEUTRAL_POSITION
}
