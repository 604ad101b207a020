//! Orientation estimate from the board's Madgwick filter.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{Field, Record, imu};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    /// `[q0, q1, q2, q3]`, scalar first.
    pub quaternion: [f32; 4],
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub gyro: [f32; 3],
    pub acc: [f32; 3],
}

impl Orientation {
    pub fn from_record(record: &Record) -> Result<Self> {
        let f = |field: &Field| record.f64(field).map(|v| v as f32);
        let triple = |field: &Field| -> Result<[f32; 3]> {
            let v = record.get_array(field)?;
            Ok([v[0].as_f64() as f32, v[1].as_f64() as f32, v[2].as_f64() as f32])
        };
        Ok(Self {
            quaternion: [f(&imu::Q0)?, f(&imu::Q1)?, f(&imu::Q2)?, f(&imu::Q3)?],
            roll: f(&imu::ROLL)?,
            pitch: f(&imu::PITCH)?,
            yaw: f(&imu::YAW)?,
            gyro: triple(&imu::GYRO)?,
            acc: triple(&imu::ACC)?,
        })
    }

    pub fn rpy(&self) -> [f32; 3] {
        [self.roll, self.pitch, self.yaw]
    }

    /// Euclidean norm of the gyro vector.
    pub fn gyro_norm(&self) -> f32 {
        self.gyro.iter().map(|g| g * g).sum::<f32>().sqrt()
    }
}
