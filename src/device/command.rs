//! Servo command frame bodies.
//!
//! Position and parameter commands are not register writes: the firmware
//! accepts them as dedicated command frames addressed by a 40-bit servo ID
//! mask.  Values follow the mask in ascending ID order.
//!
//! ```text
//! MultiServoSingleVelocity (0x10):
//! ┌──────────────┬──────────┬────────────────────────────┐
//! │ ID mask (5B) │ Vel (1B) │ Pos (2B LE) × servo count  │
//! └──────────────┴──────────┴────────────────────────────┘
//!
//! ServoParam (0x12):
//! ┌──────────────┬────────────┬────────────────────────────┐
//! │ ID mask (5B) │ Param (1B) │ Value (1B) × servo count   │
//! └──────────────┴────────────┴────────────────────────────┘
//! ```

use crate::error::{Error, Result};

/// Move several servos at one shared velocity.
pub const CMD_MULTI_SERVO_SINGLE_VELOCITY: u8 = 0x10;
/// Set one parameter on several servos.
pub const CMD_SERVO_PARAM: u8 = 0x12;
/// `ServoParam` code of the stretch (holding stiffness) parameter.
pub const PARAM_STRETCH: u8 = 0x01;

/// Servo IDs must fit the 5-byte mask.
pub const MAX_SERVO_ID: usize = 40;

/// Position code that holds the servo at its current angle.
pub const HOLD_POSITION: f64 = 32767.0;
/// Position code that releases the servo.
pub const FREE_POSITION: f64 = 32768.0;
/// Mechanical centre.
pub const NEUTRAL_POSITION: f64 = 7500.0;
/// Velocity sent with hold / free; clamps to the fastest setting.
pub const DEFAULT_VELOCITY: f64 = 1000.0;

/// Encode servo IDs as a 40-bit little-endian mask.
pub fn servo_id_mask(ids: &[usize]) -> Result<[u8; 5]> {
    let mut mask = [0u8; 5];
    for &id in ids {
        if id >= MAX_SERVO_ID {
            return Err(Error::InvalidIndex {
                what: "servo id",
                index: id,
                limit: MAX_SERVO_ID,
            });
        }
        mask[id / 8] |= 1 << (id % 8);
    }
    Ok(mask)
}

/// Round and clamp a velocity into the firmware's `1..=255` range.
pub fn velocity_byte(velocity: f64) -> u8 {
    if velocity.is_nan() {
        return 1;
    }
    velocity.round().clamp(1.0, 255.0) as u8
}

/// Pair IDs with values and sort by ID.  A repeated ID keeps its first
/// value.
fn sorted_pairs<V: Copy>(ids: &[usize], values: &[V]) -> Result<Vec<(usize, V)>> {
    if ids.len() != values.len() {
        return Err(Error::LengthMismatch {
            expected: ids.len(),
            actual: values.len(),
        });
    }
    let mut pairs: Vec<(usize, V)> = ids.iter().copied().zip(values.iter().copied()).collect();
    pairs.sort_by_key(|(id, _)| *id);
    pairs.dedup_by_key(|(id, _)| *id);
    Ok(pairs)
}

/// Body of a `MultiServoSingleVelocity` command.
///
/// Positions are clamped to `0..=0xFFFF` and rounded.
pub fn angle_vector_body(ids: &[usize], positions: &[f64], velocity: f64) -> Result<Vec<u8>> {
    let pairs = sorted_pairs(ids, positions)?;
    let sorted_ids: Vec<usize> = pairs.iter().map(|(id, _)| *id).collect();

    let mut body = Vec::with_capacity(6 + 2 * pairs.len());
    body.extend_from_slice(&servo_id_mask(&sorted_ids)?);
    body.push(velocity_byte(velocity));
    for (_, position) in pairs {
        let raw = position.clamp(0.0, f64::from(u16::MAX)).round() as u16;
        body.extend_from_slice(&raw.to_le_bytes());
    }
    Ok(body)
}

/// Body of a `ServoParam` stretch command; each value is rounded and
/// truncated to one byte.
pub fn stretch_body(ids: &[usize], values: &[f64]) -> Result<Vec<u8>> {
    let pairs = sorted_pairs(ids, values)?;
    let sorted_ids: Vec<usize> = pairs.iter().map(|(id, _)| *id).collect();

    let mut body = Vec::with_capacity(6 + pairs.len());
    body.extend_from_slice(&servo_id_mask(&sorted_ids)?);
    body.push(PARAM_STRETCH);
    body.extend(pairs.iter().map(|(_, v)| (v.round() as i64 & 0xFF) as u8));
    Ok(body)
}
