//! ARMH7 link library.
//!
//! Host-side engine for the ARM H7 servo control board: resolves firmware
//! symbols, frames checksummed register requests, and exposes the
//! board's record arrays (servos, sensors, worm modules, IMU) as typed
//! operations.  The serial adapter is behind the `serial` feature; the
//! rest is transport-agnostic and tested against simulated boards.

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod schema;
pub mod symbols;

pub use config::LinkConfig;
pub use device::Armh7Device;
pub use error::{Error, Result};
