//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter  | Implements | Connects to              |
//! |----------|------------|--------------------------|
//! | `serial` | Transport  | USB serial (serialport)  |

#[cfg(feature = "serial")]
pub mod serial;
