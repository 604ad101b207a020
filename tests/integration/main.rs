//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the simulated board.  All tests run on the host with no real
//! hardware required.

mod device_ops_tests;
mod discovery_tests;
mod register_tests;
