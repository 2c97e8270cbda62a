//! Acceptance tests for the Modbus TCP slave.
//!
//! - `master_test`: function codes as seen from a master
//! - `config_test`: slaves built from TOML configuration files
//! - `soak_test`: long request sequences on a single connection

mod config_test;
mod master_test;
mod soak_test;
