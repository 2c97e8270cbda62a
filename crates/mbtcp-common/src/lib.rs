#![doc = "Common types shared across the Modbus TCP slave workspace."]

pub mod config;
pub mod error;

pub use config::*;
pub use error::*;
