//! Modbus TCP slave for single-connection embedded devices.
//!
//! This crate provides:
//! - [`FrameProcessor`] owning the request/response buffers, the admission
//!   policy and the function-code state machine
//! - [`Transport`] and [`Connection`] traits with a non-blocking
//!   [`TcpTransport`] implementation
//! - [`ResponseData`] and [`RequestData`] accessors for request handlers
//! - [`RegisterBank`] serving coils and registers from memory
//! - [`PollStats`] activity counters

pub mod bank;
pub mod buffer;
pub mod frame;
pub mod handler;
pub mod processor;
pub mod stats;
pub mod transport;

pub use bank::*;
pub use buffer::*;
pub use frame::{FunctionCode, MbapHeader, COIL_OFF, COIL_ON, DEFAULT_CAPACITY};
pub use handler::*;
pub use processor::*;
pub use stats::*;
pub use transport::*;
