//! Modbus TCP wire format: MBAP prefix, function codes and frame offsets.
//!
//! Request layout (all multi-byte fields big-endian):
//!
//! ```text
//! 0      2      4      6     7    8          10         12
//! +------+------+------+-----+----+----------+----------+----------------
//! | txid | prot | len  | uid | fc | address  | count /  | byte count +
//! |      | = 0  |      |     |    |          | status   | data (FC 0x10)
//! +------+------+------+-----+----+----------+----------+----------------
//! ```
//!
//! Responses mirror the prefix and carry either a byte count followed by
//! data (reads) or the echoed address and value/count (writes).

use std::fmt;

/// Length of the MBAP prefix (transaction id, protocol id, length).
pub const MBAP_LEN: usize = 6;

/// Offset of the unit identifier.
pub const UNIT_ID_OFFSET: usize = MBAP_LEN;

/// Offset of the function code.
pub const FUNCTION_OFFSET: usize = MBAP_LEN + 1;

/// Offset of the first payload field (address).
pub const PAYLOAD_OFFSET: usize = MBAP_LEN + 2;

/// Offset of the byte-count field in a read response.
pub const BYTE_COUNT_OFFSET: usize = MBAP_LEN + 2;

/// Offset of the first data byte in a read response.
pub const RESPONSE_DATA_OFFSET: usize = MBAP_LEN + 3;

/// Offset of the first register value in a Write Multiple Registers request.
pub const REQUEST_DATA_OFFSET: usize = MBAP_LEN + 7;

/// Shortest request accepted: prefix, unit id, function code, 4 payload bytes.
pub const MIN_REQUEST_LEN: usize = MBAP_LEN + 6;

/// Length of a write response: prefix, unit id, function code, 4 echoed bytes.
pub const WRITE_RESPONSE_LEN: usize = MBAP_LEN + 6;

/// Default buffer capacity, the largest Modbus TCP ADU.
pub const DEFAULT_CAPACITY: usize = 260;

/// Coil status value for ON in Write Single Coil.
pub const COIL_ON: u16 = 0xFF00;

/// Coil status value for OFF in Write Single Coil.
pub const COIL_OFF: u16 = 0x0000;

/// Modbus function codes served by the slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    /// Read Coils (0x01).
    ReadCoils = 0x01,
    /// Read Discrete Inputs (0x02).
    ReadDiscreteInputs = 0x02,
    /// Read Holding Registers (0x03).
    ReadHoldingRegisters = 0x03,
    /// Read Input Registers (0x04).
    ReadInputRegisters = 0x04,
    /// Write Single Coil (0x05).
    WriteSingleCoil = 0x05,
    /// Write Multiple Registers (0x10).
    WriteMultipleRegisters = 0x10,
}

impl FunctionCode {
    /// Parse a function code from a byte value.
    ///
    /// Returns `None` for codes this slave does not serve.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::ReadCoils),
            0x02 => Some(Self::ReadDiscreteInputs),
            0x03 => Some(Self::ReadHoldingRegisters),
            0x04 => Some(Self::ReadInputRegisters),
            0x05 => Some(Self::WriteSingleCoil),
            0x10 => Some(Self::WriteMultipleRegisters),
            _ => None,
        }
    }

    /// Raw byte value.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        };
        write!(f, "{name} (0x{:02X})", self.as_byte())
    }
}

/// The 6-byte MBAP prefix.
///
/// The unit identifier that completes the standard MBAP header is handled
/// separately because it takes part in request validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    /// Transaction identifier, echoed verbatim in the response.
    pub transaction_id: u16,
    /// Protocol identifier, 0 for Modbus.
    pub protocol_id: u16,
    /// Number of bytes following the prefix.
    pub length: u16,
}

impl MbapHeader {
    /// Prefix size in bytes.
    pub const SIZE: usize = MBAP_LEN;

    /// Parse a prefix from the start of `bytes`.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            transaction_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            protocol_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            length: u16::from_be_bytes([bytes[4], bytes[5]]),
        })
    }

    /// Write the prefix into the first [`Self::SIZE`] bytes of `out`.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`Self::SIZE`].
    pub fn write_to(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.transaction_id.to_be_bytes());
        out[2..4].copy_from_slice(&self.protocol_id.to_be_bytes());
        out[4..6].copy_from_slice(&self.length.to_be_bytes());
    }
}

/// Read a big-endian `u16` at `offset`.
#[inline]
pub(crate) fn be_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}
