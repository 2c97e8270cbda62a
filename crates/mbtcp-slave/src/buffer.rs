//! Buffer accessors handed to request handlers.
//!
//! Handlers never see frame headers. Offsets are relative to the first
//! coil or register of the current operation, not to the start of the
//! frame.

use crate::frame::be_u16;
use tracing::warn;

/// Read-only view of the register values carried by a Write Multiple
/// Registers request.
#[derive(Debug, Clone, Copy)]
pub struct RequestData<'a> {
    data: &'a [u8],
}

impl<'a> RequestData<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Number of registers carried by the request.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / 2
    }

    /// Check whether the request carries no register values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the register at `offset`.
    ///
    /// Returns `None` past the last register of the request.
    #[must_use]
    pub fn register(&self, offset: usize) -> Option<u16> {
        let start = offset.checked_mul(2)?;
        if start + 2 > self.data.len() {
            return None;
        }
        Some(be_u16(self.data, start))
    }

    /// Iterate over all register values in order.
    pub fn registers(&self) -> impl Iterator<Item = u16> + 'a {
        self.data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
    }
}

/// Writable view of a read response's data region.
///
/// The region spans from the first data byte to the end of the output
/// buffer; only the first [`ResponseData::data_len`] bytes are transmitted.
#[derive(Debug)]
pub struct ResponseData<'a> {
    region: &'a mut [u8],
    data_len: usize,
}

impl<'a> ResponseData<'a> {
    pub(crate) fn new(region: &'a mut [u8], data_len: usize) -> Self {
        Self { region, data_len }
    }

    /// Number of data bytes this response will carry.
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Data bytes that will be transmitted.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.region[..self.data_len]
    }

    /// Encode a coil state at coil `offset`.
    ///
    /// Sets the bit for `true`, clears it for `false`. Offsets beyond the
    /// buffer are ignored.
    pub fn write_coil(&mut self, offset: usize, on: bool) {
        let bit = offset % 8;
        let Some(byte) = self.region.get_mut(offset / 8) else {
            warn!(offset, "Coil offset outside response buffer, ignored");
            return;
        };
        if on {
            *byte |= 1 << bit;
        } else {
            *byte &= !(1 << bit);
        }
    }

    /// Encode a register value (big-endian) at register `offset`.
    ///
    /// Offsets beyond the buffer are ignored.
    pub fn write_register(&mut self, offset: usize, value: u16) {
        let start = offset.saturating_mul(2);
        match self.region.get_mut(start..start.saturating_add(2)) {
            Some(slot) => slot.copy_from_slice(&value.to_be_bytes()),
            None => warn!(offset, "Register offset outside response buffer, ignored"),
        }
    }

    /// Copy a raw byte string starting at register `offset`.
    ///
    /// Nothing is written if the copy would run past the buffer; the
    /// return value tells whether the bytes were copied.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> bool {
        let start = offset.saturating_mul(2);
        match self.region.get_mut(start..start.saturating_add(bytes.len())) {
            Some(slot) => {
                slot.copy_from_slice(bytes);
                true
            }
            None => {
                warn!(
                    offset,
                    len = bytes.len(),
                    "Byte string exceeds response buffer, not written"
                );
                false
            }
        }
    }
}
