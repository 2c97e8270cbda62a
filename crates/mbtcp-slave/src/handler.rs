//! Application handler slots.
//!
//! The processor carries one optional handler per operation category.
//! An empty slot still produces a response (zero-filled for reads, echoed
//! for writes) without any side effect.

use crate::buffer::{RequestData, ResponseData};
use crate::frame::FunctionCode;
use std::fmt;

/// Handler for Read Coils and Read Discrete Inputs.
///
/// Receives the function code, start address and coil count, and fills
/// the zeroed response through [`ResponseData::write_coil`].
pub type ReadCoilsHandler = Box<dyn FnMut(FunctionCode, u16, u16, &mut ResponseData<'_>)>;

/// Handler for Read Holding Registers and Read Input Registers.
///
/// Receives the function code, start address and register count, and fills
/// the zeroed response through [`ResponseData::write_register`].
pub type ReadRegistersHandler = Box<dyn FnMut(FunctionCode, u16, u16, &mut ResponseData<'_>)>;

/// Handler for Write Single Coil: function code, address, new state.
pub type WriteCoilHandler = Box<dyn FnMut(FunctionCode, u16, bool)>;

/// Handler for Write Multiple Registers.
///
/// Receives the function code, start address and register count; values are
/// decoded through [`RequestData::register`].
pub type WriteRegistersHandler = Box<dyn FnMut(FunctionCode, u16, u16, &RequestData<'_>)>;

/// Operation categories that accept a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Read Coils / Read Discrete Inputs.
    ReadCoils,
    /// Read Holding Registers / Read Input Registers.
    ReadRegisters,
    /// Write Single Coil.
    WriteCoil,
    /// Write Multiple Registers.
    WriteMultipleRegisters,
}

impl HandlerKind {
    /// Category serving the given function code.
    #[must_use]
    pub fn for_function(function: FunctionCode) -> Self {
        match function {
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => Self::ReadCoils,
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
                Self::ReadRegisters
            }
            FunctionCode::WriteSingleCoil => Self::WriteCoil,
            FunctionCode::WriteMultipleRegisters => Self::WriteMultipleRegisters,
        }
    }
}

/// The four optional handler slots.
#[derive(Default)]
pub struct Handlers {
    pub(crate) read_coils: Option<ReadCoilsHandler>,
    pub(crate) read_registers: Option<ReadRegistersHandler>,
    pub(crate) write_coil: Option<WriteCoilHandler>,
    pub(crate) write_registers: Option<WriteRegistersHandler>,
}

impl Handlers {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a handler is installed for `kind`.
    #[must_use]
    pub fn is_set(&self, kind: HandlerKind) -> bool {
        match kind {
            HandlerKind::ReadCoils => self.read_coils.is_some(),
            HandlerKind::ReadRegisters => self.read_registers.is_some(),
            HandlerKind::WriteCoil => self.write_coil.is_some(),
            HandlerKind::WriteMultipleRegisters => self.write_registers.is_some(),
        }
    }

    /// Remove the handler for `kind`, if any.
    pub fn clear(&mut self, kind: HandlerKind) {
        match kind {
            HandlerKind::ReadCoils => self.read_coils = None,
            HandlerKind::ReadRegisters => self.read_registers = None,
            HandlerKind::WriteCoil => self.write_coil = None,
            HandlerKind::WriteMultipleRegisters => self.write_registers = None,
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("read_coils", &self.read_coils.is_some())
            .field("read_registers", &self.read_registers.is_some())
            .field("write_coil", &self.write_coil.is_some())
            .field("write_registers", &self.write_registers.is_some())
            .finish()
    }
}
