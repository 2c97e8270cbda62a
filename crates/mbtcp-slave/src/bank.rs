//! In-memory register bank.
//!
//! Stores coils, discrete inputs, holding registers and input registers
//! and serves them through the processor's handler slots. Reads outside
//! the bank leave the zero fill in place; writes outside the bank are
//! ignored.

use crate::buffer::{RequestData, ResponseData};
use crate::frame::FunctionCode;
use crate::processor::FrameProcessor;
use crate::transport::Transport;
use mbtcp_common::BankConfig;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, trace};

/// Coil and register storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBank {
    coils: Vec<bool>,
    discrete_inputs: Vec<bool>,
    holding_registers: Vec<u16>,
    input_registers: Vec<u16>,
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new(&BankConfig::default())
    }
}

impl RegisterBank {
    /// Create a zeroed bank sized by `config`.
    #[must_use]
    pub fn new(config: &BankConfig) -> Self {
        Self {
            coils: vec![false; usize::from(config.coils)],
            discrete_inputs: vec![false; usize::from(config.discrete_inputs)],
            holding_registers: vec![0; usize::from(config.holding_registers)],
            input_registers: vec![0; usize::from(config.input_registers)],
        }
    }

    /// Get a coil value.
    #[must_use]
    pub fn coil(&self, address: u16) -> Option<bool> {
        self.coils.get(usize::from(address)).copied()
    }

    /// Set a coil value. Returns `false` if the address is out of range.
    pub fn set_coil(&mut self, address: u16, value: bool) -> bool {
        set(&mut self.coils, address, value)
    }

    /// Get a discrete input value.
    #[must_use]
    pub fn discrete_input(&self, address: u16) -> Option<bool> {
        self.discrete_inputs.get(usize::from(address)).copied()
    }

    /// Set a discrete input value. Returns `false` if the address is out of range.
    pub fn set_discrete_input(&mut self, address: u16, value: bool) -> bool {
        set(&mut self.discrete_inputs, address, value)
    }

    /// Get a holding register value.
    #[must_use]
    pub fn holding_register(&self, address: u16) -> Option<u16> {
        self.holding_registers.get(usize::from(address)).copied()
    }

    /// Set a holding register value. Returns `false` if the address is out of range.
    pub fn set_holding_register(&mut self, address: u16, value: u16) -> bool {
        set(&mut self.holding_registers, address, value)
    }

    /// Get an input register value.
    #[must_use]
    pub fn input_register(&self, address: u16) -> Option<u16> {
        self.input_registers.get(usize::from(address)).copied()
    }

    /// Set an input register value. Returns `false` if the address is out of range.
    pub fn set_input_register(&mut self, address: u16, value: u16) -> bool {
        set(&mut self.input_registers, address, value)
    }

    /// Encode `count` coils or discrete inputs starting at `address`.
    pub fn read_bits(
        &self,
        function: FunctionCode,
        address: u16,
        count: u16,
        out: &mut ResponseData<'_>,
    ) {
        let source = match function {
            FunctionCode::ReadDiscreteInputs => &self.discrete_inputs,
            _ => &self.coils,
        };
        for (offset, &value) in window(source, address, count).iter().enumerate() {
            out.write_coil(offset, value);
        }
        trace!(%function, address, count, "Bits served");
    }

    /// Encode `count` holding or input registers starting at `address`.
    pub fn read_registers(
        &self,
        function: FunctionCode,
        address: u16,
        count: u16,
        out: &mut ResponseData<'_>,
    ) {
        let source = match function {
            FunctionCode::ReadInputRegisters => &self.input_registers,
            _ => &self.holding_registers,
        };
        for (offset, &value) in window(source, address, count).iter().enumerate() {
            out.write_register(offset, value);
        }
        trace!(%function, address, count, "Registers served");
    }

    /// Store a Write Single Coil request.
    pub fn write_coil(&mut self, address: u16, on: bool) {
        if !self.set_coil(address, on) {
            debug!(address, "Coil write outside bank ignored");
        }
    }

    /// Store a Write Multiple Registers request.
    pub fn write_registers(&mut self, address: u16, count: u16, values: &RequestData<'_>) {
        for offset in 0..count {
            let Some(value) = values.register(usize::from(offset)) else {
                break;
            };
            let Some(target) = address.checked_add(offset) else {
                break;
            };
            if !self.set_holding_register(target, value) {
                debug!(address = target, "Register write outside bank ignored");
            }
        }
    }
}

/// A bank shared between the four handler slots of one processor.
#[derive(Debug, Clone, Default)]
pub struct SharedBank(Rc<RefCell<RegisterBank>>);

impl SharedBank {
    /// Wrap a bank for sharing.
    #[must_use]
    pub fn new(bank: RegisterBank) -> Self {
        Self(Rc::new(RefCell::new(bank)))
    }

    /// Run `f` with shared access to the bank.
    pub fn with<R>(&self, f: impl FnOnce(&RegisterBank) -> R) -> R {
        f(&self.0.borrow())
    }

    /// Run `f` with exclusive access to the bank.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut RegisterBank) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// Install handlers on all four slots of `processor`.
    pub fn attach<T: Transport, const N: usize>(&self, processor: &mut FrameProcessor<T, N>) {
        let bank = self.clone();
        processor.on_read_coils(move |function, address, count, out| {
            bank.with(|b| b.read_bits(function, address, count, out));
        });

        let bank = self.clone();
        processor.on_read_registers(move |function, address, count, out| {
            bank.with(|b| b.read_registers(function, address, count, out));
        });

        let bank = self.clone();
        processor.on_write_coil(move |_, address, on| {
            bank.with_mut(|b| b.write_coil(address, on));
        });

        let bank = self.clone();
        processor.on_write_registers(move |_, address, count, values| {
            bank.with_mut(|b| b.write_registers(address, count, values));
        });
    }
}

fn set<V>(slots: &mut [V], address: u16, value: V) -> bool {
    match slots.get_mut(usize::from(address)) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => false,
    }
}

/// The part of `source` covered by `[address, address + count)`.
fn window<V>(source: &[V], address: u16, count: u16) -> &[V] {
    let start = usize::from(address).min(source.len());
    let end = (usize::from(address) + usize::from(count)).min(source.len());
    &source[start..end]
}
