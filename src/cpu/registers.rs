//! LC-3 CPU registers.
//!
//! The LC-3 exposes:
//! - R0-R7: eight 16-bit general purpose registers (R7 doubles as the link register)
//! - PC: 16-bit program counter
//! - CC: the N/Z/P condition code

use std::fmt;
use crate::word::{self, Address, Condition, Value, DEFAULT_VALUE};
use serde::{Serialize, Deserialize};

/// Number of general purpose registers.
pub const GPR_COUNT: usize = 8;

/// Register that receives the return address on `JSR`/`JSRR`.
pub const LINK_REGISTER: usize = 7;

/// The LC-3 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7.
    pub gpr: [Value; GPR_COUNT],

    /// Address of the next instruction to fetch.
    pub pc: Address,

    /// Condition code.
    /// Set from the value written by ADD, AND, NOT, LD, LDI and LDR:
    /// N if negative, Z if zero, P if positive.
    pub cond: Condition,
}

impl Registers {
    /// Create a register file for a program starting at `start`.
    ///
    /// Every register holds the default sentinel; the flag starts at Z.
    pub fn new(start: Address) -> Self {
        Self {
            gpr: [DEFAULT_VALUE; GPR_COUNT],
            pc: start,
            cond: Condition::Zero,
        }
    }

    /// Reset to the power-on state for a program starting at `start`.
    pub fn reset(&mut self, start: Address) {
        self.gpr = [DEFAULT_VALUE; GPR_COUNT];
        self.pc = start;
        self.cond = Condition::Zero;
    }

    /// Read a register by its 3-bit field value.
    #[inline]
    pub fn get(&self, index: Value) -> Value {
        self.gpr[Self::slot(index)]
    }

    /// Write a register by its 3-bit field value.
    #[inline]
    pub fn set(&mut self, index: Value, value: Value) {
        self.gpr[Self::slot(index)] = value;
    }

    /// Write a register and update the condition code from the new value.
    #[inline]
    pub fn set_with_cc(&mut self, index: Value, value: Value) {
        self.set(index, value);
        self.set_cc(value);
    }

    /// Set the condition code from a value's sign.
    #[inline]
    pub fn set_cc(&mut self, value: Value) {
        self.cond = Condition::from_value(value);
    }

    /// Increment the program counter by 1.
    /// Returns the old value.
    #[inline]
    pub fn advance_pc(&mut self) -> Address {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }

    /// Set the program counter to an absolute address.
    #[inline]
    pub fn jump(&mut self, addr: Address) {
        self.pc = addr;
    }

    /// PC plus a signed offset, wrapping at 16 bits.
    #[inline]
    pub fn pc_relative(&self, offset: Value) -> Address {
        self.pc.wrapping_add(offset)
    }

    /// The register dump: one `R<i> = xHHHH` line per register.
    pub fn dump(&self) -> String {
        self.to_string()
    }

    #[inline]
    fn slot(index: Value) -> usize {
        (index & 0b111) as usize
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &value) in self.gpr.iter().enumerate() {
            writeln!(f, "R{} = {}", i, word::hex(value))?;
        }
        Ok(())
    }
}
