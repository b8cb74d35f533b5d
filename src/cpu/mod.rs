//! CPU emulation for the LC-3.
//!
//! This module implements the LC-3 user-mode architecture:
//! - 65,536 sixteen-bit memory cells, sparsely stored
//! - 8 general purpose registers, a program counter and the N/Z/P flag
//! - 14 opcodes; RTI and the reserved opcode are decode errors

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::Memory;
pub use registers::Registers;
pub use decode::{decode, Instruction, Opcode, DecodeError};
pub use execute::{Cpu, CpuError, CpuState, Flow};
