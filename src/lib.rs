//! # LC-3 Emulator
//!
//! An emulator and assembler for the LC-3, the 16-bit teaching computer.
//!
//! The machine has eight 16-bit registers, a program counter, an N/Z/P
//! condition code and a 16-bit address space. Programs are loaded from a
//! text image of binary words and run until they execute a TRAP.

pub mod word;
pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use word::{Address, Condition, Value, DEFAULT_VALUE};
pub use cpu::{Cpu, CpuState, CpuError, Memory, Registers, Instruction, Opcode, DecodeError};
pub use asm::{assemble, disassemble, AssemblerError, Image, ImageError, load_image, parse_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
