//! Word-level primitives for the LC-3.
//!
//! This module provides the core types for working with 16-bit words:
//! - [`Value`] - the machine's native signed word (registers and memory cells)
//! - [`Address`] - a 16-bit location, used as an unsigned index into memory
//! - [`Condition`] - the N/Z/P condition code
//! - [`bits`] - field extraction and sign extension

pub mod bits;
mod condition;

pub use condition::Condition;
pub use bits::{extract, sext_extract};

/// A 16-bit machine word. Arithmetic wraps at 16 bits.
pub type Value = i16;

/// A 16-bit address. Signed storage, unsigned meaning: `-1` is `xFFFF`.
pub type Address = i16;

/// Returned for any memory cell or register that was never written.
pub const DEFAULT_VALUE: Value = 0x7777;

/// Number of addressable cells.
pub const ADDRESS_SPACE: usize = 1 << 16;

/// Format a word as `xHHHH`, the way the LC-3 tools print hex.
pub fn hex(v: Value) -> String {
    format!("x{:04X}", v as u16)
}
