//! Assembler, disassembler and image format for LC-3 programs.
//!
//! This module provides:
//! - A two-pass assembler (source text → [`Image`])
//! - A disassembler (instruction words → readable text)
//! - The binary image text format read by the emulator

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_word};
pub use image::{Image, ImageError, load_image, parse_image, read_image, save_image};
