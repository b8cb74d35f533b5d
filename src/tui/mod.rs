//! TUI debugger for the LC-3 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register, PC and condition code view
//! - Memory view highlighting written cells
//! - Step/run/breakpoint controls
//! - Disassembly view around the PC

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
