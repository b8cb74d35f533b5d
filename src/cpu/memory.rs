//! LC-3 memory subsystem.
//!
//! The full 16-bit address space is valid, but programs only touch a small
//! part of it, so cells live in a sparse map. A cell that was never written
//! reads back as [`DEFAULT_VALUE`].

use std::collections::HashMap;
use crate::word::{Address, Value, DEFAULT_VALUE, ADDRESS_SPACE};
use serde::{Serialize, Deserialize};

/// LC-3 memory: 65,536 sixteen-bit cells, stored sparsely.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Memory {
    cells: HashMap<Address, Value>,
}

impl Memory {
    /// Create an empty memory. Every cell reads as the default sentinel.
    pub fn new() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }

    /// Read a cell. Never-written cells yield [`DEFAULT_VALUE`].
    #[inline]
    pub fn read(&self, addr: Address) -> Value {
        self.cells.get(&addr).copied().unwrap_or(DEFAULT_VALUE)
    }

    /// Write a cell.
    #[inline]
    pub fn write(&mut self, addr: Address, value: Value) {
        self.cells.insert(addr, value);
    }

    /// Whether a cell has been written since the last clear.
    pub fn is_written(&self, addr: Address) -> bool {
        self.cells.contains_key(&addr)
    }

    /// Forget every write.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Load a program into memory starting at the given address.
    ///
    /// Addresses past `xFFFF` wrap around to `x0000`.
    pub fn load_program(&mut self, start: Address, program: &[Value]) {
        let mut addr = start;
        for &word in program {
            self.write(addr, word);
            addr = addr.wrapping_add(1);
        }
    }

    /// Every explicitly written cell, ordered by unsigned address.
    pub fn written_cells(&self) -> Vec<(Address, Value)> {
        let mut cells: Vec<_> = self.cells.iter().map(|(&a, &v)| (a, v)).collect();
        cells.sort_by_key(|&(addr, _)| addr as u16);
        cells
    }

    /// Dump memory contents (for debugging).
    ///
    /// Reads `count` consecutive cells from `start`, wrapping at the top of
    /// the address space.
    pub fn dump(&self, start: Address, count: usize) -> Vec<(Address, Value)> {
        (0..count.min(ADDRESS_SPACE))
            .map(|i| {
                let addr = start.wrapping_add(i as i16);
                (addr, self.read(addr))
            })
            .collect()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("written_cells", &self.cells.len())
            .field("total_cells", &ADDRESS_SPACE)
            .finish()
    }
}
