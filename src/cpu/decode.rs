//! Instruction decoder for the LC-3.
//!
//! Every instruction is a single 16-bit word. Bits 15-12 select the opcode;
//! the meaning of the remaining twelve bits depends on the opcode. Decoding
//! only classifies the word. Operand fields are pulled out of the raw word
//! by the accessors on [`Instruction`] when the instruction executes.

use std::fmt;
use crate::word::{bits, Value};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The fourteen implemented opcodes.
///
/// `1000` (RTI) and `1101` (reserved) have no variant: the machine has no
/// supervisor mode, so both are decode errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// Conditional branch: if CC matches nzp then PC := PC + offset9
    Br,
    /// DR := SR1 + (SR2 | imm5), sets CC
    Add,
    /// DR := mem[PC + offset9], sets CC
    Ld,
    /// mem[PC + offset9] := SR
    St,
    /// R7 := PC; PC := BaseR or PC + offset11
    Jsr,
    /// DR := SR1 & (SR2 | imm5), sets CC
    And,
    /// DR := mem[BaseR + offset6], sets CC
    Ldr,
    /// mem[BaseR + offset6] := SR
    Str,
    /// DR := !SR, sets CC
    Not,
    /// DR := mem[mem[PC + offset9]], sets CC
    Ldi,
    /// mem[mem[PC + offset9]] := SR
    Sti,
    /// PC := BaseR (RET is JMP R7)
    Jmp,
    /// DR := PC + offset9
    Lea,
    /// System call. Every vector halts the machine.
    Trap,
}

impl Opcode {
    // Opcode field values (bits 15-12)
    const BR: u8 = 0b0000;
    const ADD: u8 = 0b0001;
    const LD: u8 = 0b0010;
    const ST: u8 = 0b0011;
    const JSR: u8 = 0b0100;
    const AND: u8 = 0b0101;
    const LDR: u8 = 0b0110;
    const STR: u8 = 0b0111;
    const NOT: u8 = 0b1001;
    const LDI: u8 = 0b1010;
    const STI: u8 = 0b1011;
    const JMP: u8 = 0b1100;
    const LEA: u8 = 0b1110;
    const TRAP: u8 = 0b1111;

    /// Look up an opcode by its 4-bit field value.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        let op = match bits {
            Self::BR => Opcode::Br,
            Self::ADD => Opcode::Add,
            Self::LD => Opcode::Ld,
            Self::ST => Opcode::St,
            Self::JSR => Opcode::Jsr,
            Self::AND => Opcode::And,
            Self::LDR => Opcode::Ldr,
            Self::STR => Opcode::Str,
            Self::NOT => Opcode::Not,
            Self::LDI => Opcode::Ldi,
            Self::STI => Opcode::Sti,
            Self::JMP => Opcode::Jmp,
            Self::LEA => Opcode::Lea,
            Self::TRAP => Opcode::Trap,
            _ => return None,
        };
        Some(op)
    }

    /// The 4-bit field value.
    pub const fn bits(self) -> u8 {
        match self {
            Opcode::Br => Self::BR,
            Opcode::Add => Self::ADD,
            Opcode::Ld => Self::LD,
            Opcode::St => Self::ST,
            Opcode::Jsr => Self::JSR,
            Opcode::And => Self::AND,
            Opcode::Ldr => Self::LDR,
            Opcode::Str => Self::STR,
            Opcode::Not => Self::NOT,
            Opcode::Ldi => Self::LDI,
            Opcode::Sti => Self::STI,
            Opcode::Jmp => Self::JMP,
            Opcode::Lea => Self::LEA,
            Opcode::Trap => Self::TRAP,
        }
    }

    /// Whether executing this opcode updates the condition code.
    pub const fn sets_cc(self) -> bool {
        matches!(
            self,
            Opcode::Add | Opcode::And | Opcode::Not | Opcode::Ld | Opcode::Ldi | Opcode::Ldr
        )
    }
}

/// A decoded instruction: its opcode plus the untouched instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    opcode: Opcode,
    word: Value,
}

impl Instruction {
    /// The opcode.
    #[inline]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The raw instruction word (its encoding).
    #[inline]
    pub const fn word(&self) -> Value {
        self.word
    }

    /// Destination register, bits 11-9.
    #[inline]
    pub const fn dr(&self) -> Value {
        bits::extract(self.word, 9, 11)
    }

    /// Source register of ST/STR/STI, bits 11-9.
    #[inline]
    pub const fn sr(&self) -> Value {
        bits::extract(self.word, 9, 11)
    }

    /// First source register, bits 8-6.
    #[inline]
    pub const fn sr1(&self) -> Value {
        bits::extract(self.word, 6, 8)
    }

    /// Base register of LDR/STR/JMP/JSRR, bits 8-6.
    #[inline]
    pub const fn base_r(&self) -> Value {
        bits::extract(self.word, 6, 8)
    }

    /// Second source register, bits 2-0.
    #[inline]
    pub const fn sr2(&self) -> Value {
        bits::extract(self.word, 0, 2)
    }

    /// ADD/AND immediate mode flag, bit 5.
    #[inline]
    pub const fn imm_mode(&self) -> bool {
        bits::bit(self.word, 5)
    }

    /// Sign-extended bits 4-0.
    #[inline]
    pub const fn imm5(&self) -> Value {
        bits::sext_extract(self.word, 0, 4)
    }

    /// Sign-extended bits 5-0.
    #[inline]
    pub const fn offset6(&self) -> Value {
        bits::sext_extract(self.word, 0, 5)
    }

    /// Sign-extended bits 8-0.
    #[inline]
    pub const fn pc_offset9(&self) -> Value {
        bits::sext_extract(self.word, 0, 8)
    }

    /// Sign-extended bits 10-0.
    #[inline]
    pub const fn pc_offset11(&self) -> Value {
        bits::sext_extract(self.word, 0, 10)
    }

    /// BR condition mask, bits 11-9 (n, z, p).
    #[inline]
    pub const fn nzp(&self) -> u8 {
        bits::extract(self.word, 9, 11) as u8
    }

    /// JSR (bit 11 set) versus JSRR (bit 11 clear).
    #[inline]
    pub const fn jsr_offset_mode(&self) -> bool {
        bits::bit(self.word, 11)
    }

    /// Trap vector, bits 7-0.
    #[inline]
    pub const fn trap_vector(&self) -> u8 {
        bits::extract(self.word, 0, 7) as u8
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::asm::disasm::format_instruction(self))
    }
}

/// Decode an instruction word.
pub fn decode(word: Value) -> Result<Instruction, DecodeError> {
    let op_bits = bits::extract(word, 12, 15) as u8;
    let opcode = Opcode::from_bits(op_bits).ok_or(DecodeError::ReservedOpcode {
        opcode: op_bits,
        word: word as u16,
    })?;
    Ok(Instruction { opcode, word })
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unimplemented opcode {opcode:04b} in instruction x{word:04X}")]
    ReservedOpcode { opcode: u8, word: u16 },
}
