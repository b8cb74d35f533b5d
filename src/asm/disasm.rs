//! Disassembler for LC-3 programs.
//!
//! Converts instruction words back to readable assembly.

use crate::asm::Image;
use crate::cpu::decode::{decode, Instruction, Opcode};
use crate::word::{self, Value};

/// Disassemble a single word to text.
///
/// Words that do not decode are shown as data.
pub fn disassemble_word(word: Value) -> String {
    match decode(word) {
        Ok(decoded) => format_instruction(&decoded),
        Err(_) => format!(".FILL {}", word::hex(word)),
    }
}

/// Disassemble an image into an address-annotated listing.
pub fn disassemble(image: &Image) -> String {
    let mut output = String::new();
    output.push_str("; LC-3 Disassembly\n");
    output.push_str(&format!(".ORIG {}\n", word::hex(image.start)));

    for (i, &w) in image.words.iter().enumerate() {
        let addr = image.address_of(i);
        let line = disassemble_word(w);
        output.push_str(&format!("{}: {:<20} ; {}\n", word::hex(addr), line, word::hex(w)));
    }

    output.push_str(".END\n");
    output
}

/// Format a decoded instruction as assembly text.
///
/// PC-relative offsets are printed as written in source (`#n`), not as
/// resolved addresses, since the instruction carries no address.
pub fn format_instruction(instr: &Instruction) -> String {
    match instr.opcode() {
        Opcode::Br => {
            let nzp = instr.nzp();
            if nzp == 0 {
                return "NOP".to_string();
            }
            let mut name = String::from("BR");
            if nzp & 0b100 != 0 { name.push('n'); }
            if nzp & 0b010 != 0 { name.push('z'); }
            if nzp & 0b001 != 0 { name.push('p'); }
            format!("{} #{}", name, instr.pc_offset9())
        }

        Opcode::Add | Opcode::And => {
            let name = if instr.opcode() == Opcode::Add { "ADD" } else { "AND" };
            format!("{} R{}, R{}, {}", name, instr.dr(), instr.sr1(), format_operand2(instr))
        }

        Opcode::Not => format!("NOT R{}, R{}", instr.dr(), instr.sr1()),

        Opcode::Ld => format!("LD R{}, #{}", instr.dr(), instr.pc_offset9()),
        Opcode::Ldi => format!("LDI R{}, #{}", instr.dr(), instr.pc_offset9()),
        Opcode::Lea => format!("LEA R{}, #{}", instr.dr(), instr.pc_offset9()),
        Opcode::St => format!("ST R{}, #{}", instr.sr(), instr.pc_offset9()),
        Opcode::Sti => format!("STI R{}, #{}", instr.sr(), instr.pc_offset9()),

        Opcode::Ldr => format!("LDR R{}, R{}, #{}", instr.dr(), instr.base_r(), instr.offset6()),
        Opcode::Str => format!("STR R{}, R{}, #{}", instr.sr(), instr.base_r(), instr.offset6()),

        Opcode::Jsr if instr.jsr_offset_mode() => format!("JSR #{}", instr.pc_offset11()),
        Opcode::Jsr => format!("JSRR R{}", instr.base_r()),

        Opcode::Jmp if instr.base_r() == 7 => "RET".to_string(),
        Opcode::Jmp => format!("JMP R{}", instr.base_r()),

        Opcode::Trap => match instr.trap_vector() {
            0x20 => "GETC".to_string(),
            0x21 => "OUT".to_string(),
            0x22 => "PUTS".to_string(),
            0x23 => "IN".to_string(),
            0x24 => "PUTSP".to_string(),
            0x25 => "HALT".to_string(),
            v => format!("TRAP x{:02X}", v),
        },
    }
}

/// Second ADD/AND operand: a register or an immediate.
fn format_operand2(instr: &Instruction) -> String {
    if instr.imm_mode() {
        format!("#{}", instr.imm5())
    } else {
        format!("R{}", instr.sr2())
    }
}
