//! Assembler for LC-3 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//!         .ORIG x3000         ; Set origin address (required, first)
//! LOOP    ADD R1, R1, #-1     ; Optional label, then an instruction
//!         BRp LOOP            ; PC-relative operands take labels or #offsets
//!         LD R2, DATA
//!         HALT
//! DATA    .FILL x1234         ; Define a data word
//! BUF     .BLKW 4             ; Reserve words
//! MSG     .STRINGZ "hi"       ; Characters followed by a zero word
//!         .END                ; Required; anything after it is ignored
//! ```
//!
//! Mnemonics, registers and labels are case-insensitive.

use crate::asm::Image;
use crate::word::{bits, Address, Value, DEFAULT_VALUE};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a loadable image.
pub fn assemble(source: &str) -> Result<Image, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// How a pending label reference is patched into its word.
#[derive(Debug, Clone, Copy)]
enum Fixup {
    /// Signed offset from the following instruction, in the low `width` bits.
    PcOffset { width: u32 },
    /// The label's address as the whole word (`.FILL LABEL`).
    Absolute,
}

/// A parsed operand.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Reg(u16),
    Imm(i32),
    Label(String),
}

/// The assembler state.
struct Assembler {
    /// Output image; `None` until `.ORIG` is seen.
    image: Option<Image>,
    /// Symbol table (label -> address).
    symbols: HashMap<String, Address>,
    /// Pending references: (output index, label, fixup, source line).
    pending: Vec<(usize, String, Fixup, usize)>,
    /// Set once `.END` has been processed.
    ended: bool,
}

impl Assembler {
    fn new() -> Self {
        Self {
            image: None,
            symbols: HashMap::new(),
            pending: Vec::new(),
            ended: false,
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Image, AssemblerError> {
        // Pass 1: Collect labels and generate code
        let mut last_line = 0;
        for (line_num, line) in source.lines().enumerate() {
            last_line = line_num + 1;
            self.process_line(line, line_num + 1)?;
            if self.ended {
                break;
            }
        }

        if !self.ended {
            return Err(AssemblerError::MissingEnd { line: last_line });
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        self.image.take().ok_or(AssemblerError::MissingOrig { line: last_line })
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (code, string) = split_line(line, line_num)?;
        let mut tokens = tokenize(code);

        if tokens.is_empty() {
            if string.is_some() {
                return Err(syntax(line_num, "string literal without .STRINGZ"));
            }
            return Ok(());
        }

        // Check for label definition
        if !is_mnemonic(&tokens[0]) {
            let label = tokens.remove(0);
            self.define_label(&label, line_num)?;
            if tokens.is_empty() {
                if let Some(mnemonic) = near_mnemonic(&label) {
                    tracing::warn!(line = line_num, "label {} looks like a misspelled {}", label, mnemonic);
                }
            }
        }

        if tokens.is_empty() {
            if string.is_some() {
                return Err(syntax(line_num, "string literal without .STRINGZ"));
            }
            return Ok(());
        }

        let mnemonic = tokens[0].to_uppercase();
        let operands = &tokens[1..];

        match mnemonic.as_str() {
            // Directives
            ".ORIG" => {
                if self.image.is_some() {
                    return Err(syntax(line_num, "duplicate .ORIG"));
                }
                let [op] = expect_operands::<1>(operands, &mnemonic, line_num)?;
                let value = self.immediate(op, line_num)?;
                let start = pack_field(value, 16, false, line_num)?;
                self.image = Some(Image::new(start as Address));
            }

            ".END" => {
                self.ended = true;
            }

            ".FILL" => {
                let [op] = expect_operands::<1>(operands, &mnemonic, line_num)?;
                match parse_operand(op, line_num)? {
                    Operand::Label(label) => {
                        let idx = self.emit(0, line_num)?;
                        self.pending.push((idx, label, Fixup::Absolute, line_num));
                    }
                    Operand::Imm(value) => {
                        let word = pack_field(value, 16, false, line_num)?;
                        self.emit(word, line_num)?;
                    }
                    Operand::Reg(_) => return Err(syntax(line_num, ".FILL takes a value or label")),
                }
            }

            ".BLKW" => {
                let [op] = expect_operands::<1>(operands, &mnemonic, line_num)?;
                let count = self.immediate(op, line_num)?;
                if !(0..=0xFFFF).contains(&count) {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: count, bits: 16 });
                }
                for _ in 0..count {
                    self.emit(DEFAULT_VALUE as u16, line_num)?;
                }
            }

            ".STRINGZ" => {
                expect_operands::<0>(operands, &mnemonic, line_num)?;
                let text = string.ok_or_else(|| syntax(line_num, ".STRINGZ requires a quoted string"))?;
                for c in text.chars() {
                    let code = u16::try_from(c as u32)
                        .map_err(|_| syntax(line_num, &format!("character {:?} does not fit in a word", c)))?;
                    self.emit(code, line_num)?;
                }
                self.emit(0, line_num)?;
            }

            // Instructions
            _ => {
                if string.is_some() {
                    return Err(syntax(line_num, "unexpected string literal"));
                }
                let word = self.parse_instruction(&mnemonic, operands, line_num)?;
                self.emit(word, line_num)?;
            }
        }

        Ok(())
    }

    fn parse_instruction(&mut self, mnemonic: &str, operands: &[String], line_num: usize)
        -> Result<u16, AssemblerError>
    {
        let word = match mnemonic {
            "ADD" | "AND" => {
                let opcode: u16 = if mnemonic == "ADD" { 0b0001 } else { 0b0101 };
                let [dr, sr1, op2] = expect_operands::<3>(operands, mnemonic, line_num)?;
                let base = opcode << 12 | register(dr, line_num)? << 9 | register(sr1, line_num)? << 6;
                match parse_operand(op2, line_num)? {
                    Operand::Reg(sr2) => base | sr2,
                    Operand::Imm(imm) => base | 1 << 5 | pack_field(imm, 5, true, line_num)?,
                    Operand::Label(_) => return Err(syntax(line_num, "expected register or immediate")),
                }
            }

            "NOT" => {
                let [dr, sr] = expect_operands::<2>(operands, mnemonic, line_num)?;
                0b1001 << 12 | register(dr, line_num)? << 9 | register(sr, line_num)? << 6 | 0b111111
            }

            "LD" | "LDI" | "LEA" | "ST" | "STI" => {
                let opcode: u16 = match mnemonic {
                    "LD" => 0b0010,
                    "LDI" => 0b1010,
                    "LEA" => 0b1110,
                    "ST" => 0b0011,
                    _ => 0b1011,
                };
                let [reg, target] = expect_operands::<2>(operands, mnemonic, line_num)?;
                let base = opcode << 12 | register(reg, line_num)? << 9;
                base | self.pc_offset(target, 9, line_num)?
            }

            "LDR" | "STR" => {
                let opcode: u16 = if mnemonic == "LDR" { 0b0110 } else { 0b0111 };
                let [reg, base_r, offset] = expect_operands::<3>(operands, mnemonic, line_num)?;
                let offset = self.immediate(offset, line_num)?;
                opcode << 12
                    | register(reg, line_num)? << 9
                    | register(base_r, line_num)? << 6
                    | pack_field(offset, 6, true, line_num)?
            }

            m if is_branch(m) => {
                let [target] = expect_operands::<1>(operands, mnemonic, line_num)?;
                let flags = &m[2..];
                let nzp: u16 = if flags.is_empty() {
                    0b111
                } else {
                    (flags.contains('N') as u16) << 2
                        | (flags.contains('Z') as u16) << 1
                        | flags.contains('P') as u16
                };
                nzp << 9 | self.pc_offset(target, 9, line_num)?
            }

            "JMP" | "JSRR" => {
                let opcode: u16 = if mnemonic == "JMP" { 0b1100 } else { 0b0100 };
                let [base_r] = expect_operands::<1>(operands, mnemonic, line_num)?;
                opcode << 12 | register(base_r, line_num)? << 6
            }

            "RET" => {
                expect_operands::<0>(operands, mnemonic, line_num)?;
                0b1100_000_111_000000
            }

            "JSR" => {
                let [target] = expect_operands::<1>(operands, mnemonic, line_num)?;
                0b0100_1 << 11 | self.pc_offset(target, 11, line_num)?
            }

            "RTI" => {
                expect_operands::<0>(operands, mnemonic, line_num)?;
                0b1000 << 12
            }

            "TRAP" => {
                let [vector] = expect_operands::<1>(operands, mnemonic, line_num)?;
                let vector = self.immediate(vector, line_num)?;
                if !(0..=0xFF).contains(&vector) {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: vector, bits: 8 });
                }
                0b1111 << 12 | vector as u16
            }

            _ => {
                let vector = trap_alias(mnemonic).ok_or_else(|| AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: mnemonic.to_string(),
                })?;
                expect_operands::<0>(operands, mnemonic, line_num)?;
                0b1111 << 12 | vector
            }
        };

        Ok(word)
    }

    /// Encode a PC-relative operand: an explicit `#offset`, or a label
    /// resolved in pass 2.
    fn pc_offset(&mut self, operand: &str, width: u32, line_num: usize) -> Result<u16, AssemblerError> {
        match parse_operand(operand, line_num)? {
            Operand::Imm(offset) => pack_field(offset, width, true, line_num),
            Operand::Label(label) => {
                let out_idx = self.output_len(line_num)?;
                self.pending.push((out_idx, label, Fixup::PcOffset { width }, line_num));
                Ok(0) // Placeholder, will be resolved in pass 2
            }
            Operand::Reg(_) => Err(syntax(line_num, "expected label or offset, found register")),
        }
    }

    /// Parse an operand that must be a number.
    fn immediate(&self, operand: &str, line_num: usize) -> Result<i32, AssemblerError> {
        match parse_operand(operand, line_num)? {
            Operand::Imm(value) => Ok(value),
            _ => Err(syntax(line_num, &format!("expected a number, found {:?}", operand))),
        }
    }

    fn define_label(&mut self, label: &str, line_num: usize) -> Result<(), AssemblerError> {
        let name = label.strip_suffix(':').unwrap_or(label).to_uppercase();
        if !is_label(&name) {
            return Err(AssemblerError::UnknownMnemonic { line: line_num, mnemonic: label.to_string() });
        }
        // Operands are read as registers and numbers before labels, so a
        // name like R1 or XA could never be referenced.
        if !matches!(parse_operand(&name, line_num), Ok(Operand::Label(_))) {
            return Err(syntax(
                line_num,
                &format!("label {:?} reads as a register or number", name),
            ));
        }
        let addr = match &self.image {
            Some(image) => image.address_of(image.len()),
            None => return Err(AssemblerError::MissingOrig { line: line_num }),
        };
        if self.symbols.insert(name.clone(), addr).is_some() {
            return Err(AssemblerError::DuplicateLabel { line: line_num, label: name });
        }
        Ok(())
    }

    fn output_len(&self, line_num: usize) -> Result<usize, AssemblerError> {
        self.image
            .as_ref()
            .map(Image::len)
            .ok_or(AssemblerError::MissingOrig { line: line_num })
    }

    /// Append a word, returning its output index.
    fn emit(&mut self, word: u16, line_num: usize) -> Result<usize, AssemblerError> {
        let image = self.image.as_mut().ok_or(AssemblerError::MissingOrig { line: line_num })?;
        image.push(word as Value);
        Ok(image.len() - 1)
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        let Some(image) = self.image.as_mut() else {
            return Ok(());
        };

        for (out_idx, label, fixup, line_num) in &self.pending {
            let target = *self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: *line_num,
                label: label.clone(),
            })?;

            let field = match *fixup {
                Fixup::PcOffset { width } => {
                    let next = image.address_of(*out_idx).wrapping_add(1);
                    let offset = target.wrapping_sub(next) as i32;
                    pack_field(offset, width, true, *line_num)?
                }
                Fixup::Absolute => target as u16,
            };

            let word = &mut image.words[*out_idx];
            *word = (*word as u16 | field) as Value;
        }
        Ok(())
    }
}

/// Split a line into its code part and an optional string literal,
/// dropping any comment.
fn split_line(line: &str, line_num: usize) -> Result<(&str, Option<String>), AssemblerError> {
    let Some(quote) = line.find('"') else {
        let code = line.find(';').map_or(line, |idx| &line[..idx]);
        return Ok((code, None));
    };

    let code = &line[..quote];
    if let Some(idx) = code.find(';') {
        // The quote is inside a comment.
        return Ok((&code[..idx], None));
    }

    let mut text = String::new();
    let mut chars = line[quote + 1..].chars();
    loop {
        match chars.next() {
            None => return Err(syntax(line_num, "unterminated string literal")),
            Some('"') => break,
            Some('\\') => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('0') => '\0',
                    Some('"') => '"',
                    Some('\\') => '\\',
                    other => {
                        return Err(syntax(line_num, &format!("invalid escape sequence {:?}", other)));
                    }
                };
                text.push(escaped);
            }
            Some(c) => text.push(c),
        }
    }

    let rest: String = chars.collect();
    let rest = rest.find(';').map_or(rest.as_str(), |idx| &rest[..idx]);
    if !rest.trim().is_empty() {
        return Err(syntax(line_num, "unexpected text after string literal"));
    }

    Ok((code, Some(text)))
}

/// Split code into tokens on whitespace and commas.
fn tokenize(code: &str) -> Vec<String> {
    code.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn expect_operands<'a, const N: usize>(operands: &'a [String], mnemonic: &str, line_num: usize)
    -> Result<[&'a str; N], AssemblerError>
{
    if operands.len() != N {
        return Err(syntax(
            line_num,
            &format!("{} expects {} operand(s), found {}", mnemonic, N, operands.len()),
        ));
    }
    Ok(std::array::from_fn(|i| operands[i].as_str()))
}

fn parse_operand(operand: &str, line_num: usize) -> Result<Operand, AssemblerError> {
    let upper = operand.to_uppercase();

    // Register
    if let Some(n) = upper.strip_prefix('R') {
        if n.len() == 1 {
            if let Some(d) = n.chars().next().and_then(|c| c.to_digit(8)) {
                return Ok(Operand::Reg(d as u16));
            }
        }
    }

    let invalid = || syntax(line_num, &format!("invalid number {:?}", operand));

    // Decimal (#10, #-3) or hex behind a hash (#x1F)
    if let Some(rest) = upper.strip_prefix('#') {
        if let Some(hex) = rest.strip_prefix('X') {
            return parse_hex(hex).map(Operand::Imm).ok_or_else(invalid);
        }
        return rest.parse::<i32>().map(Operand::Imm).map_err(|_| invalid());
    }

    // Hex literal (x3000, x-1)
    if let Some(hex) = upper.strip_prefix('X') {
        if let Some(value) = parse_hex(hex) {
            return Ok(Operand::Imm(value));
        }
    }

    // Bare decimal
    if upper.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return upper.parse::<i32>().map(Operand::Imm).map_err(|_| invalid());
    }

    if is_label(&upper) {
        return Ok(Operand::Label(upper));
    }

    Err(syntax(line_num, &format!("invalid operand {:?}", operand)))
}

fn parse_hex(digits: &str) -> Option<i32> {
    let (negative, digits) = match digits.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, digits),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let value = i32::from_str_radix(digits, 16).ok()?;
    Some(if negative { -value } else { value })
}

fn register(operand: &str, line_num: usize) -> Result<u16, AssemblerError> {
    match parse_operand(operand, line_num)? {
        Operand::Reg(r) => Ok(r),
        _ => Err(syntax(line_num, &format!("expected register, found {:?}", operand))),
    }
}

/// Pack `value` into `width` bits. Signed fields (offsets, imm5) must fit
/// as two's complement; unsigned fields also accept the full unsigned range.
fn pack_field(value: i32, width: u32, signed: bool, line_num: usize) -> Result<u16, AssemblerError> {
    let out_of_range = AssemblerError::ValueOutOfRange { line: line_num, value, bits: width };
    if signed && value > (1i32 << (width - 1)) - 1 {
        return Err(out_of_range);
    }
    bits::pack(value, width).ok_or(out_of_range)
}

fn is_label(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_branch(mnemonic: &str) -> bool {
    matches!(mnemonic, "BR" | "BRN" | "BRZ" | "BRP" | "BRNZ" | "BRNP" | "BRZP" | "BRNZP")
}

fn trap_alias(mnemonic: &str) -> Option<u16> {
    match mnemonic {
        "GETC" => Some(0x20),
        "OUT" => Some(0x21),
        "PUTS" => Some(0x22),
        "IN" => Some(0x23),
        "PUTSP" => Some(0x24),
        "HALT" => Some(0x25),
        _ => None,
    }
}

const MNEMONICS: &[&str] = &[
    "ADD", "AND", "NOT", "LD", "LDI", "LEA", "ST", "STI", "LDR", "STR",
    "JMP", "RET", "JSR", "JSRR", "RTI", "TRAP",
    "BR", "BRN", "BRZ", "BRP", "BRNZ", "BRNP", "BRZP", "BRNZP",
    "GETC", "OUT", "PUTS", "IN", "PUTSP", "HALT",
    ".ORIG", ".FILL", ".BLKW", ".STRINGZ", ".END",
];

fn is_mnemonic(token: &str) -> bool {
    MNEMONICS.contains(&token.to_uppercase().as_str())
}

/// A mnemonic one edit away from `label`, if any.
fn near_mnemonic(label: &str) -> Option<&'static str> {
    let name = label.strip_suffix(':').unwrap_or(label).to_uppercase();
    MNEMONICS.iter().copied().find(|m| one_edit_apart(&name, m))
}

/// True when `a` and `b` differ by exactly one insertion, deletion or substitution.
fn one_edit_apart(a: &str, b: &str) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a == b || a.len().abs_diff(b.len()) > 1 {
        return false;
    }
    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let (rest_a, rest_b) = (&a[prefix..], &b[prefix..]);
    match rest_a.len().cmp(&rest_b.len()) {
        std::cmp::Ordering::Equal => rest_a[1..] == rest_b[1..],
        std::cmp::Ordering::Greater => rest_a[1..] == *rest_b,
        std::cmp::Ordering::Less => *rest_a == rest_b[1..],
    }
}

fn syntax(line: usize, message: &str) -> AssemblerError {
    AssemblerError::SyntaxError { line, message: message.to_string() }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value} does not fit in {bits} bits")]
    ValueOutOfRange { line: usize, value: i32, bits: u32 },

    #[error("code before .ORIG on line {line}")]
    MissingOrig { line: usize },

    #[error(".END not found (source ends at line {line})")]
    MissingEnd { line: usize },
}
