//! CPU execution engine for the LC-3.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::word::{self, Address, Value};
use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Instruction, Opcode, DecodeError};
use crate::cpu::registers::LINK_REGISTER;
use crate::asm::Image;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed a TRAP).
    Halted,
}

/// What the fetch loop does after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// The LC-3 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a CPU with empty memory, starting at address 0.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(0),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
        }
    }

    /// Create a CPU with `image` loaded and ready to run.
    pub fn from_image(image: &Image) -> Self {
        let mut cpu = Self::new();
        cpu.load_image(image);
        cpu
    }

    /// Replace memory with `image` and reset to run from its start address.
    pub fn load_image(&mut self, image: &Image) {
        self.mem.clear();
        self.mem.load_program(image.start, &image.words);
        self.regs.reset(image.start);
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
        tracing::debug!(
            start = %word::hex(image.start),
            words = image.words.len(),
            "loaded image"
        );
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch
        let pc = self.regs.pc;
        let raw = self.mem.read(pc);

        // Decode
        let instr = decode::decode(raw)
            .map_err(|source| CpuError::Decode { pc: pc as u16, source })?;

        // Execute
        if self.execute(instr) == Flow::Halt {
            self.state = CpuState::Halted;
            tracing::debug!(pc = %word::hex(pc), cycles = self.cycles + 1, "halted");
        }

        self.cycles += 1;
        self.last_instr = Some(instr);
        tracing::trace!(
            pc = %word::hex(pc),
            instr = %word::hex(raw),
            next = %word::hex(self.regs.pc),
            "{}",
            instr
        );

        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        if self.state == CpuState::Running {
            tracing::warn!(max_cycles, pc = %word::hex(self.regs.pc), "step limit reached");
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    ///
    /// Every opcode except JMP advances the PC before computing anything, so
    /// PC-relative targets are measured from the following instruction.
    pub fn execute(&mut self, instr: Instruction) -> Flow {
        let regs = &mut self.regs;
        let mem = &mut self.mem;

        match instr.opcode() {
            Opcode::Br => {
                regs.advance_pc();
                if regs.cond.matches(instr.nzp()) {
                    let target = regs.pc_relative(instr.pc_offset9());
                    regs.jump(target);
                }
            }

            Opcode::Add => {
                regs.advance_pc();
                let lhs = regs.get(instr.sr1());
                let rhs = Self::second_operand(regs, instr);
                regs.set_with_cc(instr.dr(), lhs.wrapping_add(rhs));
            }

            Opcode::And => {
                regs.advance_pc();
                let lhs = regs.get(instr.sr1());
                let rhs = Self::second_operand(regs, instr);
                regs.set_with_cc(instr.dr(), lhs & rhs);
            }

            Opcode::Not => {
                regs.advance_pc();
                let value = !regs.get(instr.sr1());
                regs.set_with_cc(instr.dr(), value);
            }

            Opcode::Ld => {
                regs.advance_pc();
                let value = mem.read(regs.pc_relative(instr.pc_offset9()));
                regs.set_with_cc(instr.dr(), value);
            }

            Opcode::St => {
                regs.advance_pc();
                let addr = regs.pc_relative(instr.pc_offset9());
                mem.write(addr, regs.get(instr.sr()));
            }

            Opcode::Ldr => {
                regs.advance_pc();
                let addr = regs.get(instr.base_r()).wrapping_add(instr.offset6());
                regs.set_with_cc(instr.dr(), mem.read(addr));
            }

            Opcode::Str => {
                regs.advance_pc();
                let addr = regs.get(instr.base_r()).wrapping_add(instr.offset6());
                mem.write(addr, regs.get(instr.sr()));
            }

            Opcode::Ldi => {
                regs.advance_pc();
                let pointer = mem.read(regs.pc_relative(instr.pc_offset9()));
                regs.set_with_cc(instr.dr(), mem.read(pointer));
            }

            Opcode::Sti => {
                regs.advance_pc();
                let pointer = mem.read(regs.pc_relative(instr.pc_offset9()));
                mem.write(pointer, regs.get(instr.sr()));
            }

            Opcode::Jsr => {
                regs.advance_pc();
                let link = regs.pc;
                // Read the base register before R7 is overwritten: JSRR R7 jumps
                // to the old R7.
                let target: Address = if instr.jsr_offset_mode() {
                    regs.pc_relative(instr.pc_offset11())
                } else {
                    regs.get(instr.base_r())
                };
                regs.jump(target);
                regs.set(LINK_REGISTER as Value, link);
            }

            Opcode::Jmp => {
                let target = regs.get(instr.base_r());
                regs.jump(target);
            }

            Opcode::Lea => {
                regs.advance_pc();
                let addr = regs.pc_relative(instr.pc_offset9());
                regs.set(instr.dr(), addr);
            }

            // Only HALT is emulated; every vector stops the machine untouched.
            Opcode::Trap => return Flow::Halt,
        }

        Flow::Continue
    }

    /// SR2 or the sign-extended imm5, depending on bit 5.
    #[inline]
    fn second_operand(regs: &Registers, instr: Instruction) -> Value {
        if instr.imm_mode() {
            instr.imm5()
        } else {
            regs.get(instr.sr2())
        }
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("decode error at x{pc:04X}: {source}")]
    Decode {
        pc: u16,
        #[source]
        source: DecodeError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::{Condition, DEFAULT_VALUE};

    const HALT: u16 = 0xF025;

    fn make_cpu(start: u16, program: &[u16]) -> Cpu {
        let image = Image {
            start: start as Address,
            words: program.iter().map(|&w| w as Value).collect(),
        };
        Cpu::from_image(&image)
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = make_cpu(0x3000, &[HALT]);

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert!(cpu.regs.gpr.iter().all(|&r| r == DEFAULT_VALUE));
        assert_eq!(cpu.regs.cond, Condition::Zero);
        assert_eq!(cpu.regs.pc, 0x3000);
    }

    #[test]
    fn test_step_after_halt_fails() {
        let mut cpu = make_cpu(0, &[HALT]);
        cpu.run().unwrap();
        assert_eq!(cpu.step().unwrap_err(), CpuError::NotRunning(CpuState::Halted));
    }

    #[test]
    fn test_every_trap_vector_halts() {
        for vector in [0x20u16, 0x21, 0x22, 0x23, 0x24, 0x25, 0x00, 0xFF] {
            let mut cpu = make_cpu(0x3000, &[0xF000 | vector]);
            assert_eq!(cpu.run().unwrap(), 1);
            assert!(cpu.is_halted());
        }
    }

    #[test]
    fn test_add_immediate_from_sentinel() {
        // ADD R1, R0, #1 ; HALT
        let mut cpu = make_cpu(0, &[0b0001_001_000_1_00001, HALT]);
        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(1), 0x7778);
        assert_eq!(cpu.regs.get(0), DEFAULT_VALUE);
        assert_eq!(cpu.regs.cond, Condition::Positive);
    }

    #[test]
    fn test_add_register_wraps() {
        // AND R0, R0, #0 ; ADD R0, R0, #-1 ; ADD R1, R0, R0 ; HALT
        let mut cpu = make_cpu(0x3000, &[
            0b0101_000_000_1_00000,
            0b0001_000_000_1_11111,
            0b0001_001_000_0_00_000,
            HALT,
        ]);
        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(0), -1);
        assert_eq!(cpu.regs.get(1), -2);
        assert_eq!(cpu.regs.cond, Condition::Negative);
    }

    #[test]
    fn test_add_overflow_wraps_to_negative() {
        // R0 = x7777; R0 := R0 + R0 = xEEEE
        let mut cpu = make_cpu(0, &[0b0001_000_000_0_00_000, HALT]);
        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(0) as u16, 0xEEEE);
        assert_eq!(cpu.regs.cond, Condition::Negative);
    }

    #[test]
    fn test_and_zero_sets_z() {
        // AND R2, R2, #0
        let mut cpu = make_cpu(0, &[0b0101_010_010_1_00000, HALT]);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.get(2), 0);
        assert_eq!(cpu.regs.cond, Condition::Zero);
    }

    #[test]
    fn test_not() {
        // NOT R3, R0
        let mut cpu = make_cpu(0, &[0b1001_011_000_111111, HALT]);
        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(3) as u16, 0x8888);
        assert_eq!(cpu.regs.cond, Condition::Negative);
    }

    #[test]
    fn test_ld_is_pc_relative_to_next_instruction() {
        // x3000 LD R1, #1 ; x3001 HALT ; x3002 .FILL #5
        let mut cpu = make_cpu(0x3000, &[0b0010_001_000000001, HALT, 5]);
        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(1), 5);
        assert_eq!(cpu.regs.cond, Condition::Positive);
    }

    #[test]
    fn test_ld_unwritten_cell_reads_sentinel() {
        // LD R4, #100
        let mut cpu = make_cpu(0x3000, &[0b0010_100_001100100, HALT]);
        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(4), DEFAULT_VALUE);
    }

    #[test]
    fn test_st_leaves_cc() {
        // AND R0, R0, #0 (Z) ; NOT R1, R0 (N) ; ST R0, #1 ; HALT
        let mut cpu = make_cpu(0x3000, &[
            0b0101_000_000_1_00000,
            0b1001_001_000_111111,
            0b0011_000_000000001,
            HALT,
        ]);
        cpu.run().unwrap();
        assert_eq!(cpu.mem.read(0x3004), 0);
        assert_eq!(cpu.regs.cond, Condition::Negative);
    }

    #[test]
    fn test_ldr_str() {
        // LEA R6, #3 ; STR R0, R6, #1 ; LDR R2, R6, #1 ; HALT
        let mut cpu = make_cpu(0x3000, &[
            0b1110_110_000000011,
            0b0111_000_110_000001,
            0b0110_010_110_000001,
            HALT,
        ]);
        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(6), 0x3004);
        assert_eq!(cpu.mem.read(0x3005), DEFAULT_VALUE);
        assert!(cpu.mem.is_written(0x3005));
        assert_eq!(cpu.regs.get(2), DEFAULT_VALUE);
    }

    #[test]
    fn test_ldi_sti_indirect() {
        // x3000 LDI R1, #2 ; x3001 STI R1, #2 ; x3002 HALT ; x3003 x3006 ; x3004 x4000 ; x3005 - ; x3006 #-7
        let mut cpu = make_cpu(0x3000, &[
            0b1010_001_000000010,
            0b1011_001_000000010,
            HALT,
            0x3006,
            0x4000,
            0,
            (-7i16) as u16,
        ]);
        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(1), -7);
        assert_eq!(cpu.mem.read(0x4000), -7);
        assert_eq!(cpu.regs.cond, Condition::Negative);
    }

    #[test]
    fn test_lea_leaves_cc() {
        // NOT R0, R0 (N) ; LEA R5, #-2 ; HALT
        let mut cpu = make_cpu(0x3000, &[
            0b1001_000_000_111111,
            0b1110_101_111111110,
            HALT,
        ]);
        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(5), 0x3000);
        assert_eq!(cpu.regs.cond, Condition::Negative);
    }

    #[test]
    fn test_branch_taken_and_not_taken() {
        // x3000 AND R0, R0, #0 ; x3001 BRp #1 (not taken) ; x3002 BRz #1 (taken)
        // x3003 ADD R0, R0, #1 (skipped) ; x3004 HALT
        let mut cpu = make_cpu(0x3000, &[
            0b0101_000_000_1_00000,
            0b0000_001_000000001,
            0b0000_010_000000001,
            0b0001_000_000_1_00001,
            HALT,
        ]);
        let executed = cpu.run().unwrap();
        assert_eq!(executed, 4);
        assert_eq!(cpu.regs.get(0), 0);
    }

    #[test]
    fn test_branch_with_empty_mask_never_taken() {
        // BR with nzp = 000 is a no-op
        let mut cpu = make_cpu(0x3000, &[0b0000_000_000000101, HALT]);
        assert_eq!(cpu.run().unwrap(), 2);
    }

    #[test]
    fn test_branch_backwards_loop() {
        // R1 counts down from 3 to 0.
        // x3000 AND R1, R1, #0 ; x3001 ADD R1, R1, #3
        // x3002 ADD R1, R1, #-1 ; x3003 BRp #-2 ; x3004 HALT
        let mut cpu = make_cpu(0x3000, &[
            0b0101_001_001_1_00000,
            0b0001_001_001_1_00011,
            0b0001_001_001_1_11111,
            0b0000_001_111111110,
            HALT,
        ]);
        let executed = cpu.run().unwrap();
        assert_eq!(cpu.regs.get(1), 0);
        assert_eq!(executed, 2 + 3 * 2 + 1);
    }

    #[test]
    fn test_jsr_and_ret() {
        // x3000 JSR #2 ; x3001 HALT ; x3002 - ; x3003 AND R0, R0, #0 ; x3004 RET
        let mut cpu = make_cpu(0x3000, &[
            0b0100_1_00000000010,
            HALT,
            0,
            0b0101_000_000_1_00000,
            0b1100_000_111_000000,
        ]);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 0x3003);
        assert_eq!(cpu.regs.get(7), 0x3001);

        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(0), 0);
        assert_eq!(cpu.regs.pc, 0x3001);
    }

    #[test]
    fn test_jsrr_through_r7_uses_old_value() {
        // LEA R7, #2 ; JSRR R7 ; HALT ; HALT(target)
        let mut cpu = make_cpu(0x3000, &[
            0b1110_111_000000010,
            0b0100_0_00_111_000000,
            HALT,
            HALT,
        ]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 0x3003);
        assert_eq!(cpu.regs.get(7), 0x3002);
    }

    #[test]
    fn test_jmp_has_no_pre_increment() {
        // LEA R2, #0 ; JMP R2 -> lands on x3001 itself
        let mut cpu = make_cpu(0x3000, &[0b1110_010_000000000, 0b1100_000_010_000000]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 0x3001);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_control_transfer_leaves_cc() {
        // NOT R0, R0 (N) ; JSR #0 ; HALT
        let mut cpu = make_cpu(0x3000, &[0b1001_000_000_111111, 0b0100_1_00000000000, HALT]);
        cpu.run().unwrap();
        assert_eq!(cpu.regs.cond, Condition::Negative);
    }

    #[test]
    fn test_reserved_opcode_aborts_run() {
        let mut cpu = make_cpu(0x3000, &[0b0001_001_000_1_00001, 0xD000, HALT]);
        let err = cpu.run().unwrap_err();

        assert_eq!(
            err,
            CpuError::Decode {
                pc: 0x3001,
                source: DecodeError::ReservedOpcode { opcode: 0xD, word: 0xD000 },
            }
        );
        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 1);
    }

    #[test]
    fn test_rti_is_rejected() {
        let mut cpu = make_cpu(0, &[0x8000]);
        assert!(matches!(cpu.step(), Err(CpuError::Decode { pc: 0, .. })));
    }

    #[test]
    fn test_run_limited_stops_infinite_loop() {
        // BRnzp #-1
        let mut cpu = make_cpu(0x3000, &[0b0000_111_111111111]);
        let executed = cpu.run_limited(50).unwrap();
        assert_eq!(executed, 50);
        assert!(cpu.is_running());
        assert_eq!(cpu.regs.pc, 0x3000);
    }

    #[test]
    fn test_load_image_resets_state() {
        let mut cpu = make_cpu(0x3000, &[0b0101_000_000_1_00000, HALT]);
        cpu.run().unwrap();
        cpu.mem.write(0x5000, 1);

        let image = Image { start: 0x4000, words: vec![HALT as Value] };
        cpu.load_image(&image);

        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.regs.pc, 0x4000);
        assert_eq!(cpu.regs.get(0), DEFAULT_VALUE);
        assert_eq!(cpu.mem.read(0x5000), DEFAULT_VALUE);
        assert_eq!(cpu.mem.read(0x3000), DEFAULT_VALUE);
    }

    #[test]
    fn test_last_instruction() {
        let mut cpu = make_cpu(0, &[HALT]);
        assert!(cpu.last_instruction().is_none());
        cpu.run().unwrap();
        assert_eq!(cpu.last_instruction().map(|i| i.opcode()), Some(Opcode::Trap));
    }
}
