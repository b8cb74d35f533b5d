//! End-to-end runs: image text or assembly source in, register dump out.

use lc3::{assemble, parse_image, Condition, Cpu, CpuError, DecodeError, DEFAULT_VALUE};

fn run_image(text: &str) -> Cpu {
    let image = parse_image(text).unwrap();
    let mut cpu = Cpu::from_image(&image);
    cpu.run().unwrap();
    cpu
}

fn run_source(source: &str) -> Cpu {
    let image = assemble(source).unwrap();
    let mut cpu = Cpu::from_image(&image);
    cpu.run().unwrap();
    cpu
}

#[test]
fn halt_only_program_dumps_sentinels() {
    let cpu = run_image("0000000000000000\n1111000000100101\n");

    assert_eq!(cpu.cycles, 1);
    assert!(cpu.is_halted());
    let expected: String = (0..8).map(|i| format!("R{} = x7777\n", i)).collect();
    assert_eq!(cpu.regs.dump(), expected);
}

#[test]
fn add_immediate_to_sentinel() {
    let cpu = run_image("0000000000000000\n0001001000100001\n1111000000100101\n");

    // R1 = R0 + 1, and R0 starts at the sentinel.
    assert_eq!(cpu.regs.get(1), DEFAULT_VALUE + 1);
    let dump = cpu.regs.dump();
    assert_eq!(dump.lines().nth(0), Some("R0 = x7777"));
    assert_eq!(dump.lines().nth(1), Some("R1 = x7778"));
    assert_eq!(dump.lines().nth(2), Some("R2 = x7777"));
}

#[test]
fn reserved_opcode_aborts_without_halting() {
    let image = parse_image("0011000000000000\n1101000000000000\n1111000000100101\n").unwrap();
    let mut cpu = Cpu::from_image(&image);

    let err = cpu.run().unwrap_err();
    assert!(matches!(
        err,
        CpuError::Decode { pc: 0x3000, source: DecodeError::ReservedOpcode { opcode: 0b1101, .. } }
    ));
    assert!(!cpu.is_halted());
}

#[test]
fn multiply_by_repeated_addition() {
    let cpu = run_source(r#"
        .ORIG x3000
        AND R0, R0, #0      ; product
        LD R1, SIX
        LD R2, SEVEN
LOOP    ADD R0, R0, R1
        ADD R2, R2, #-1
        BRp LOOP
        ST R0, RESULT
        HALT
SIX     .FILL #6
SEVEN   .FILL #7
RESULT  .BLKW 1
        .END
    "#);

    assert_eq!(cpu.regs.get(0), 42);
    assert_eq!(cpu.regs.get(2), 0);
    assert_eq!(cpu.mem.read(0x300A), 42);
    // ST does not touch the flag, so it still reflects R2 reaching zero.
    assert_eq!(cpu.regs.cond, Condition::Zero);
}

#[test]
fn subroutine_call_and_return() {
    let cpu = run_source(r#"
        .ORIG x3000
        LEA R0, VALUES
        JSR SUM
        HALT
SUM     AND R3, R3, #0
        LDR R1, R0, #0
        ADD R3, R3, R1
        LDR R1, R0, #1
        ADD R3, R3, R1
        RET
VALUES  .FILL #-20
        .FILL #5
        .END
    "#);

    assert_eq!(cpu.regs.get(3), -15);
    assert_eq!(cpu.regs.get(7), 0x3002);
    assert_eq!(cpu.regs.cond, Condition::Negative);
    assert_eq!(cpu.regs.dump().lines().nth(3), Some("R3 = xFFF1"));
}

#[test]
fn string_length_with_indirect_pointer() {
    let cpu = run_source(r#"
        .ORIG x3000
        LDI R1, PTR         ; R1 = first char through the pointer
        LD R0, PTR
        AND R2, R2, #0
NEXT    LDR R1, R0, #0
        BRz DONE
        ADD R2, R2, #1
        ADD R0, R0, #1
        BR NEXT
DONE    STI R2, OUTP
        HALT
PTR     .FILL MSG
OUTP    .FILL x4000
MSG     .STRINGZ "hello"
        .END
    "#);

    assert_eq!(cpu.regs.get(2), 5);
    assert_eq!(cpu.mem.read(0x4000), 5);
}

#[test]
fn jsrr_and_jmp_through_registers() {
    let cpu = run_source(r#"
        .ORIG x3000
        LEA R4, TARGET
        JSRR R4
        HALT
TARGET  NOT R5, R7
        LEA R6, BACK
        JMP R6
        ADD R5, R5, #1      ; skipped
BACK    RET
        .END
    "#);

    assert_eq!(cpu.regs.get(7), 0x3002);
    assert_eq!(cpu.regs.get(5), !0x3002);
    assert_eq!(cpu.regs.pc, 0x3002);
}

#[test]
fn unwritten_memory_reads_sentinel_during_run() {
    let cpu = run_source(r#"
        .ORIG x3000
        LD R0, #100
        LDR R1, R0, #0      ; R0 = x7777, another unwritten cell
        HALT
        .END
    "#);

    assert_eq!(cpu.regs.get(0), DEFAULT_VALUE);
    assert_eq!(cpu.regs.get(1), DEFAULT_VALUE);
}

#[test]
fn assembled_image_round_trips_through_text() {
    let image = assemble(".ORIG x3000\nADD R1, R0, #1\nHALT\n.END\n").unwrap();
    let text = image.to_text();
    assert_eq!(text, "0011000000000000\n0001001000100001\n1111000000100101\n");
    assert_eq!(parse_image(&text).unwrap(), image);
}

#[test]
fn program_loaded_at_top_of_memory_wraps() {
    // x-1 (xFFFF) holds ADD R1, R0, #1; the next word wraps to x0000.
    let cpu = run_image("1111111111111111\n0001001000100001\n1111000000100101\n");
    assert_eq!(cpu.regs.get(1), DEFAULT_VALUE + 1);
    assert_eq!(cpu.regs.pc, 0);
}
