mod common;

use common::{program, running_console};
use gbc_core::bus::Bus;
use gbc_core::cpu::{AluOp, Cpu, Flags};
use gbc_core::{EmuError, StackError};

struct AluCase {
    op: AluOp,
    a: u8,
    operand: u8,
    carry_in: bool,
    result: u8,
    flags: Flags,
}

const fn flags(zero: bool, subtract: bool, half_carry: bool, carry: bool) -> Flags {
    Flags {
        zero,
        subtract,
        half_carry,
        carry,
    }
}

#[test]
fn alu_flag_vectors() {
    let cases = [
        AluCase {
            op: AluOp::Adc,
            a: 0xFD,
            operand: 0x02,
            carry_in: true,
            result: 0x00,
            flags: flags(true, false, true, true),
        },
        AluCase {
            op: AluOp::Add,
            a: 0x12,
            operand: 0x34,
            carry_in: false,
            result: 0x46,
            flags: flags(false, false, false, false),
        },
        AluCase {
            op: AluOp::Add,
            a: 0xFF,
            operand: 0x01,
            carry_in: true,
            result: 0x00,
            flags: flags(true, false, true, true),
        },
        AluCase {
            op: AluOp::Sub,
            a: 0x90,
            operand: 0x11,
            carry_in: false,
            result: 0x7F,
            flags: flags(false, true, true, false),
        },
        AluCase {
            op: AluOp::Sub,
            a: 0x12,
            operand: 0x12,
            carry_in: false,
            result: 0x00,
            flags: flags(true, true, false, false),
        },
        AluCase {
            op: AluOp::Sbc,
            a: 0x10,
            operand: 0x01,
            carry_in: true,
            result: 0x0E,
            flags: flags(false, true, true, false),
        },
        AluCase {
            op: AluOp::Cp,
            a: 0x05,
            operand: 0x07,
            carry_in: false,
            result: 0x05,
            flags: flags(false, true, true, true),
        },
        AluCase {
            op: AluOp::And,
            a: 0x3C,
            operand: 0x0F,
            carry_in: true,
            result: 0x0C,
            flags: flags(false, false, true, false),
        },
        AluCase {
            op: AluOp::Xor,
            a: 0x5A,
            operand: 0x5A,
            carry_in: true,
            result: 0x00,
            flags: flags(true, false, false, false),
        },
        AluCase {
            op: AluOp::Or,
            a: 0x50,
            operand: 0x05,
            carry_in: false,
            result: 0x55,
            flags: flags(false, false, false, false),
        },
    ];

    for case in cases {
        let mut cpu = Cpu::new();
        cpu.a = case.a;
        cpu.f.carry = case.carry_in;
        cpu.alu(case.op, case.operand);
        assert_eq!(
            (cpu.a, cpu.f),
            (case.result, case.flags),
            "{:?} {:#04X}, {:#04X} (carry {})",
            case.op,
            case.a,
            case.operand,
            case.carry_in
        );
    }
}

#[test]
fn stack_round_trip_restores_sp() {
    let mut cpu = Cpu::new();
    let mut bus = Bus::new(false);
    cpu.sp = 0xDFFE;

    cpu.push8(&mut bus, 0x7E).unwrap();
    cpu.push16(&mut bus, 0x1234).unwrap();
    assert_eq!(cpu.sp, 0xDFFB);
    assert_eq!(cpu.pop16(&mut bus).unwrap(), 0x1234);
    assert_eq!(cpu.pop8(&mut bus).unwrap(), 0x7E);
    assert_eq!(cpu.sp, 0xDFFE);
}

#[test]
fn pop_past_top_of_memory_is_an_error() {
    let mut cpu = Cpu::new();
    let mut bus = Bus::new(false);
    cpu.sp = 0xFFFF;
    assert_eq!(
        cpu.pop16(&mut bus),
        Err(StackError::Underflow { sp: 0xFFFF })
    );
    assert_eq!(cpu.sp, 0xFFFF);
}

#[test]
fn jr_negative_offset() {
    // JP 0x000A, then JR -5 at 0x000A.
    let rom = program(&[(0x0100, &[0xC3, 0x0A, 0x00]), (0x000A, &[0x18, 0xFB])]);
    let mut console = running_console(rom);

    assert_eq!(console.step_instruction().unwrap(), 16);
    assert_eq!(console.cpu().pc, 0x000A);
    assert_eq!(console.step_instruction().unwrap(), 12);
    assert_eq!(console.cpu().pc, 0x0007);
}

#[test]
fn rst_and_ret() {
    // JP 0x1FFF; RST 08H at 0x1FFF; RET at 0x0008.
    let rom = program(&[
        (0x0100, &[0xC3, 0xFF, 0x1F]),
        (0x1FFF, &[0xCF]),
        (0x0008, &[0xC9]),
    ]);
    let mut console = running_console(rom);
    console.step_instruction().unwrap();
    assert_eq!(console.cpu().pc, 0x1FFF);
    let sp = console.cpu().sp;

    assert_eq!(console.step_instruction().unwrap(), 16);
    assert_eq!(console.cpu().pc, 0x0008);
    assert_eq!(console.cpu().sp, sp - 2);
    assert_eq!(console.bus().peek(sp - 1), 0x20);
    assert_eq!(console.bus().peek(sp - 2), 0x00);

    assert_eq!(console.step_instruction().unwrap(), 16);
    assert_eq!(console.cpu().pc, 0x2000);
    assert_eq!(console.cpu().sp, sp);
}

#[test]
fn rst_pushes_address_after_opcode() {
    // JP 0x2000; RST 08H at 0x2000; RET at 0x0008.
    let rom = program(&[
        (0x0100, &[0xC3, 0x00, 0x20]),
        (0x2000, &[0xCF]),
        (0x0008, &[0xC9]),
    ]);
    let mut console = running_console(rom);
    console.step_instruction().unwrap();
    assert_eq!(console.cpu().pc, 0x2000);
    let sp = console.cpu().sp;

    assert_eq!(console.step_instruction().unwrap(), 16);
    assert_eq!(console.cpu().pc, 0x0008);
    assert_eq!(console.bus().peek(sp - 1), 0x20);
    assert_eq!(console.bus().peek(sp - 2), 0x01);

    assert_eq!(console.step_instruction().unwrap(), 16);
    assert_eq!(console.cpu().pc, 0x2001);
    assert_eq!(console.cpu().sp, sp);
}

#[test]
fn call_and_conditional_costs() {
    // XOR A (Z set); CALL NZ skipped; CALL Z taken to 0x0200; RET NZ skipped; RET.
    let rom = program(&[
        (0x0100, &[0xAF, 0xC4, 0x00, 0x02, 0xCC, 0x00, 0x02]),
        (0x0200, &[0xC0, 0xC9]),
    ]);
    let mut console = running_console(rom);
    let costs: Vec<u32> = (0..5)
        .map(|_| console.step_instruction().unwrap())
        .collect();
    assert_eq!(costs, vec![4, 12, 24, 8, 16]);
    assert_eq!(console.cpu().pc, 0x0107);
}

#[test]
fn running_off_the_rom_faults() {
    // JP 0x7FFF in a 16 KiB image with no bank 1.
    let mut rom = vec![0u8; 0x4000];
    rom[0x0100..0x0103].copy_from_slice(&[0xC3, 0xFF, 0x7F]);
    let mut console = running_console(rom);
    console.step_instruction().unwrap();
    assert!(matches!(
        console.run_frame(),
        Err(EmuError::Address(_))
    ));
}

#[test]
fn ld_hl_sp_offset_and_sp_hl() {
    // LD SP,0xD000; LD HL,SP-2; LD SP,HL
    let rom = program(&[(0x0100, &[0x31, 0x00, 0xD0, 0xF8, 0xFE, 0xF9])]);
    let mut console = running_console(rom);
    console.step_instruction().unwrap();
    assert_eq!(console.step_instruction().unwrap(), 12);
    assert_eq!(console.cpu().hl(), 0xCFFE);
    assert!(!console.cpu().f.carry);
    assert_eq!(console.step_instruction().unwrap(), 8);
    assert_eq!(console.cpu().sp, 0xCFFE);
}
