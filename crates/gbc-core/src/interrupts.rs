//! Interrupt sources and the per-instruction dispatch check.

use crate::bus::Bus;
use crate::clock::Clock;
use crate::cpu::Cpu;
use crate::error::StackError;

/// Cycles spent leaving HALT because an interrupt became pending.
pub const HALT_EXIT_CYCLES: u32 = 4;
/// Cycles spent pushing PC and jumping to a vector.
pub const DISPATCH_CYCLES: u32 = 20;

/// The five interrupt sources in priority order, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    pub fn mask(self) -> u8 {
        1 << self as u8
    }

    pub fn vector(self) -> u16 {
        0x40 + 8 * self as u16
    }

    /// Highest priority source set in `pending`.
    pub fn highest(pending: u8) -> Option<Interrupt> {
        Self::ALL.into_iter().find(|i| pending & i.mask() != 0)
    }
}

/// Runs once per CPU tick before the instruction fetch. Returns the cycles
/// spent on halt exit and dispatch.
pub fn service(cpu: &mut Cpu, bus: &mut Bus, clock: &mut Clock) -> Result<u32, StackError> {
    let pending = bus.ie() & bus.if_reg() & 0x1F;
    if pending == 0 {
        return Ok(0);
    }

    let mut cycles = 0;
    if cpu.halted {
        cpu.halted = false;
        cycles += HALT_EXIT_CYCLES;
    }

    if !cpu.ime {
        clock.advance(cycles);
        return Ok(cycles);
    }

    let Some(interrupt) = Interrupt::highest(pending) else {
        clock.advance(cycles);
        return Ok(cycles);
    };

    cpu.ime = false;
    cpu.push16(bus, cpu.pc)?;
    bus.clear_interrupt(interrupt);
    cpu.pc = interrupt.vector();
    cycles += DISPATCH_CYCLES;
    log::trace!("Servicing {:?} -> {:#06X}", interrupt, cpu.pc);

    clock.advance(cycles);
    Ok(cycles)
}
