use std::collections::VecDeque;

use crate::bus::Bus;
use crate::clock::Clock;
use crate::error::{AddressError, EmuError, OpcodeError, StackError};
use crate::interrupts;

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_A: u8 = 0x01;
const BOOT_B: u8 = 0x00;
const BOOT_C: u8 = 0x13;
const BOOT_D: u8 = 0x00;
const BOOT_E: u8 = 0xD8;
const BOOT_H: u8 = 0x01;
const BOOT_L: u8 = 0x4D;
const BOOT_SP: u16 = 0xFFFE;
const BOOT_PC: u16 = 0x0100;

/// Cycles that pass on a tick where the CPU is halted or stopped.
pub const IDLE_CYCLES: u32 = 4;

/// Entries kept by the instruction trace.
pub const TRACE_CAPACITY: usize = 300;

/// The four CPU flags. They only become a byte when AF is read as a pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub zero: bool,
    pub subtract: bool,
    pub half_carry: bool,
    pub carry: bool,
}

impl Flags {
    pub fn to_byte(self) -> u8 {
        (self.zero as u8) << 7
            | (self.subtract as u8) << 6
            | (self.half_carry as u8) << 5
            | (self.carry as u8) << 4
    }

    pub fn from_byte(value: u8) -> Self {
        Self {
            zero: value & 0x80 != 0,
            subtract: value & 0x40 != 0,
            half_carry: value & 0x20 != 0,
            carry: value & 0x10 != 0,
        }
    }
}

/// Operations of the 0x80-0xBF block and the matching immediate forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbc,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Cp,
        }
    }
}

/// Rotates and shifts of the CB 0x00-0x3F block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl ShiftOp {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => ShiftOp::Rlc,
            1 => ShiftOp::Rrc,
            2 => ShiftOp::Rl,
            3 => ShiftOp::Rr,
            4 => ShiftOp::Sla,
            5 => ShiftOp::Sra,
            6 => ShiftOp::Swap,
            _ => ShiftOp::Srl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    pub pc: u16,
    pub opcode: u8,
    /// Cycles the instruction took; 0 if it faulted.
    pub cycles: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Cpu {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub f: Flags,
    pub pc: u16,
    pub sp: u16,
    pub ime: bool,
    pub halted: bool,
    pub stopped: bool,
    /// Counts down to IME being set; EI loads 2.
    ime_delay: u8,
    halt_bug: bool,
    trace: Option<VecDeque<TraceEntry>>,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register state the boot ROM hands over to the cartridge.
    pub fn apply_post_boot_state(&mut self) {
        self.a = BOOT_A;
        self.b = BOOT_B;
        self.c = BOOT_C;
        self.d = BOOT_D;
        self.e = BOOT_E;
        self.h = BOOT_H;
        self.l = BOOT_L;
        self.sp = BOOT_SP;
        self.pc = BOOT_PC;
        self.f = Flags {
            zero: true,
            subtract: false,
            half_carry: true,
            carry: true,
        };
    }

    /// Zero registers and flags and leave HALT/STOP. Tracing stays as it was.
    pub fn reset(&mut self) {
        let trace = self.trace.take().map(|mut t| {
            t.clear();
            t
        });
        *self = Self {
            trace,
            ..Self::default()
        };
    }

    pub fn af(&self) -> u16 {
        (self.a as u16) << 8 | self.f.to_byte() as u16
    }

    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = Flags::from_byte(val as u8);
    }

    pub fn bc(&self) -> u16 {
        (self.b as u16) << 8 | self.c as u16
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn de(&self) -> u16 {
        (self.d as u16) << 8 | self.e as u16
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn hl(&self) -> u16 {
        (self.h as u16) << 8 | self.l as u16
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    pub fn debug_state(&self) -> String {
        format!(
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} IME:{}",
            self.af(),
            self.bc(),
            self.de(),
            self.hl(),
            self.pc,
            self.sp,
            self.ime as u8
        )
    }

    pub fn set_trace(&mut self, enabled: bool) {
        match (enabled, self.trace.is_some()) {
            (true, false) => self.trace = Some(VecDeque::with_capacity(TRACE_CAPACITY)),
            (false, true) => self.trace = None,
            _ => {}
        }
    }

    /// Most recent instructions, oldest first. Empty when tracing is off.
    pub fn trace(&self) -> Vec<TraceEntry> {
        self.trace
            .as_ref()
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Leave STOP; the joypad does this on a button press.
    pub fn wake(&mut self) {
        if self.stopped {
            self.stopped = false;
            log::debug!("CPU leaves STOP at {:#06X}", self.pc);
        }
    }

    /// Runs the interrupt check and at most one instruction, advancing
    /// `clock` by everything spent. Returns the cycles spent.
    pub fn tick(&mut self, bus: &mut Bus, clock: &mut Clock) -> Result<u32, EmuError> {
        if self.stopped {
            clock.advance(IDLE_CYCLES);
            return Ok(IDLE_CYCLES);
        }

        let serviced = interrupts::service(self, bus, clock)?;
        if self.halted {
            clock.advance(IDLE_CYCLES);
            return Ok(serviced + IDLE_CYCLES);
        }

        let pc = self.pc;
        let opcode = bus.fetch(pc)?;
        if self.halt_bug {
            // The byte after HALT is read again as the first operand.
            self.halt_bug = false;
            self.pc = self.pc.wrapping_sub(1);
        }
        if let Some(trace) = self.trace.as_mut() {
            if trace.len() == TRACE_CAPACITY {
                trace.pop_front();
            }
            trace.push_back(TraceEntry {
                pc,
                opcode,
                cycles: 0,
            });
        }

        let cycles = self.execute(opcode, bus)?;
        if let Some(entry) = self.trace.as_mut().and_then(|t| t.back_mut()) {
            entry.cycles = cycles;
        }
        self.pc = self.pc.wrapping_add(1);

        if self.ime_delay > 0 {
            self.ime_delay -= 1;
            if self.ime_delay == 0 {
                self.ime = true;
            }
        }

        clock.advance(cycles);
        Ok(serviced + cycles)
    }

    pub fn push8(&mut self, bus: &mut Bus, val: u8) -> Result<(), StackError> {
        self.sp = self
            .sp
            .checked_sub(1)
            .ok_or(StackError::Overflow { sp: self.sp })?;
        bus.write(self.sp, val);
        Ok(())
    }

    pub fn pop8(&mut self, bus: &mut Bus) -> Result<u8, StackError> {
        let next = self
            .sp
            .checked_add(1)
            .ok_or(StackError::Underflow { sp: self.sp })?;
        let val = bus.read(self.sp);
        self.sp = next;
        Ok(val)
    }

    pub fn push16(&mut self, bus: &mut Bus, val: u16) -> Result<(), StackError> {
        if self.sp < 2 {
            return Err(StackError::Overflow { sp: self.sp });
        }
        self.push8(bus, (val >> 8) as u8)?;
        self.push8(bus, val as u8)
    }

    pub fn pop16(&mut self, bus: &mut Bus) -> Result<u16, StackError> {
        if self.sp > 0xFFFD {
            return Err(StackError::Underflow { sp: self.sp });
        }
        let lo = self.pop8(bus)? as u16;
        let hi = self.pop8(bus)? as u16;
        Ok(hi << 8 | lo)
    }

    /// Address of the operand byte `offset` bytes past the opcode.
    fn operand_addr(&self, offset: u16) -> Result<u16, AddressError> {
        self.pc
            .checked_add(offset)
            .ok_or(AddressError::OutOfRange(self.pc as u32 + offset as u32))
    }

    fn imm8(&self, bus: &mut Bus) -> Result<u8, AddressError> {
        bus.fetch(self.operand_addr(1)?)
    }

    fn imm16(&self, bus: &mut Bus) -> Result<u16, AddressError> {
        let lo = bus.fetch(self.operand_addr(1)?)? as u16;
        let hi = bus.fetch(self.operand_addr(2)?)? as u16;
        Ok(hi << 8 | lo)
    }

    fn write16(&self, bus: &mut Bus, addr: u16, val: u16) -> Result<(), AddressError> {
        let next = addr
            .checked_add(1)
            .ok_or(AddressError::OutOfRange(addr as u32 + 1))?;
        bus.write(addr, val as u8);
        bus.write(next, (val >> 8) as u8);
        Ok(())
    }

    /// Step over operand bytes; the opcode byte itself is counted after dispatch.
    fn skip(&mut self, operands: u16) {
        self.pc = self.pc.wrapping_add(operands);
    }

    /// Land on `target` once the post-dispatch increment is applied.
    fn jump(&mut self, target: u16) {
        self.pc = target.wrapping_sub(1);
    }

    /// JR target: relative to the end of the two-byte instruction.
    fn jump_relative(&mut self, offset: i8) {
        let target = self.pc.wrapping_add(2).wrapping_add(offset as i16 as u16);
        self.jump(target);
    }

    fn call(&mut self, bus: &mut Bus, target: u16, len: u16) -> Result<(), StackError> {
        let ret = self.pc.wrapping_add(len);
        self.push16(bus, ret)?;
        self.jump(target);
        Ok(())
    }

    fn ret(&mut self, bus: &mut Bus) -> Result<(), StackError> {
        let target = self.pop16(bus)?;
        self.jump(target);
        Ok(())
    }

    fn condition(&self, opcode: u8) -> bool {
        match (opcode >> 3) & 0x03 {
            0 => !self.f.zero,
            1 => self.f.zero,
            2 => !self.f.carry,
            _ => self.f.carry,
        }
    }

    /// B, C, D, E, H, L, (HL), A by opcode index.
    fn read_r8(&self, bus: &mut Bus, index: u8) -> u8 {
        match index & 0x07 {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => bus.read(self.hl()),
            _ => self.a,
        }
    }

    fn write_r8(&mut self, bus: &mut Bus, index: u8, val: u8) {
        match index & 0x07 {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => self.h = val,
            5 => self.l = val,
            6 => bus.write(self.hl(), val),
            _ => self.a = val,
        }
    }

    /// BC, DE, HL, SP.
    fn r16(&self, index: u8) -> u16 {
        match index & 0x03 {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    fn set_r16(&mut self, index: u8, val: u16) {
        match index & 0x03 {
            0 => self.set_bc(val),
            1 => self.set_de(val),
            2 => self.set_hl(val),
            _ => self.sp = val,
        }
    }

    /// BC, DE, HL, AF as used by PUSH and POP.
    fn stack_r16(&self, index: u8) -> u16 {
        match index & 0x03 {
            3 => self.af(),
            i => self.r16(i),
        }
    }

    fn set_stack_r16(&mut self, index: u8, val: u16) {
        match index & 0x03 {
            3 => self.set_af(val),
            i => self.set_r16(i, val),
        }
    }

    /// (BC), (DE), (HL+), (HL-) for the 0x02/0x0A columns.
    fn indirect_addr(&mut self, opcode: u8) -> u16 {
        match (opcode >> 4) & 0x03 {
            0 => self.bc(),
            1 => self.de(),
            2 => {
                let hl = self.hl();
                self.set_hl(hl.wrapping_add(1));
                hl
            }
            _ => {
                let hl = self.hl();
                self.set_hl(hl.wrapping_sub(1));
                hl
            }
        }
    }

    pub fn alu(&mut self, op: AluOp, val: u8) {
        let a = self.a;
        match op {
            AluOp::Add | AluOp::Adc => {
                let carry = (op == AluOp::Adc && self.f.carry) as u8;
                let res = a as u16 + val as u16 + carry as u16;
                self.f = Flags {
                    zero: res as u8 == 0,
                    subtract: false,
                    half_carry: (a & 0x0F) + (val & 0x0F) + carry > 0x0F,
                    carry: res > 0xFF,
                };
                self.a = res as u8;
            }
            AluOp::Sub | AluOp::Sbc | AluOp::Cp => {
                let carry = (op == AluOp::Sbc && self.f.carry) as i16;
                let res = a as i16 - val as i16 - carry;
                self.f = Flags {
                    zero: res as u8 == 0,
                    subtract: true,
                    half_carry: (a & 0x0F) as i16 - (val & 0x0F) as i16 - carry < 0,
                    carry: res < 0,
                };
                if op != AluOp::Cp {
                    self.a = res as u8;
                }
            }
            AluOp::And => {
                self.a = a & val;
                self.f = Flags {
                    zero: self.a == 0,
                    half_carry: true,
                    ..Flags::default()
                };
            }
            AluOp::Xor | AluOp::Or => {
                self.a = if op == AluOp::Xor { a ^ val } else { a | val };
                self.f = Flags {
                    zero: self.a == 0,
                    ..Flags::default()
                };
            }
        }
    }

    pub fn shift(&mut self, op: ShiftOp, val: u8) -> u8 {
        let carry_in = self.f.carry as u8;
        let (res, carry) = match op {
            ShiftOp::Rlc => (val.rotate_left(1), val & 0x80 != 0),
            ShiftOp::Rrc => (val.rotate_right(1), val & 0x01 != 0),
            ShiftOp::Rl => (val << 1 | carry_in, val & 0x80 != 0),
            ShiftOp::Rr => (val >> 1 | carry_in << 7, val & 0x01 != 0),
            ShiftOp::Sla => (val << 1, val & 0x80 != 0),
            ShiftOp::Sra => (val >> 1 | (val & 0x80), val & 0x01 != 0),
            ShiftOp::Swap => (val.rotate_left(4), false),
            ShiftOp::Srl => (val >> 1, val & 0x01 != 0),
        };
        self.f = Flags {
            zero: res == 0,
            subtract: false,
            half_carry: false,
            carry,
        };
        res
    }

    fn inc8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.f.zero = res == 0;
        self.f.subtract = false;
        self.f.half_carry = val & 0x0F == 0x0F;
        res
    }

    fn dec8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.f.zero = res == 0;
        self.f.subtract = true;
        self.f.half_carry = val & 0x0F == 0;
        res
    }

    fn add_hl(&mut self, val: u16) {
        let hl = self.hl();
        let res = hl as u32 + val as u32;
        self.f.subtract = false;
        self.f.half_carry = (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF;
        self.f.carry = res > 0xFFFF;
        self.set_hl(res as u16);
    }

    /// SP + e8 as used by ADD SP,e8 and LD HL,SP+e8. Flags come from the
    /// unsigned low-byte addition.
    fn sp_offset(&mut self, offset: i8) -> u16 {
        let val = offset as i16 as u16;
        self.f = Flags {
            zero: false,
            subtract: false,
            half_carry: (self.sp & 0x0F) + (val & 0x0F) > 0x0F,
            carry: (self.sp & 0xFF) + (val & 0xFF) > 0xFF,
        };
        self.sp.wrapping_add(val)
    }

    fn daa(&mut self) {
        let mut correction = 0u8;
        let mut carry = false;
        if self.f.half_carry || (!self.f.subtract && (self.a & 0x0F) > 0x09) {
            correction |= 0x06;
        }
        if self.f.carry || (!self.f.subtract && self.a > 0x99) {
            correction |= 0x60;
            carry = true;
        }
        self.a = if self.f.subtract {
            self.a.wrapping_sub(correction)
        } else {
            self.a.wrapping_add(correction)
        };
        self.f.zero = self.a == 0;
        self.f.half_carry = false;
        self.f.carry = carry;
    }

    fn halt(&mut self, bus: &Bus) {
        let pending = bus.ie() & bus.if_reg() & 0x1F;
        if !self.ime && pending != 0 {
            self.halt_bug = true;
        } else {
            self.halted = true;
        }
    }

    fn stop(&mut self, bus: &mut Bus) {
        self.stopped = true;
        bus.write(0xFF04, 0);
        log::debug!("STOP at {:#06X}", self.pc);
    }

    /// Executes one unprefixed opcode and returns its cycle cost.
    fn execute(&mut self, opcode: u8, bus: &mut Bus) -> Result<u32, EmuError> {
        let cycles = match opcode {
            0x00 => 4,
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.imm16(bus)?;
                self.set_r16(opcode >> 4, val);
                self.skip(2);
                12
            }
            0x02 | 0x12 | 0x22 | 0x32 => {
                let addr = self.indirect_addr(opcode);
                bus.write(addr, self.a);
                8
            }
            0x0A | 0x1A | 0x2A | 0x3A => {
                let addr = self.indirect_addr(opcode);
                self.a = bus.read(addr);
                8
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                let val = self.r16(opcode >> 4).wrapping_add(1);
                self.set_r16(opcode >> 4, val);
                8
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let val = self.r16(opcode >> 4).wrapping_sub(1);
                self.set_r16(opcode >> 4, val);
                8
            }
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = opcode >> 3;
                let val = self.read_r8(bus, r);
                let res = self.inc8(val);
                self.write_r8(bus, r, res);
                if r == 6 { 12 } else { 4 }
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = opcode >> 3;
                let val = self.read_r8(bus, r);
                let res = self.dec8(val);
                self.write_r8(bus, r, res);
                if r == 6 { 12 } else { 4 }
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let r = opcode >> 3;
                let val = self.imm8(bus)?;
                self.write_r8(bus, r, val);
                self.skip(1);
                if r == 6 { 12 } else { 8 }
            }
            0x07 | 0x0F | 0x17 | 0x1F => {
                let op = ShiftOp::from_bits(opcode >> 3);
                self.a = self.shift(op, self.a);
                self.f.zero = false;
                4
            }
            0x08 => {
                let addr = self.imm16(bus)?;
                self.write16(bus, addr, self.sp)?;
                self.skip(2);
                20
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                let val = self.r16(opcode >> 4);
                self.add_hl(val);
                8
            }
            0x10 => {
                self.stop(bus);
                self.skip(1);
                4
            }
            0x18 => {
                let offset = self.imm8(bus)? as i8;
                self.jump_relative(offset);
                12
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.imm8(bus)? as i8;
                if self.condition(opcode) {
                    self.jump_relative(offset);
                    12
                } else {
                    self.skip(1);
                    8
                }
            }
            0x27 => {
                self.daa();
                4
            }
            0x2F => {
                self.a = !self.a;
                self.f.subtract = true;
                self.f.half_carry = true;
                4
            }
            0x37 => {
                self.f.subtract = false;
                self.f.half_carry = false;
                self.f.carry = true;
                4
            }
            0x3F => {
                self.f.subtract = false;
                self.f.half_carry = false;
                self.f.carry = !self.f.carry;
                4
            }
            0x76 => {
                self.halt(bus);
                4
            }
            0x40..=0x7F => {
                let src = opcode & 0x07;
                let dst = (opcode >> 3) & 0x07;
                let val = self.read_r8(bus, src);
                self.write_r8(bus, dst, val);
                if src == 6 || dst == 6 { 8 } else { 4 }
            }
            0x80..=0xBF => {
                let src = opcode & 0x07;
                let val = self.read_r8(bus, src);
                self.alu(AluOp::from_bits(opcode >> 3), val);
                if src == 6 { 8 } else { 4 }
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                if self.condition(opcode) {
                    self.ret(bus)?;
                    20
                } else {
                    8
                }
            }
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let val = self.pop16(bus)?;
                self.set_stack_r16(opcode >> 4, val);
                12
            }
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let val = self.stack_r16(opcode >> 4);
                self.push16(bus, val)?;
                16
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let target = self.imm16(bus)?;
                if self.condition(opcode) {
                    self.jump(target);
                    16
                } else {
                    self.skip(2);
                    12
                }
            }
            0xC3 => {
                let target = self.imm16(bus)?;
                self.jump(target);
                16
            }
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let target = self.imm16(bus)?;
                if self.condition(opcode) {
                    self.call(bus, target, 3)?;
                    24
                } else {
                    self.skip(2);
                    12
                }
            }
            0xCD => {
                let target = self.imm16(bus)?;
                self.call(bus, target, 3)?;
                24
            }
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let val = self.imm8(bus)?;
                self.alu(AluOp::from_bits(opcode >> 3), val);
                self.skip(1);
                8
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.call(bus, (opcode & 0x38) as u16, 1)?;
                16
            }
            0xC9 => {
                self.ret(bus)?;
                16
            }
            0xD9 => {
                self.ret(bus)?;
                self.ime = true;
                self.ime_delay = 0;
                16
            }
            0xCB => {
                let cb = self.imm8(bus)?;
                self.skip(1);
                self.execute_cb(cb, bus)
            }
            0xE0 => {
                let offset = self.imm8(bus)?;
                bus.write(0xFF00 | offset as u16, self.a);
                self.skip(1);
                12
            }
            0xF0 => {
                let offset = self.imm8(bus)?;
                self.a = bus.read(0xFF00 | offset as u16);
                self.skip(1);
                12
            }
            0xE2 => {
                bus.write(0xFF00 | self.c as u16, self.a);
                8
            }
            0xF2 => {
                self.a = bus.read(0xFF00 | self.c as u16);
                8
            }
            0xE8 => {
                let offset = self.imm8(bus)? as i8;
                self.sp = self.sp_offset(offset);
                self.skip(1);
                16
            }
            0xF8 => {
                let offset = self.imm8(bus)? as i8;
                let val = self.sp_offset(offset);
                self.set_hl(val);
                self.skip(1);
                12
            }
            0xF9 => {
                self.sp = self.hl();
                8
            }
            0xE9 => {
                self.jump(self.hl());
                4
            }
            0xEA => {
                let addr = self.imm16(bus)?;
                bus.write(addr, self.a);
                self.skip(2);
                16
            }
            0xFA => {
                let addr = self.imm16(bus)?;
                self.a = bus.read(addr);
                self.skip(2);
                16
            }
            0xF3 => {
                self.ime = false;
                self.ime_delay = 0;
                4
            }
            0xFB => {
                if !self.ime && self.ime_delay == 0 {
                    self.ime_delay = 2;
                }
                4
            }
            0xD3 | 0xDB | 0xDD | 0xE3 | 0xE4 | 0xEB | 0xEC | 0xED | 0xF4 | 0xFC | 0xFD => {
                log::error!("Illegal opcode {:#04X} at {:#06X}", opcode, self.pc);
                return Err(OpcodeError::Illegal {
                    opcode,
                    pc: self.pc,
                }
                .into());
            }
        };
        Ok(cycles)
    }

    /// Executes a 0xCB-prefixed opcode; the cost includes the prefix.
    fn execute_cb(&mut self, opcode: u8, bus: &mut Bus) -> u32 {
        let r = opcode & 0x07;
        let bit = (opcode >> 3) & 0x07;
        let val = self.read_r8(bus, r);
        match opcode {
            0x00..=0x3F => {
                let res = self.shift(ShiftOp::from_bits(opcode >> 3), val);
                self.write_r8(bus, r, res);
            }
            0x40..=0x7F => {
                self.f.zero = val & (1 << bit) == 0;
                self.f.subtract = false;
                self.f.half_carry = true;
                return if r == 6 { 12 } else { 8 };
            }
            0x80..=0xBF => self.write_r8(bus, r, val & !(1 << bit)),
            0xC0..=0xFF => self.write_r8(bus, r, val | (1 << bit)),
        }
        if r == 6 { 16 } else { 8 }
    }
}
