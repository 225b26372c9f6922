use crate::{
    bus::{BootKind, BootRom, Bus},
    cartridge::Cartridge,
    clock::{Clock, Mode},
    cpu::{Cpu, Flags, TraceEntry},
    error::{EmuError, LoadError},
    joypad::Button,
    ppu::{FRAME_BYTES, Ppu},
};

/// Regions sampled into every [`DebugSnapshot`], 16 bytes each.
const SAMPLE_REGIONS: [(&str, u16); 6] = [
    ("header", 0x0100),
    ("vram", 0x8000),
    ("wram", 0xC000),
    ("oam", 0xFE00),
    ("io", 0xFF00),
    ("hram", 0xFF80),
];
const SAMPLE_LEN: u16 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleState {
    /// Nothing started yet, or reset since.
    Idle,
    Running,
    Paused,
    Stopped,
    /// A fatal emulation error ended the session.
    Faulted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySample {
    pub region: &'static str,
    pub addr: u16,
    pub bytes: Vec<u8>,
}

/// Point-in-time copy of the machine state for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSnapshot {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub flags: Flags,
    pub pc: u16,
    pub sp: u16,
    pub ime: bool,
    pub halted: bool,
    pub cycles: u32,
    pub ppu_mode: Mode,
    pub ly: u8,
    pub memory: Vec<MemorySample>,
}

impl DebugSnapshot {
    pub fn sample(&self, region: &str) -> Option<&MemorySample> {
        self.memory.iter().find(|s| s.region == region)
    }
}

/// One emulated console: owns the clock, the bus (with cartridge, timer and
/// every register), the CPU and the PPU, and drives them a frame at a time.
pub struct Console {
    clock: Clock,
    bus: Bus,
    cpu: Cpu,
    ppu: Ppu,
    state: ConsoleState,
    frame: Vec<u8>,
    frames: u64,
}

impl Console {
    pub fn new() -> Self {
        Self {
            clock: Clock::new(),
            bus: Bus::new(false),
            cpu: Cpu::new(),
            ppu: Ppu::new(),
            state: ConsoleState::Idle,
            frame: vec![0xFF; FRAME_BYTES],
            frames: 0,
        }
    }

    /// Parse and insert a cartridge. Does not start execution.
    pub fn load_cartridge(&mut self, bytes: Vec<u8>) -> Result<(), LoadError> {
        let cart = Cartridge::load(bytes)?;
        if self.bus.boot_rom().is_none() {
            self.bus.set_cgb_mode(cart.info.compatibility.supports_cgb());
        }
        self.bus.load_cart(cart);
        Ok(())
    }

    pub fn load_boot_rom(&mut self, bytes: Vec<u8>) -> Result<(), LoadError> {
        let boot = BootRom::new(bytes)?;
        log::info!("Loaded {:?} boot ROM ({} bytes)", boot.kind(), boot.len());
        self.bus.set_cgb_mode(boot.kind() == BootKind::Cgb);
        self.bus.load_boot_rom(boot);
        Ok(())
    }

    /// Begin execution, at 0x0000 through the boot ROM when one is loaded,
    /// otherwise at 0x0100 with the post-boot register state.
    pub fn start(&mut self) {
        self.clock.reset();
        self.cpu.reset();
        if self.bus.boot_rom().is_some() {
            self.bus.rearm_boot_rom();
            self.cpu.pc = 0x0000;
        } else {
            self.cpu.apply_post_boot_state();
            self.bus.apply_post_boot_state();
        }
        self.ppu.reset(&mut self.bus, &mut self.clock);
        self.frames = 0;
        self.state = ConsoleState::Running;
        log::info!(
            "Console started at {:#06X} ({} mode)",
            self.cpu.pc,
            if self.bus.cgb_mode() { "CGB" } else { "DMG" }
        );
    }

    pub fn pause(&mut self) {
        if self.state == ConsoleState::Running {
            self.state = ConsoleState::Paused;
            log::info!("Console paused");
        }
    }

    pub fn resume(&mut self) {
        if self.state == ConsoleState::Paused {
            self.state = ConsoleState::Running;
            log::info!("Console resumed");
        }
    }

    pub fn stop(&mut self) {
        self.state = ConsoleState::Stopped;
        log::info!("Console stopped");
    }

    /// Zero the clock, CPU and register state. Memory contents, the
    /// cartridge and the boot ROM stay; call [`Console::start`] to run again.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.cpu.reset();
        self.bus.reset_registers();
        self.ppu.reset(&mut self.bus, &mut self.clock);
        self.frames = 0;
        self.state = ConsoleState::Idle;
        log::info!("Console reset");
    }

    /// Run until the clock passes one frame's worth of cycles. Returns
    /// `Ok(false)` without doing anything unless the console is running.
    pub fn run_frame(&mut self) -> Result<bool, EmuError> {
        if self.state != ConsoleState::Running {
            return Ok(false);
        }
        while !self.clock.frame_elapsed() {
            if let Err(err) = self.step_instruction() {
                self.state = ConsoleState::Faulted;
                log::error!("Emulation stopped: {err} ({})", self.cpu.debug_state());
                return Err(err);
            }
        }
        self.frame.copy_from_slice(self.ppu.frame());
        self.clock.wrap_frame();
        self.frames = self.frames.wrapping_add(1);
        Ok(true)
    }

    /// One CPU tick, then the timer and PPU catch up. Does not check the
    /// lifecycle state or the frame budget.
    pub fn step_instruction(&mut self) -> Result<u32, EmuError> {
        let cycles = self.cpu.tick(&mut self.bus, &mut self.clock)?;
        self.bus.step_timer(cycles);
        self.ppu.tick(&mut self.bus, &mut self.clock);
        Ok(cycles)
    }

    /// The last completed frame, RGBA32.
    pub fn frame_buffer(&self) -> &[u8] {
        &self.frame
    }

    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let memory = SAMPLE_REGIONS
            .iter()
            .map(|&(region, addr)| self.sample(region, addr))
            .chain([
                self.sample("pc", self.cpu.pc),
                self.sample("stack", self.cpu.sp),
            ])
            .collect();
        DebugSnapshot {
            a: self.cpu.a,
            b: self.cpu.b,
            c: self.cpu.c,
            d: self.cpu.d,
            e: self.cpu.e,
            h: self.cpu.h,
            l: self.cpu.l,
            flags: self.cpu.f,
            pc: self.cpu.pc,
            sp: self.cpu.sp,
            ime: self.cpu.ime,
            halted: self.cpu.halted,
            cycles: self.clock.get(),
            ppu_mode: self.ppu.mode(),
            ly: self.bus.lcd.ly,
            memory,
        }
    }

    fn sample(&self, region: &'static str, addr: u16) -> MemorySample {
        let bytes = (0..SAMPLE_LEN)
            .map_while(|i| addr.checked_add(i))
            .map(|a| self.bus.peek(a))
            .collect();
        MemorySample {
            region,
            addr,
            bytes,
        }
    }

    pub fn press(&mut self, button: Button) {
        if self.bus.press(button) {
            self.cpu.wake();
        }
    }

    pub fn release(&mut self, button: Button) {
        self.bus.release(button);
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.cpu.set_trace(enabled);
    }

    pub fn trace(&self) -> Vec<TraceEntry> {
        self.cpu.trace()
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.bus.cart.as_ref()
    }

    pub fn state(&self) -> ConsoleState {
        self.state
    }

    /// Frames completed since the last start or reset.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}
