//! Running cycle counter shared by the CPU and PPU.

/// Cycles in one complete frame: 154 lines of 456 cycles.
pub const FRAME_CYCLES: u32 = 70_224;
pub const LINE_CYCLES: u32 = 456;

pub const OAM_CYCLES: u32 = 80;
pub const TRANSFER_CYCLES: u32 = 170;
pub const HBLANK_CYCLES: u32 = 206;
pub const VBLANK_LINE_CYCLES: u32 = LINE_CYCLES;

/// PPU modes in STAT encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    Oam = 2,
    Transfer = 3,
}

impl Mode {
    /// How long the PPU stays in this mode before the next transition.
    pub fn cycles(self) -> u32 {
        match self {
            Mode::Oam => OAM_CYCLES,
            Mode::Transfer => TRANSFER_CYCLES,
            Mode::HBlank => HBLANK_CYCLES,
            Mode::VBlank => VBLANK_LINE_CYCLES,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clock {
    cycles: u32,
    next_mode_at: u32,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            cycles: 0,
            next_mode_at: OAM_CYCLES,
        }
    }

    pub fn advance(&mut self, n: u32) {
        self.cycles = self.cycles.wrapping_add(n);
    }

    pub fn set(&mut self, n: u32) {
        self.cycles = n;
    }

    pub fn get(&self) -> u32 {
        self.cycles
    }

    /// Absolute cycle count of the next PPU mode transition.
    pub fn next_mode_at(&self) -> u32 {
        self.next_mode_at
    }

    /// Signed distance to the next mode transition; zero or negative means due.
    pub fn cycles_until_next_mode(&self) -> i64 {
        self.next_mode_at as i64 - self.cycles as i64
    }

    /// Push the transition deadline forward by the duration of `mode`.
    pub fn schedule(&mut self, mode: Mode) {
        self.next_mode_at = self.next_mode_at.wrapping_add(mode.cycles());
    }

    /// Restart mode timing at the current cycle, `mode` lasting its full length.
    pub fn resync(&mut self, mode: Mode) {
        self.next_mode_at = self.cycles.wrapping_add(mode.cycles());
    }

    pub fn frame_elapsed(&self) -> bool {
        self.cycles > FRAME_CYCLES
    }

    /// Reduce both counters modulo the frame length, keeping the overshoot.
    pub fn wrap_frame(&mut self) {
        self.cycles %= FRAME_CYCLES;
        self.next_mode_at %= FRAME_CYCLES;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
