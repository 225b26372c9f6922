use crate::interrupts::Interrupt;

/// DIV/TIMA/TMA/TAC block.
#[derive(Debug, Clone, Default)]
pub struct Timer {
    /// 16-bit internal divider counter. DIV register is the upper 8 bits.
    pub div: u16,
    pub tima: u8,
    pub tma: u8,
    /// Low 3 bits only; reads fill the rest with 1s.
    pub tac: u8,
    last_signal: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => (self.div >> 8) as u8,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8, if_reg: &mut u8) {
        match addr {
            0xFF04 => self.set_div(0, if_reg),
            0xFF05 => self.tima = val,
            0xFF06 => self.tma = val,
            0xFF07 => {
                self.tac = val & 0x07;
                self.update_signal(if_reg);
            }
            _ => {}
        }
    }

    /// Advance by `cycles` clock cycles, requesting the timer interrupt on
    /// each TIMA overflow.
    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) {
        for _ in 0..cycles {
            self.div = self.div.wrapping_add(1);
            self.update_signal(if_reg);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn set_div(&mut self, div: u16, if_reg: &mut u8) {
        self.div = div;
        // Clearing the divider can itself produce a falling edge.
        self.update_signal(if_reg);
    }

    fn update_signal(&mut self, if_reg: &mut u8) {
        let signal = Self::signal(self.div, self.tac);
        if self.last_signal && !signal {
            self.increment(if_reg);
        }
        self.last_signal = signal;
    }

    fn increment(&mut self, if_reg: &mut u8) {
        let (tima, overflow) = self.tima.overflowing_add(1);
        if overflow {
            self.tima = self.tma;
            *if_reg |= Interrupt::Timer.mask();
        } else {
            self.tima = tima;
        }
    }

    fn signal(div: u16, tac: u8) -> bool {
        if tac & 0x04 == 0 {
            return false;
        }
        let bit = match tac & 0x03 {
            0x00 => 9,
            0x01 => 3,
            0x02 => 5,
            _ => 7,
        };
        (div >> bit) & 1 != 0
    }
}
