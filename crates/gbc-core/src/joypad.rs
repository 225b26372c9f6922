#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    /// Bit in the combined state byte: directions low nibble, actions high.
    fn bit(self) -> u8 {
        match self {
            Button::Right => 0x01,
            Button::Left => 0x02,
            Button::Up => 0x04,
            Button::Down => 0x08,
            Button::A => 0x10,
            Button::B => 0x20,
            Button::Select => 0x40,
            Button::Start => 0x80,
        }
    }
}

/// P1 register plus the host-side button state.
#[derive(Debug, Clone, Default)]
pub struct Joypad {
    /// Upper nibble of P1 as last written; bits 4 and 5 select the lines.
    select: u8,
    /// 1 = pressed.
    pressed: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            pressed: 0,
        }
    }

    pub fn read(&self) -> u8 {
        self.select | (!self.lines() & 0x0F)
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0xF0;
    }

    /// Pressed buttons on the currently selected lines, active high.
    fn lines(&self) -> u8 {
        let mut lines = 0;
        if self.select & 0x10 == 0 {
            lines |= self.pressed & 0x0F;
        }
        if self.select & 0x20 == 0 {
            lines |= self.pressed >> 4;
        }
        lines
    }

    /// Returns true when the press pulled a selected line low, which is what
    /// raises the joypad interrupt.
    pub fn press(&mut self, button: Button) -> bool {
        let before = self.lines();
        self.pressed |= button.bit();
        self.lines() & !before != 0
    }

    pub fn release(&mut self, button: Button) {
        self.pressed &= !button.bit();
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed & button.bit() != 0
    }
}
