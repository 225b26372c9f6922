use crate::{
    cartridge::Cartridge,
    clock::Mode,
    error::{AddressError, LoadError},
    interrupts::Interrupt,
    joypad::{Button, Joypad},
    ppu::LcdRegisters,
    timer::Timer,
};

const VRAM_BANK_SIZE: usize = 0x2000;
const WRAM_BANK_SIZE: usize = 0x1000;
pub const OAM_SIZE: usize = 0xA0;

/// Largest boot image accepted: the CGB boot ROM with its header gap.
pub const MAX_BOOT_ROM_SIZE: usize = 0x900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootKind {
    Dmg,
    Cgb,
}

#[derive(Debug, Clone)]
pub struct BootRom {
    data: Vec<u8>,
    kind: BootKind,
}

impl BootRom {
    /// Images up to 256 bytes are taken to be DMG boot ROMs, anything larger
    /// a CGB one.
    pub fn new(data: Vec<u8>) -> Result<Self, LoadError> {
        if data.is_empty() || data.len() > MAX_BOOT_ROM_SIZE {
            return Err(LoadError::BootRom(data.len()));
        }
        let kind = if data.len() <= 0x100 {
            BootKind::Dmg
        } else {
            BootKind::Cgb
        };
        Ok(Self { data, kind })
    }

    pub fn kind(&self) -> BootKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn byte(&self, addr: u16) -> Option<u8> {
        match addr {
            0x0000..=0x00FF | 0x0200..=0x08FF => self.data.get(addr as usize).copied(),
            _ => None,
        }
    }
}

/// The 16-bit address space and every register behind it.
pub struct Bus {
    pub vram: [[u8; VRAM_BANK_SIZE]; 2],
    pub wram: [[u8; WRAM_BANK_SIZE]; 8],
    pub oam: [u8; OAM_SIZE],
    pub hram: [u8; 0x7F],
    /// Backing store for I/O addresses without dedicated behaviour.
    io: [u8; 0x80],
    wave: [u8; 0x10],
    pub cart: Option<Cartridge>,
    boot_rom: Option<BootRom>,
    boot_active: bool,
    pub lcd: LcdRegisters,
    pub timer: Timer,
    pub joypad: Joypad,
    if_reg: u8,
    ie_reg: u8,
    vbk: u8,
    svbk: u8,
    brd: u8,
    cgb_mode: bool,
}

impl Bus {
    pub fn new(cgb: bool) -> Self {
        Self {
            vram: [[0; VRAM_BANK_SIZE]; 2],
            wram: [[0; WRAM_BANK_SIZE]; 8],
            oam: [0; OAM_SIZE],
            hram: [0; 0x7F],
            io: [0; 0x80],
            wave: [0; 0x10],
            cart: None,
            boot_rom: None,
            boot_active: false,
            lcd: LcdRegisters::default(),
            timer: Timer::new(),
            joypad: Joypad::new(),
            if_reg: 0xE0,
            ie_reg: 0,
            vbk: 0,
            svbk: 1,
            brd: 0,
            cgb_mode: cgb,
        }
    }

    pub fn cgb_mode(&self) -> bool {
        self.cgb_mode
    }

    pub fn set_cgb_mode(&mut self, cgb: bool) {
        self.cgb_mode = cgb;
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    pub fn load_boot_rom(&mut self, boot: BootRom) {
        self.boot_rom = Some(boot);
        self.boot_active = true;
        self.brd = 0;
    }

    pub fn boot_rom(&self) -> Option<&BootRom> {
        self.boot_rom.as_ref()
    }

    pub fn boot_active(&self) -> bool {
        self.boot_active
    }

    /// Re-arm the boot overlay after a reset, if a boot ROM is loaded.
    pub fn rearm_boot_rom(&mut self) {
        self.boot_active = self.boot_rom.is_some();
        self.brd = 0;
    }

    /// I/O state the boot ROM leaves behind, for starting straight at 0x0100.
    pub fn apply_post_boot_state(&mut self) {
        self.lcd = LcdRegisters::post_boot();
        self.timer.div = 0xABCC;
        self.if_reg = 0xE1;
        self.ie_reg = 0;
        self.joypad.write(0xCF);
        self.boot_active = false;
    }

    /// Zero register state without touching the memory arrays.
    pub fn reset_registers(&mut self) {
        self.io = [0; 0x80];
        self.lcd = LcdRegisters::default();
        self.timer.reset();
        self.joypad = Joypad::new();
        self.if_reg = 0xE0;
        self.ie_reg = 0;
        self.vbk = 0;
        self.svbk = 1;
        if let Some(cart) = self.cart.as_mut() {
            cart.controller = crate::mbc::BankController::new(
                cart.info.features.mbc,
                cart.info.features.rumble,
            );
        }
        self.rearm_boot_rom();
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        if self.boot_active && addr == 0x0100 {
            self.boot_active = false;
            log::debug!("Boot ROM overlay released at 0x0100");
        }
        self.peek(addr)
    }

    /// Side-effect free read, for debuggers and DMA.
    pub fn peek(&self, addr: u16) -> u8 {
        if self.boot_active
            && let Some(b) = self.boot_rom.as_ref().and_then(|boot| boot.byte(addr))
        {
            return b;
        }

        match addr {
            0x0000..=0x7FFF => self.cart.as_ref().map(|c| c.read(addr)).unwrap_or(0xFF),
            0x8000..=0x9FFF => self.vram[self.vram_bank()][(addr - 0x8000) as usize],
            0xA000..=0xBFFF => self.cart.as_ref().map(|c| c.read(addr)).unwrap_or(0xFF),
            0xC000..=0xDFFF => self.read_wram(addr),
            0xE000..=0xFDFF => self.read_wram(addr - 0x2000),
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize],
            0xFEA0..=0xFEFF => ((addr as u8) >> 4) * 0x11,
            0xFF00..=0xFF7F => self.read_io(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie_reg | 0xE0,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write(addr, val);
                }
            }
            0x8000..=0x9FFF => {
                let bank = self.vram_bank();
                self.vram[bank][(addr - 0x8000) as usize] = val;
            }
            0xC000..=0xDFFF => self.write_wram(addr, val),
            0xE000..=0xFDFF => self.write_wram(addr - 0x2000, val),
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize] = val,
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F => self.write_io(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ie_reg = val & 0x1F,
        }
    }

    /// Read for addresses computed outside the CPU, which may not fit 16 bits.
    pub fn try_read(&mut self, addr: u32) -> Result<u8, AddressError> {
        let addr = u16::try_from(addr).map_err(|_| AddressError::OutOfRange(addr))?;
        Ok(self.read(addr))
    }

    pub fn try_write(&mut self, addr: u32, val: u8) -> Result<(), AddressError> {
        let addr = u16::try_from(addr).map_err(|_| AddressError::OutOfRange(addr))?;
        self.write(addr, val);
        Ok(())
    }

    /// Read of an instruction byte. Cartridge addresses must resolve to a
    /// byte that exists in the ROM image.
    pub fn fetch(&mut self, pc: u16) -> Result<u8, AddressError> {
        let from_boot = self.boot_active
            && pc != 0x0100
            && self.boot_rom.as_ref().and_then(|b| b.byte(pc)).is_some();
        if pc < 0x8000 && !from_boot {
            match self.cart.as_ref() {
                Some(cart) => {
                    cart.rom_offset_checked(pc)
                        .map_err(|offset| AddressError::FetchBeyondRom { pc, offset })?;
                }
                None => {
                    return Err(AddressError::FetchBeyondRom {
                        pc,
                        offset: pc as usize,
                    });
                }
            }
        }
        Ok(self.read(pc))
    }

    pub fn if_reg(&self) -> u8 {
        self.if_reg
    }

    pub fn ie(&self) -> u8 {
        self.ie_reg
    }

    pub fn request_interrupt(&mut self, interrupt: Interrupt) {
        self.if_reg |= interrupt.mask();
    }

    pub fn clear_interrupt(&mut self, interrupt: Interrupt) {
        self.if_reg &= !interrupt.mask();
    }

    pub fn step_timer(&mut self, cycles: u32) {
        self.timer.step(cycles, &mut self.if_reg);
    }

    /// Returns true when the press should wake the CPU from STOP.
    pub fn press(&mut self, button: Button) -> bool {
        if self.joypad.press(button) {
            self.request_interrupt(Interrupt::Joypad);
            return true;
        }
        false
    }

    pub fn release(&mut self, button: Button) {
        self.joypad.release(button);
    }

    pub fn vram_bank(&self) -> usize {
        if self.cgb_mode {
            (self.vbk & 0x01) as usize
        } else {
            0
        }
    }

    pub fn wram_bank(&self) -> usize {
        if self.cgb_mode {
            (self.svbk as usize & 0x07).max(1)
        } else {
            1
        }
    }

    pub fn set_ly(&mut self, ly: u8) {
        self.lcd.ly = ly;
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.lcd.stat = (self.lcd.stat & !0x03) | mode.bits();
    }

    fn read_wram(&self, addr: u16) -> u8 {
        match addr {
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize],
            _ => self.wram[self.wram_bank()][(addr - 0xD000) as usize],
        }
    }

    fn write_wram(&mut self, addr: u16, val: u8) {
        match addr {
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize] = val,
            _ => {
                let bank = self.wram_bank();
                self.wram[bank][(addr - 0xD000) as usize] = val;
            }
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            0xFF00 => self.joypad.read(),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg | 0xE0,
            0xFF30..=0xFF3F => self.wave[(addr - 0xFF30) as usize],
            0xFF40..=0xFF4B => self.lcd.read(addr),
            0xFF4F => {
                if self.cgb_mode {
                    0xFE | self.vbk
                } else {
                    0xFF
                }
            }
            0xFF50 => 0xFE | (self.brd & 0x01),
            0xFF70 => {
                if self.cgb_mode {
                    0xF8 | self.svbk
                } else {
                    0xFF
                }
            }
            // SB/SC and sound registers are plain storage.
            _ => self.io[(addr & 0x7F) as usize],
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF00 => self.joypad.write(val),
            0xFF04..=0xFF07 => self.timer.write(addr, val, &mut self.if_reg),
            0xFF0F => self.if_reg = val | 0xE0,
            0xFF30..=0xFF3F => self.wave[(addr - 0xFF30) as usize] = val,
            0xFF40 => {
                let was_on = self.lcd.enabled();
                self.lcd.lcdc = val;
                if was_on && !self.lcd.enabled() {
                    self.lcd.ly = 0;
                    self.set_mode(Mode::HBlank);
                    log::debug!("LCD switched off");
                }
            }
            0xFF46 => self.oam_dma(val),
            0xFF41..=0xFF4B => self.lcd.write(addr, val),
            0xFF4F => {
                if self.cgb_mode {
                    self.vbk = val & 0x01;
                }
            }
            0xFF50 => {
                if val != 0 && self.boot_active {
                    self.boot_active = false;
                    log::debug!("Boot ROM disabled through BRD");
                }
                self.brd |= val & 0x01;
            }
            0xFF70 => {
                if self.cgb_mode {
                    self.svbk = val & 0x07;
                }
            }
            _ => self.io[(addr & 0x7F) as usize] = val,
        }
    }

    /// OAM DMA, completed immediately.
    fn oam_dma(&mut self, page: u8) {
        self.lcd.dma = page;
        let base = (page as u16) << 8;
        for i in 0..OAM_SIZE as u16 {
            self.oam[i as usize] = self.peek(base.wrapping_add(i));
        }
        log::trace!("OAM DMA from {:#06X}", base);
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(false)
    }
}
