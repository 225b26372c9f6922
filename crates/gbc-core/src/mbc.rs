//! Memory bank controllers.
//!
//! A [`BankController`] owns only the bank-select registers. ROM and RAM
//! bytes stay in the [`Cartridge`](crate::cartridge::Cartridge) and are
//! passed in on every access, so the controller is a pure address
//! translator plus a small register file.

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

/// Controller family as declared by the cartridge header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcKind {
    RomOnly,
    Mbc1,
    Mbc3,
    Mbc30,
    Mbc5,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mbc1State {
    pub rom_bank: u8,
    pub ram_bank: u8,
    pub mode: u8,
    pub ram_enable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mbc3State {
    pub rom_bank: u8,
    pub ram_bank: u8,
    pub ram_enable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mbc5State {
    pub rom_bank: u16,
    pub ram_bank: u8,
    pub ram_enable: bool,
    pub rumble: bool,
    pub motor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankController {
    RomOnly,
    Mbc1(Mbc1State),
    Mbc3(Mbc3State),
    Mbc30(Mbc3State),
    Mbc5(Mbc5State),
}

fn rom_bank_count(rom: &[u8]) -> usize {
    (rom.len() / ROM_BANK_SIZE).max(1)
}

fn ram_bank_count(ram: &[u8]) -> usize {
    ram.len().div_ceil(RAM_BANK_SIZE)
}

impl BankController {
    pub fn new(kind: MbcKind, rumble: bool) -> Self {
        match kind {
            MbcKind::RomOnly => BankController::RomOnly,
            MbcKind::Mbc1 => BankController::Mbc1(Mbc1State {
                rom_bank: 1,
                ..Default::default()
            }),
            MbcKind::Mbc3 => BankController::Mbc3(Mbc3State {
                rom_bank: 1,
                ..Default::default()
            }),
            MbcKind::Mbc30 => BankController::Mbc30(Mbc3State {
                rom_bank: 1,
                ..Default::default()
            }),
            MbcKind::Mbc5 => BankController::Mbc5(Mbc5State {
                rom_bank: 1,
                rumble,
                ..Default::default()
            }),
        }
    }

    pub fn kind(&self) -> MbcKind {
        match self {
            BankController::RomOnly => MbcKind::RomOnly,
            BankController::Mbc1(_) => MbcKind::Mbc1,
            BankController::Mbc3(_) => MbcKind::Mbc3,
            BankController::Mbc30(_) => MbcKind::Mbc30,
            BankController::Mbc5(_) => MbcKind::Mbc5,
        }
    }

    /// Physical ROM offset a CPU address in 0x0000-0x7FFF resolves to.
    pub fn rom_offset(&self, rom: &[u8], addr: u16) -> usize {
        let banks = rom_bank_count(rom);
        let bank = match (self, addr) {
            (BankController::Mbc1(s), 0x0000..=0x3FFF) if s.mode == 1 => {
                ((s.ram_bank as usize & 0x03) << 5) % banks
            }
            (_, 0x0000..=0x3FFF) => 0,
            (BankController::RomOnly, _) => 1,
            (BankController::Mbc1(s), _) => {
                let mut bank = ((s.ram_bank as usize & 0x03) << 5) | (s.rom_bank as usize & 0x1F);
                if bank & 0x1F == 0 {
                    bank += 1;
                }
                bank % banks
            }
            (BankController::Mbc3(s), _) => (s.rom_bank as usize & 0x7F).max(1) % banks,
            (BankController::Mbc30(s), _) => (s.rom_bank as usize).max(1) % banks,
            (BankController::Mbc5(s), _) => (s.rom_bank as usize & 0x1FF) % banks,
        };
        bank * ROM_BANK_SIZE + (addr as usize & (ROM_BANK_SIZE - 1))
    }

    pub fn read_rom_bank00(&self, rom: &[u8], addr: u16) -> u8 {
        rom.get(self.rom_offset(rom, addr & 0x3FFF))
            .copied()
            .unwrap_or(0xFF)
    }

    pub fn read_rom_banknn(&self, rom: &[u8], addr: u16) -> u8 {
        rom.get(self.rom_offset(rom, 0x4000 | (addr & 0x3FFF)))
            .copied()
            .unwrap_or(0xFF)
    }

    /// Index into cartridge RAM for an address in 0xA000-0xBFFF, or `None`
    /// when the RAM is absent, disabled, or the selected bank is not RAM.
    fn ram_index(&self, ram: &[u8], addr: u16) -> Option<usize> {
        if ram.is_empty() {
            return None;
        }
        let banks = ram_bank_count(ram);
        let offset = addr as usize - 0xA000;
        let bank = match self {
            BankController::RomOnly => 0,
            BankController::Mbc1(s) => {
                if !s.ram_enable {
                    return None;
                }
                if s.mode == 1 {
                    s.ram_bank as usize & 0x03
                } else {
                    0
                }
            }
            BankController::Mbc3(s) => {
                if !s.ram_enable || s.ram_bank > 0x03 {
                    return None;
                }
                s.ram_bank as usize
            }
            BankController::Mbc30(s) => {
                if !s.ram_enable || s.ram_bank > 0x07 {
                    return None;
                }
                s.ram_bank as usize
            }
            BankController::Mbc5(s) => {
                if !s.ram_enable {
                    return None;
                }
                let mask = if s.rumble { 0x07 } else { 0x0F };
                s.ram_bank as usize & mask
            }
        };
        Some(((bank % banks) * RAM_BANK_SIZE + offset) % ram.len())
    }

    pub fn read_external_ram(&self, ram: &[u8], addr: u16) -> u8 {
        self.ram_index(ram, addr)
            .and_then(|i| ram.get(i).copied())
            .unwrap_or(0xFF)
    }

    pub fn write_ram(&self, ram: &mut [u8], addr: u16, value: u8) {
        if let Some(i) = self.ram_index(ram, addr)
            && let Some(b) = ram.get_mut(i)
        {
            *b = value;
        }
    }

    /// Register writes landing in 0x0000-0x3FFF.
    pub fn write_rom_bank00(&mut self, addr: u16, value: u8) {
        match (self, addr) {
            (BankController::RomOnly, _) => {}
            (BankController::Mbc1(s), 0x0000..=0x1FFF) => {
                s.ram_enable = value & 0x0F == 0x0A;
            }
            (BankController::Mbc1(s), _) => {
                s.rom_bank = (value & 0x1F).max(1);
                log::trace!("MBC1 ROM bank {:#04X}", s.rom_bank);
            }
            (BankController::Mbc3(s) | BankController::Mbc30(s), 0x0000..=0x1FFF) => {
                s.ram_enable = value & 0x0F == 0x0A;
            }
            (BankController::Mbc3(s), _) => {
                s.rom_bank = (value & 0x7F).max(1);
                log::trace!("MBC3 ROM bank {:#04X}", s.rom_bank);
            }
            (BankController::Mbc30(s), _) => {
                s.rom_bank = value.max(1);
                log::trace!("MBC30 ROM bank {:#04X}", s.rom_bank);
            }
            (BankController::Mbc5(s), 0x0000..=0x1FFF) => {
                s.ram_enable = value & 0x0F == 0x0A;
            }
            (BankController::Mbc5(s), 0x2000..=0x2FFF) => {
                s.rom_bank = (s.rom_bank & 0x100) | value as u16;
                log::trace!("MBC5 ROM bank {:#05X}", s.rom_bank);
            }
            (BankController::Mbc5(s), _) => {
                s.rom_bank = (s.rom_bank & 0xFF) | (((value & 0x01) as u16) << 8);
                log::trace!("MBC5 ROM bank {:#05X}", s.rom_bank);
            }
        }
    }

    /// Register writes landing in 0x4000-0x7FFF.
    pub fn write_rom_banknn(&mut self, addr: u16, value: u8) {
        match (self, addr) {
            (BankController::RomOnly, _) => {}
            (BankController::Mbc1(s), 0x4000..=0x5FFF) => s.ram_bank = value & 0x03,
            (BankController::Mbc1(s), _) => s.mode = value & 0x01,
            (BankController::Mbc3(s) | BankController::Mbc30(s), 0x4000..=0x5FFF) => {
                s.ram_bank = value & 0x0F;
                if (0x08..=0x0C).contains(&s.ram_bank) {
                    log::warn!("RTC register {:#04X} selected; RTC is not emulated", value);
                }
            }
            // RTC latch; there is no clock to latch.
            (BankController::Mbc3(_) | BankController::Mbc30(_), _) => {}
            (BankController::Mbc5(s), 0x4000..=0x5FFF) => {
                if s.rumble {
                    s.motor = value & 0x08 != 0;
                    s.ram_bank = value & 0x07;
                } else {
                    s.ram_bank = value & 0x0F;
                }
            }
            (BankController::Mbc5(_), _) => {}
        }
    }
}
