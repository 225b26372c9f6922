use std::{fs, io, path::Path};

use crate::error::LoadError;
use crate::mbc::{BankController, MbcKind};

const HEADER_END: usize = 0x0150;

const NINTENDO_LOGO: [u8; 0x30] = [
    0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C, 0x00, 0x0D,
    0x00, 0x08, 0x11, 0x1F, 0x88, 0x89, 0x00, 0x0E, 0xDC, 0xCC, 0x6E, 0xE6, 0xDD, 0xDD, 0xD9, 0x99,
    0xBB, 0xBB, 0x67, 0x63, 0x6E, 0x0E, 0xEC, 0xCC, 0xDD, 0xDC, 0x99, 0x9F, 0xBB, 0xB9, 0x33, 0x3E,
];

/// Hardware the cartridge type byte declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartFeatures {
    pub mbc: MbcKind,
    pub ram: bool,
    pub battery: bool,
    pub timer: bool,
    pub rumble: bool,
}

impl CartFeatures {
    const fn new(mbc: MbcKind, ram: bool, battery: bool, timer: bool, rumble: bool) -> Self {
        Self {
            mbc,
            ram,
            battery,
            timer,
            rumble,
        }
    }

    /// Maps the header type byte at 0x0147, with the ROM and RAM size codes
    /// at 0x0148/0x0149. `None` means the cartridge uses hardware this core
    /// does not emulate.
    pub fn from_type_code(code: u8, rom_code: u8, ram_code: u8) -> Option<Self> {
        use MbcKind::*;
        let features = match code {
            0x00 => Self::new(RomOnly, false, false, false, false),
            0x01 => Self::new(Mbc1, false, false, false, false),
            0x02 => Self::new(Mbc1, true, false, false, false),
            0x03 => Self::new(Mbc1, true, true, false, false),
            0x08 => Self::new(RomOnly, true, false, false, false),
            0x09 => Self::new(RomOnly, true, true, false, false),
            0x0F => Self::new(Mbc3, false, true, true, false),
            0x10 => Self::new(Mbc3, true, true, true, false),
            0x11 => Self::new(Mbc3, false, false, false, false),
            0x12 => Self::new(Mbc3, true, false, false, false),
            0x13 => Self::new(Mbc3, true, true, false, false),
            0x19 => Self::new(Mbc5, false, false, false, false),
            0x1A => Self::new(Mbc5, true, false, false, false),
            0x1B => Self::new(Mbc5, true, true, false, false),
            0x1C => Self::new(Mbc5, false, false, false, true),
            0x1D => Self::new(Mbc5, true, false, false, true),
            0x1E => Self::new(Mbc5, true, true, false, true),
            _ => return None,
        };
        // MBC30 shares the MBC3 type codes; 64 KiB of RAM or more than
        // 2 MiB of ROM gives it away.
        if features.mbc == Mbc3 && (ram_code == 0x05 || rom_code > 0x06) {
            return Some(Self { mbc: Mbc30, ..features });
        }
        Some(features)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    DmgOnly,
    CgbEnhanced,
    CgbOnly,
}

impl Compatibility {
    pub fn supports_cgb(self) -> bool {
        !matches!(self, Compatibility::DmgOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Japan,
    Overseas,
}

/// Metadata derived from the header once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeInfo {
    pub title: String,
    pub type_code: u8,
    pub features: CartFeatures,
    pub rom_size_code: u8,
    pub ram_banks: usize,
    pub compatibility: Compatibility,
    pub sgb: bool,
    pub destination: Destination,
    pub licensee: String,
    pub version: u8,
    pub logo_valid: bool,
    pub header_checksum_valid: bool,
    pub global_checksum_valid: bool,
}

#[derive(Debug, Clone)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub info: CartridgeInfo,
    pub controller: BankController,
}

impl Cartridge {
    pub fn load(data: Vec<u8>) -> Result<Self, LoadError> {
        let header = Header::parse(&data)?;
        let info = header.info()?;
        let ram = vec![0; info.ram_banks * 0x2000];
        let controller = BankController::new(info.features.mbc, info.features.rumble);

        if !info.header_checksum_valid {
            log::warn!("Header checksum mismatch for \"{}\"", info.title);
        }
        log::info!(
            "Loaded ROM: {} (MBC: {:?}, {} ROM bytes, {} RAM banks, CGB: {:?})",
            info.title,
            info.features.mbc,
            data.len(),
            info.ram_banks,
            info.compatibility
        );

        Ok(Self {
            rom: data,
            ram,
            info,
            controller,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let data = fs::read(path)?;
        Self::load(data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn mbc(&self) -> MbcKind {
        self.controller.kind()
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => self.controller.read_rom_bank00(&self.rom, addr),
            0x4000..=0x7FFF => self.controller.read_rom_banknn(&self.rom, addr),
            0xA000..=0xBFFF => self.controller.read_external_ram(&self.ram, addr),
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x3FFF => self.controller.write_rom_bank00(addr, val),
            0x4000..=0x7FFF => self.controller.write_rom_banknn(addr, val),
            0xA000..=0xBFFF => self.controller.write_ram(&mut self.ram, addr, val),
            _ => {}
        }
    }

    /// Physical ROM offset for `addr`, when that offset exists in the image.
    pub fn rom_offset_checked(&self, addr: u16) -> Result<usize, usize> {
        let offset = self.controller.rom_offset(&self.rom, addr);
        if offset < self.rom.len() {
            Ok(offset)
        } else {
            Err(offset)
        }
    }
}

struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(data: &'a [u8]) -> Result<Self, LoadError> {
        if data.len() < HEADER_END {
            return Err(LoadError::TooSmall(data.len()));
        }
        Ok(Self { data })
    }

    fn info(&self) -> Result<CartridgeInfo, LoadError> {
        let type_code = self.data[0x0147];
        let rom_code = self.data[0x0148];
        let ram_code = self.data[0x0149];
        let features = CartFeatures::from_type_code(type_code, rom_code, ram_code)
            .ok_or(LoadError::UnsupportedCartridge(type_code))?;
        let ram_banks = if features.ram {
            ram_bank_count(ram_code)
        } else {
            0
        };

        Ok(CartridgeInfo {
            title: self.title(),
            type_code,
            features,
            rom_size_code: rom_code,
            ram_banks,
            compatibility: self.compatibility(),
            sgb: self.data[0x0146] == 0x03 && self.data[0x014B] == 0x33,
            destination: if self.data[0x014A] == 0x00 {
                Destination::Japan
            } else {
                Destination::Overseas
            },
            licensee: self.licensee(),
            version: self.data[0x014C],
            logo_valid: self.data[0x0104..0x0134] == NINTENDO_LOGO,
            header_checksum_valid: self.header_checksum() == self.data[0x014D],
            global_checksum_valid: self.global_checksum()
                == u16::from_be_bytes([self.data[0x014E], self.data[0x014F]]),
        })
    }

    fn compatibility(&self) -> Compatibility {
        match self.data[0x0143] {
            0xC0 => Compatibility::CgbOnly,
            0x80 => Compatibility::CgbEnhanced,
            _ => Compatibility::DmgOnly,
        }
    }

    fn title(&self) -> String {
        // Color titles are shortened to make room for the manufacturer code.
        let end = if self.compatibility().supports_cgb() {
            0x013F
        } else {
            0x0143
        };
        let bytes: Vec<u8> = self.data[0x0134..end]
            .iter()
            .copied()
            .filter(|&b| b != 0)
            .collect();
        String::from_utf8_lossy(&bytes).trim().to_string()
    }

    fn licensee(&self) -> String {
        let old = self.data[0x014B];
        let name = if old == 0x33 {
            let code = [self.data[0x0144], self.data[0x0145]];
            std::str::from_utf8(&code).ok().and_then(new_licensee)
        } else {
            old_licensee(old)
        };
        name.map(str::to_string)
            .unwrap_or_else(|| format!("Unknown ({:02X})", old))
    }

    fn header_checksum(&self) -> u8 {
        self.data[0x0134..0x014D]
            .iter()
            .fold(0u8, |sum, &b| sum.wrapping_sub(b).wrapping_sub(1))
    }

    fn global_checksum(&self) -> u16 {
        self.data
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != 0x014E && i != 0x014F)
            .fold(0u16, |sum, (_, &b)| sum.wrapping_add(b as u16))
    }
}

fn ram_bank_count(ram_code: u8) -> usize {
    match ram_code {
        0x02 => 1,
        0x03 => 4,
        0x04 => 16,
        0x05 => 8,
        _ => 0,
    }
}

fn new_licensee(code: &str) -> Option<&'static str> {
    Some(match code {
        "00" => "None",
        "01" => "Nintendo R&D1",
        "08" => "Capcom",
        "13" => "Electronic Arts",
        "18" => "Hudson Soft",
        "19" => "b-ai",
        "20" => "KSS",
        "22" => "POW",
        "24" => "PCM Complete",
        "25" => "San-X",
        "28" => "Kemco Japan",
        "29" => "Seta",
        "30" => "Viacom",
        "31" => "Nintendo",
        "32" => "Bandai",
        "33" => "Ocean/Acclaim",
        "34" => "Konami",
        "35" => "Hector",
        "37" => "Taito",
        "38" => "Hudson",
        "39" => "Banpresto",
        "41" => "Ubisoft",
        "42" => "Atlus",
        "44" => "Malibu",
        "46" => "Angel",
        "47" => "Bullet-Proof",
        "49" => "Irem",
        "50" => "Absolute",
        "51" => "Acclaim",
        "52" => "Activision",
        "53" => "American Sammy",
        "54" => "Konami",
        "55" => "Hi Tech Entertainment",
        "56" => "LJN",
        "57" => "Matchbox",
        "58" => "Mattel",
        "59" => "Milton Bradley",
        "60" => "Titus",
        "61" => "Virgin",
        "64" => "LucasArts",
        "67" => "Ocean",
        "69" => "Electronic Arts",
        "70" => "Infogrames",
        "71" => "Interplay",
        "72" => "Broderbund",
        "73" => "Sculptured",
        "75" => "SCi",
        "78" => "THQ",
        "79" => "Accolade",
        "80" => "Misawa",
        "83" => "Lozc",
        "86" => "Tokuma Shoten Intermedia",
        "87" => "Tsukuda Original",
        "91" => "Chunsoft",
        "92" => "Video System",
        "93" => "Ocean/Acclaim",
        "95" => "Varie",
        "96" => "Yonezawa/S'pal",
        "97" => "Kaneko",
        "99" => "Pack-In-Soft",
        "A4" => "Konami (Yu-Gi-Oh!)",
        _ => return None,
    })
}

fn old_licensee(code: u8) -> Option<&'static str> {
    Some(match code {
        0x00 => "None",
        0x01 => "Nintendo R&D1",
        0x08 => "Capcom",
        0x09 => "Hot B",
        0x0A => "Jaleco",
        0x0B => "Coconuts",
        0x0C => "Elite Systems",
        0x13 => "Electronic Arts",
        0x18 => "Hudson Soft",
        0x19 => "ITC Entertainment",
        0x1A => "Yanoman",
        0x1D => "Clary",
        0x1F => "Virgin",
        0x24 => "PCM Complete",
        0x25 => "San-X",
        0x28 => "Kotobuki Systems",
        0x29 => "Seta",
        0x30 => "Infogrames",
        0x31 => "Nintendo",
        0x32 => "Bandai",
        0x34 => "Konami",
        0x35 => "Hector",
        0x38 => "Capcom",
        0x39 => "Banpresto",
        0x3C => "Entertainment i",
        0x3E => "Gremlin",
        0x41 => "Ubisoft",
        0x42 => "Atlus",
        0x44 | 0x4D => "Malibu",
        0x46 => "Angel",
        0x47 => "Spectrum Holoby",
        0x49 => "Irem",
        0x4A => "Virgin",
        0x4F => "U.S. Gold",
        0x50 => "Absolute",
        0x51 => "Acclaim",
        0x52 => "Activision",
        0x53 => "American Sammy",
        0x54 => "GameTek",
        0x55 => "Park Place",
        0x56 => "LJN",
        0x57 => "Matchbox",
        0x59 => "Milton Bradley",
        0x5A => "Mindscape",
        0x5B => "Romstar",
        0x5C => "Naxat Soft",
        0x5D => "Tradewest",
        0x60 => "Titus",
        0x61 => "Virgin",
        0x67 => "Ocean",
        0x69 => "Electronic Arts",
        0x6E => "Elite Systems",
        0x6F => "Electro Brain",
        0x70 => "Infogrames",
        0x71 => "Interplay",
        0x72 => "Broderbund",
        0x73 => "Sculptered Soft",
        0x75 => "The Sales Curve",
        0x78 => "THQ",
        0x79 => "Accolade",
        0x7A => "Triffix Entertainment",
        0x7C => "Microprose",
        0x7F => "Kemco",
        0x80 => "Misawa Entertainment",
        0x83 => "Lozc",
        0x86 => "Tokuma Shoten Intermedia",
        0x8B => "Bullet-Proof Software",
        0x8C => "Vic Tokai",
        0x8E => "Ape",
        0x8F => "I'Max",
        0x91 => "Chunsoft",
        0x92 => "Video System",
        0x93 => "Tsubaraya Productions",
        0x95 => "Varie",
        0x96 => "Yonezawa/S'pal",
        0x97 => "Kaneko",
        0x99 => "Arc",
        0x9A => "Nihon Bussan",
        0x9B => "Tecmo",
        0x9C => "Imagineer",
        0x9D => "Banpresto",
        0x9F => "Nova",
        0xA1 => "Hori Electric",
        0xA2 => "Bandai",
        0xA4 => "Konami",
        0xA6 => "Kawada",
        0xA7 => "Takara",
        0xA9 => "Technos Japan",
        0xAA => "Broderbund",
        0xAC => "Toei Animation",
        0xAD => "Toho",
        0xAF => "Namco",
        0xB0 => "Acclaim",
        0xB1 => "ASCII or Nexsoft",
        0xB2 => "Bandai",
        0xB4 => "Square Enix",
        0xB6 => "HAL Laboratory",
        0xB7 => "SNK",
        0xB9 => "Pony Canyon",
        0xBA => "Culture Brain",
        0xBB => "Sunsoft",
        0xBD => "Sony Imagesoft",
        0xBF => "Sammy",
        0xC0 => "Taito",
        0xC2 => "Kemco",
        0xC3 => "Square",
        0xC4 => "Tokuma Shoten Intermedia",
        0xC5 => "Data East",
        0xC6 => "Tonkin House",
        0xC8 => "Koei",
        0xC9 => "UFL",
        0xCA => "Ultra",
        0xCB => "Vap",
        0xCC => "Use",
        0xCD => "Meldac",
        0xCE => "Pony Canyon",
        0xCF => "Angel",
        0xD0 => "Taito",
        0xD1 => "Sofel",
        0xD2 => "Quest",
        0xD3 => "Sigma Enterprises",
        0xD4 => "ASK Kodansha",
        0xD6 => "Naxat Soft",
        0xD7 => "Copya System",
        0xD9 => "Banpresto",
        0xDA => "Tomy",
        0xDB => "LJN",
        0xDD => "NCS",
        0xDE => "Human",
        0xDF => "Altron",
        0xE0 => "Jaleco",
        0xE1 => "Towa Chiki",
        0xE2 => "Yutaka",
        0xE3 => "Varie",
        0xE5 => "Epoch",
        0xE7 => "Athena",
        0xE8 => "Asmik",
        0xE9 => "Natsume",
        0xEA => "King Records",
        0xEB => "Atlus",
        0xEC => "Epic/Sony Records",
        0xEE => "IGS",
        0xF0 => "A Wave",
        0xF3 => "Extreme Entertainment",
        0xFF => "LJN",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(type_code: u8, ram_code: u8) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0134..0x0139].copy_from_slice(b"TETRA");
        rom[0x0147] = type_code;
        rom[0x0149] = ram_code;
        rom
    }

    #[test]
    fn header_checksum_matches_known_value() {
        let mut rom = header(0x00, 0x00);
        let sum = Header::parse(&rom).unwrap().header_checksum();
        rom[0x014D] = sum;
        let cart = Cartridge::load(rom).unwrap();
        assert!(cart.info.header_checksum_valid);
    }

    #[test]
    fn header_checksum_of_blank_header() {
        let rom = vec![0u8; 0x150];
        // 25 bytes, each contributing -1.
        assert_eq!(Header::parse(&rom).unwrap().header_checksum(), 0xE7);
    }

    #[test]
    fn title_skips_nul_padding() {
        let cart = Cartridge::load(header(0x00, 0x00)).unwrap();
        assert_eq!(cart.title(), "TETRA");
    }

    #[test]
    fn cgb_title_stops_before_manufacturer_code() {
        let mut rom = header(0x00, 0x00);
        rom[0x0134..0x0143].copy_from_slice(b"ABCDEFGHIJKLMNO");
        rom[0x0143] = 0x80;
        let cart = Cartridge::load(rom).unwrap();
        assert_eq!(cart.title(), "ABCDEFGHIJK");
        assert_eq!(cart.info.compatibility, Compatibility::CgbEnhanced);
    }

    #[test]
    fn ram_banks_follow_ram_code() {
        let cart = Cartridge::load(header(0x03, 0x03)).unwrap();
        assert_eq!(cart.info.ram_banks, 4);
        assert_eq!(cart.ram.len(), 0x8000);
        let cart = Cartridge::load(header(0x01, 0x03)).unwrap();
        assert_eq!(cart.info.ram_banks, 0);
    }

    #[test]
    fn licensee_lookup() {
        let mut rom = header(0x00, 0x00);
        rom[0x014B] = 0x33;
        rom[0x0144] = b'0';
        rom[0x0145] = b'1';
        assert_eq!(Cartridge::load(rom).unwrap().info.licensee, "Nintendo R&D1");
        let mut rom = header(0x00, 0x00);
        rom[0x014B] = 0xAF;
        assert_eq!(Cartridge::load(rom).unwrap().info.licensee, "Namco");
    }

    #[test]
    fn logo_check() {
        let mut rom = header(0x00, 0x00);
        assert!(!Cartridge::load(rom.clone()).unwrap().info.logo_valid);
        rom[0x0104..0x0134].copy_from_slice(&NINTENDO_LOGO);
        assert!(Cartridge::load(rom).unwrap().info.logo_valid);
    }
}
