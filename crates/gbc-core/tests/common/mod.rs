#![allow(dead_code)]

use gbc_core::Console;

pub const ROM_BANK: usize = 0x4000;

/// ROM image of `banks` 16 KiB banks with the given header type bytes.
pub fn rom_image(banks: usize, type_code: u8, ram_code: u8) -> Vec<u8> {
    let mut rom = vec![0u8; banks * ROM_BANK];
    rom[0x0147] = type_code;
    rom[0x0148] = banks.trailing_zeros().saturating_sub(1) as u8;
    rom[0x0149] = ram_code;
    rom
}

/// 32 KiB ROM-only image with each `(addr, code)` pair copied in.
pub fn program(parts: &[(usize, &[u8])]) -> Vec<u8> {
    let mut rom = rom_image(2, 0x00, 0x00);
    for &(addr, code) in parts {
        rom[addr..addr + code.len()].copy_from_slice(code);
    }
    rom
}

/// Console started without a boot ROM, so execution begins at 0x0100.
pub fn running_console(rom: Vec<u8>) -> Console {
    let mut console = Console::new();
    console
        .load_cartridge(rom)
        .expect("test ROM should load");
    console.start();
    console
}
