mod common;

use std::fs;

use common::rom_image;
use gbc_core::cartridge::{Cartridge, Compatibility};
use gbc_core::mbc::MbcKind;
use gbc_core::{Console, LoadError};
use tempfile::tempdir;

#[test]
fn loads_from_file() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("game.gb");

    let mut rom = rom_image(2, 0x03, 0x03); // MBC1 + RAM + Battery, 32KB RAM
    rom[0x0134..0x0138].copy_from_slice(b"TEST");
    rom[0x0143] = 0x80;
    fs::write(&rom_path, &rom).unwrap();

    let cart = Cartridge::from_file(&rom_path).unwrap();
    assert_eq!(cart.title(), "TEST");
    assert_eq!(cart.mbc(), MbcKind::Mbc1);
    assert_eq!(cart.ram.len(), 0x8000);
    assert!(cart.info.features.battery);
    assert_eq!(cart.info.compatibility, Compatibility::CgbEnhanced);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    assert!(Cartridge::from_file(dir.path().join("absent.gb")).is_err());
}

#[test]
fn mbc30_header_detection() {
    let rom = rom_image(2, 0x13, 0x05); // MBC3 + RAM + Battery, 64KB RAM
    let cart = Cartridge::load(rom).unwrap();
    assert_eq!(cart.mbc(), MbcKind::Mbc30);
    assert_eq!(cart.ram.len(), 0x10000);
}

#[test]
fn mbc30_large_rom_detection() {
    // 4 MiB ROM with 32 KiB of RAM: only the ROM size marks it as MBC30.
    let mut rom = rom_image(256, 0x13, 0x03);
    rom[0x90 * 0x4000] = 0x90;
    rom[0x10 * 0x4000] = 0x10;
    let mut cart = Cartridge::load(rom).unwrap();
    assert_eq!(cart.mbc(), MbcKind::Mbc30);

    cart.write(0x2000, 0x90);
    assert_eq!(cart.read(0x4000), 0x90);
}

#[test]
fn controller_follows_type_byte() {
    for (code, kind) in [
        (0x00, MbcKind::RomOnly),
        (0x01, MbcKind::Mbc1),
        (0x11, MbcKind::Mbc3),
        (0x19, MbcKind::Mbc5),
        (0x1E, MbcKind::Mbc5),
    ] {
        let cart = Cartridge::load(rom_image(2, code, 0x00)).unwrap();
        assert_eq!(cart.mbc(), kind, "type {code:#04X}");
    }
}

#[test]
fn unsupported_cartridge_is_rejected() {
    // HuC1 is not emulated.
    let rom = rom_image(2, 0xFF, 0x00);
    assert_eq!(
        Cartridge::load(rom).unwrap_err(),
        LoadError::UnsupportedCartridge(0xFF)
    );

    let mut console = Console::new();
    assert_eq!(
        console.load_cartridge(vec![0; 0x100]),
        Err(LoadError::TooSmall(0x100))
    );
    assert!(console.cartridge().is_none());
}

#[test]
fn mbc5_nine_bit_bank() {
    let mut rom = rom_image(512, 0x19, 0x00);
    rom[0x100 * 0x4000 + 0x10] = 0x5A;
    let mut cart = Cartridge::load(rom).unwrap();
    cart.write(0x2000, 0x00);
    cart.write(0x3000, 0x01);
    assert_eq!(cart.read(0x4010), 0x5A);
}

#[test]
fn color_mode_follows_cartridge_flag() {
    let mut rom = rom_image(2, 0x00, 0x00);
    rom[0x0143] = 0xC0;
    let mut console = Console::new();
    console.load_cartridge(rom).unwrap();
    assert!(console.bus().cgb_mode());
    assert_eq!(
        console.cartridge().map(|c| c.info.compatibility),
        Some(Compatibility::CgbOnly)
    );
}

#[test]
fn boot_rom_size_is_checked() {
    let mut console = Console::new();
    assert_eq!(
        console.load_boot_rom(vec![0; 0x901]),
        Err(LoadError::BootRom(0x901))
    );
    assert_eq!(console.load_boot_rom(vec![0; 0x900]), Ok(()));
    assert!(console.bus().cgb_mode());
}
