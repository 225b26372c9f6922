use thiserror::Error;

/// Problems with cartridge or boot ROM images. The console stays usable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("ROM image is {0} bytes, too small to hold a cartridge header")]
    TooSmall(usize),
    #[error("unsupported cartridge type {0:#04X}")]
    UnsupportedCartridge(u8),
    #[error("boot ROM of {0} bytes is neither a DMG nor a CGB image")]
    BootRom(usize),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    #[error("address {0:#X} is outside the 16-bit address space")]
    OutOfRange(u32),
    #[error("PC {pc:#06X} points past the end of the ROM (offset {offset:#X})")]
    FetchBeyondRom { pc: u16, offset: usize },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeError {
    #[error("illegal opcode {opcode:#04X} at {pc:#06X}")]
    Illegal { opcode: u8, pc: u16 },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    #[error("stack overflow: push with SP={sp:#06X} would wrap below 0x0000")]
    Overflow { sp: u16 },
    #[error("stack underflow: pop with SP={sp:#06X} would wrap past 0xFFFF")]
    Underflow { sp: u16 },
}

/// Everything that can stop a running console.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmuError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Opcode(#[from] OpcodeError),
    #[error(transparent)]
    Stack(#[from] StackError),
}
