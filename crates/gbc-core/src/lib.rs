//! Game Boy / Game Boy Color emulation core.
//!
//! This crate contains the platform-agnostic emulator logic: the SM83 CPU,
//! the memory bus with its bank controllers, the cycle clock and the scanline
//! PPU. Frontends drive it through the [`console`] facade.

/// Memory map, I/O registers and the boot ROM overlay.
pub mod bus;

/// Cartridge header parsing, ROM and external RAM.
pub mod cartridge;

/// Running cycle counter and PPU mode deadlines.
pub mod clock;

/// High-level facade that owns every component and runs frames.
pub mod console;

/// SM83 CPU core.
pub mod cpu;

/// Error types for loading and for fatal emulation faults.
pub mod error;

/// Interrupt sources and dispatch.
pub mod interrupts;

/// Joypad input register.
pub mod joypad;

/// Memory bank controllers.
pub mod mbc;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// Divider/timer unit.
pub mod timer;

pub use cartridge::Cartridge;
pub use console::{Console, ConsoleState, DebugSnapshot};
pub use error::{AddressError, EmuError, LoadError, OpcodeError, StackError};
pub use joypad::Button;
