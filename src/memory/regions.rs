//! Start/end addresses and sizes of the fixed regions in the address space.
//! All ranges are inclusive on both ends.

pub const ROM_0_BEGIN: u16 = 0x0000;
pub const ROM_0_END: u16 = 0x3fff;

/// Switchable ROM bank.
pub const ROM_SWITCHABLE_BEGIN: u16 = 0x4000;
pub const ROM_SWITCHABLE_END: u16 = 0x7fff;

pub const ROM_BANK_SIZE: usize = 0x4000;

pub const VRAM_BEGIN: u16 = 0x8000;
pub const VRAM_END: u16 = 0x9fff;

/// External (on-cartridge, bank-switchable) RAM.
pub const RAM_EXTERNAL_BEGIN: u16 = 0xa000;
pub const RAM_EXTERNAL_END: u16 = 0xbfff;

pub const RAM_BANK_SIZE: usize = 0x2000;

pub const RAM_INTERNAL_BEGIN: u16 = 0xc000;
pub const RAM_INTERNAL_END: u16 = 0xdfff;

/// Mirrors the first 7680 bytes of internal RAM.
pub const RAM_ECHO_BEGIN: u16 = 0xe000;
pub const RAM_ECHO_END: u16 = 0xfdff;

pub const OAM_BEGIN: u16 = 0xfe00;
pub const OAM_END: u16 = 0xfe9f;

pub const IO_BEGIN: u16 = 0xff00;
pub const IO_END: u16 = 0xff7f;

pub const HRAM_BEGIN: u16 = 0xff80;
pub const HRAM_END: u16 = 0xfffe;

/// Interrupt-enable register.
pub const IE_REG: u16 = 0xffff;
