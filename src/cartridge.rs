//! Cartridge admission. The loader hands us a raw byte vector; this module
//! pulls the header fields out of it, sanity-checks them, and builds the
//! matching memory controller. Anything we cannot emulate comes back as
//! `None` so the loader can report it; the core itself never fails after
//! this point.

use crate::memory::{FlatRom, Mbc1, Mbc2, Memory};
use num_enum::TryFromPrimitive;
use std::cell::RefCell;
use std::convert::TryFrom;
use std::rc::Rc;

const TITLE_BEGIN: usize = 0x0134;
const TITLE_END: usize = 0x0142;
const GAME_BOY_TYPE_ADDR: usize = 0x0143;
const CARTRIDGE_TYPE_ADDR: usize = 0x0147;
const ROM_SIZE_ADDR: usize = 0x0148;
const RAM_SIZE_ADDR: usize = 0x0149;
const HEADER_BEGIN: usize = 0x0134;
const HEADER_END: usize = 0x014c;
const HEADER_CHECKSUM_ADDR: usize = 0x014d;

const KBYTE: usize = 1024;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GameBoyType {
    GameBoy,
    ColorGameBoy,
}

/// Cartridge type codes as stored in the header. Only the ROM, MBC1 and
/// MBC2 families are emulated; the rest are listed so the loader gets a
/// name instead of a raw byte in its logs.
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum CartridgeType {
    Rom = 0x00,
    RomMbc1 = 0x01,
    RomMbc1Ram = 0x02,
    RomMbc1RamBatt = 0x03,
    RomMbc2 = 0x05,
    RomMbc2Batt = 0x06,
    RomRam = 0x08,
    RomRamBatt = 0x09,
    RomMmm01 = 0x0b,
    RomMmm01Sram = 0x0c,
    RomMmm01SramBatt = 0x0d,
    RomMbc3RtcBatt = 0x0f,
    RomMbc3RtcRamBatt = 0x10,
    RomMbc3 = 0x11,
    RomMbc3Ram = 0x12,
    RomMbc3RamBatt = 0x13,
    RomMbc5 = 0x19,
    RomMbc5Ram = 0x1a,
    RomMbc5RamBatt = 0x1b,
    RomMbc5Rumble = 0x1c,
    RomMbc5RumbleSram = 0x1d,
    RomMbc5RumbleSramBatt = 0x1e,
    PocketCamera = 0x1f,
    BandaiTama5 = 0xfd,
    HudsonHuc3 = 0xfe,
    HudsonHuc1 = 0xff,
}

pub struct Cartridge {
    title: String,
    game_boy_type: GameBoyType,
    cartridge_type: CartridgeType,
    rom_size: usize,
    ram_size: usize,
    content: Vec<u8>,
}

fn decode_rom_size(raw: u8) -> Option<usize> {
    let size = match raw {
        0x00 => 32 * KBYTE,
        0x01 => 64 * KBYTE,
        0x02 => 128 * KBYTE,
        0x03 => 256 * KBYTE,
        0x04 => 512 * KBYTE,
        0x05 => 1024 * KBYTE,
        0x06 => 2048 * KBYTE,
        0x52 => 1152 * KBYTE, // 1.1 MByte
        0x53 => 1280 * KBYTE, // 1.2 MByte
        0x54 => 1536 * KBYTE, // 1.5 MByte
        _ => {
            log::error!("Unknown ROM size {:#04x}", raw);
            return None;
        }
    };

    Some(size)
}

fn decode_ram_size(raw: u8) -> Option<usize> {
    let size = match raw {
        0x00 => 0,
        0x01 => 2 * KBYTE,
        0x02 => 8 * KBYTE,
        0x03 => 32 * KBYTE,
        0x04 => 128 * KBYTE,
        _ => {
            log::error!("Unknown RAM size {:#04x}", raw);
            return None;
        }
    };

    Some(size)
}

fn verify_header_checksum(content: &[u8]) -> bool {
    let checksum = content[HEADER_CHECKSUM_ADDR];

    let mut calculated: u8 = 0;
    for &byte in &content[HEADER_BEGIN..=HEADER_END] {
        calculated = calculated.wrapping_add(byte);
    }
    calculated = calculated.wrapping_add(0x19).wrapping_add(checksum);

    calculated == 0
}

impl Cartridge {
    /// Parses the header out of `content`. Returns `None` for images too
    /// small to carry a header, unknown type/size codes, or an image whose
    /// length disagrees with its own header. A bad checksum only warns;
    /// plenty of real dumps ship with one.
    pub fn from_bytes(content: Vec<u8>) -> Option<Cartridge> {
        if content.len() <= HEADER_CHECKSUM_ADDR {
            log::error!("Image of {} bytes has no room for a header", content.len());
            return None;
        }

        let title = content[TITLE_BEGIN..=TITLE_END]
            .iter()
            .take_while(|&&byte| byte != 0)
            .map(|&byte| byte as char)
            .collect();

        let game_boy_type = if content[GAME_BOY_TYPE_ADDR] == 0x80 {
            GameBoyType::ColorGameBoy
        } else {
            GameBoyType::GameBoy
        };

        let cartridge_type = match CartridgeType::try_from(content[CARTRIDGE_TYPE_ADDR]) {
            Ok(cartridge_type) => cartridge_type,
            Err(_) => {
                log::error!("Unknown cartridge type {:#04x}", content[CARTRIDGE_TYPE_ADDR]);
                return None;
            }
        };

        let rom_size = decode_rom_size(content[ROM_SIZE_ADDR])?;
        let ram_size = decode_ram_size(content[RAM_SIZE_ADDR])?;

        if content.len() != rom_size {
            log::error!(
                "Header declares {} bytes of ROM but the image holds {}",
                rom_size,
                content.len()
            );
            return None;
        }

        if !verify_header_checksum(&content) {
            log::warn!("Header checksum mismatch, continuing anyway");
        }

        Some(Cartridge {
            title,
            game_boy_type,
            cartridge_type,
            rom_size,
            ram_size,
            content,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn game_boy_type(&self) -> GameBoyType {
        self.game_boy_type
    }

    pub fn cartridge_type(&self) -> CartridgeType {
        self.cartridge_type
    }

    pub fn rom_size(&self) -> usize {
        self.rom_size
    }

    pub fn ram_size(&self) -> usize {
        self.ram_size
    }

    /// Consumes the cartridge and builds the controller that owns its
    /// bytes. `None` means the banking chip is not emulated.
    pub fn into_mbc(self) -> Option<Rc<RefCell<dyn Memory>>> {
        use CartridgeType::*;

        match self.cartridge_type {
            Rom | RomRam | RomRamBatt => Some(Rc::new(RefCell::new(FlatRom::new(
                self.content,
                self.ram_size,
            )))),
            RomMbc1 | RomMbc1Ram | RomMbc1RamBatt => Some(Rc::new(RefCell::new(Mbc1::new(
                self.content,
                self.ram_size,
            )))),
            RomMbc2 | RomMbc2Batt => Some(Rc::new(RefCell::new(Mbc2::new(self.content)))),
            other => {
                log::error!("Cartridge type {:?} is not implemented", other);
                None
            }
        }
    }
}
