//! The OAM DMA engine. A write to 0xff46 latches a source page and the
//! engine then moves one byte per tick from `page << 8` into OAM, 160
//! bytes in all. The copy lands in OAM directly, on the PPU side, so the
//! CPU-facing access window does not apply to it.

use super::Ppu;
use crate::clock::Tickable;
use crate::memory::{Memory, MemoryBus};
use std::cell::RefCell;
use std::rc::Rc;

const DMA_ADDR: u16 = 0xff46;
const OAM_SIZE: u8 = 0xa0;

pub struct OamDma {
    bus: Rc<RefCell<MemoryBus>>,
    ppu: Rc<RefCell<Ppu>>,
    transferring: bool,
    source: u16,
    current_byte: u8,
}

impl OamDma {
    pub fn new(bus: Rc<RefCell<MemoryBus>>, ppu: Rc<RefCell<Ppu>>) -> OamDma {
        OamDma {
            bus,
            ppu,
            transferring: false,
            source: 0,
            current_byte: 0,
        }
    }

    pub fn transferring(&self) -> bool {
        self.transferring
    }
}

impl Memory for OamDma {
    fn read(&self, addr: u16) -> u8 {
        if addr != DMA_ADDR {
            log::error!("Invalid read to DMA at {:#06x}, returning junk", addr);
            return 0xff;
        }

        if self.transferring {
            log::error!("Read of the DMA register during transfer, returning junk");
            return 0xff;
        }

        (self.source >> 8) as u8
    }

    fn write(&mut self, addr: u16, value: u8) {
        if addr != DMA_ADDR {
            log::error!("Invalid write to DMA at {:#06x}, ignoring", addr);
            return;
        }

        // A write during a transfer simply restarts it.
        self.transferring = true;
        self.source = (value as u16) << 8;
        self.current_byte = 0;
    }
}

impl Tickable for OamDma {
    fn tick(&mut self) {
        if !self.transferring {
            return;
        }

        let value = self
            .bus
            .borrow()
            .read(self.source + self.current_byte as u16);
        self.ppu
            .borrow_mut()
            .dma_write_oam(self.current_byte, value);

        self.current_byte += 1;
        if self.current_byte == OAM_SIZE {
            self.transferring = false;
        }
    }
}
