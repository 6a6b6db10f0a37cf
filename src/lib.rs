//! Core emulation of the original Game Boy: the LR35902 CPU, the banked
//! cartridge controllers, the shared memory bus, the PPU with its OAM DMA
//! engine, and the small peripherals (joypad, serial link, timer), all
//! sequenced by a single master clock. Frontends sit entirely outside:
//! they feed in a ROM image and button events, and read frames and serial
//! bytes back out.

mod cartridge;
mod clock;
mod cpu;
mod interrupt_system;
mod joypad;
mod memory;
mod ppu;
mod serial_port;
mod system;
mod timer;

pub use cartridge::{Cartridge, CartridgeType, GameBoyType};
pub use clock::{Clock, Tickable};
pub use cpu::{Cpu, Flags, Instruction, Opcode, Operand, Registers};
pub use interrupt_system::{Interrupt, InterruptSink, InterruptSystem};
pub use joypad::{Buttons, Joypad};
pub use memory::{
    regions, FlatRom, InternalRam, Mbc1, Mbc2, Memory, MemoryBus, TestMemory,
};
pub use ppu::{
    Frame, Lcdc, Mode, OamDma, OamEntry, Palette, Ppu, SpritePalette, Tile, SCREEN_HEIGHT,
    SCREEN_WIDTH,
};
pub use serial_port::SerialPort;
pub use system::{System, DOTS_PER_FRAME, MASTER_FREQUENCY};
pub use timer::Timer;
