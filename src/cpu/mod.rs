//! The CPU: register file, the fetch/decode/execute tick loop, the stack,
//! and interrupt service. One tick reads one byte at PC and feeds it to the
//! decoder; whenever that completes an instruction, the instruction
//! executes within the same tick. Interrupts are only accepted between
//! instructions, which the controller learns by having its delivery
//! refused at any other moment.

mod decoder;
mod execute;
mod instruction;
mod registers;

pub use instruction::{Instruction, Opcode, Operand};
pub use registers::{Flags, Registers};

use crate::clock::Tickable;
use crate::interrupt_system::{Interrupt, InterruptSink};
use crate::memory::{Memory, MemoryBus};
use decoder::Decoder;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Cpu {
    reg: Registers,
    bus: Rc<RefCell<MemoryBus>>,
    decoder: Decoder,
    /// Interrupt master enable.
    ime: bool,
    /// Retirement countdown for EI's delayed enable; 0 when idle.
    ime_countdown: u8,
    halted: bool,
}

impl Cpu {
    /// Registers come up holding the post-boot-ROM values.
    pub fn new(bus: Rc<RefCell<MemoryBus>>) -> Cpu {
        let mut reg = Registers::new();
        reg.set_af(0x01b0);
        reg.set_bc(0x0013);
        reg.set_de(0x00d8);
        reg.set_hl(0x014d);
        reg.sp = 0xfffe;
        reg.pc = 0x0100;

        Cpu {
            reg,
            bus,
            decoder: Decoder::new(),
            ime: false,
            ime_countdown: 0,
            halted: false,
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.reg
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn ime(&self) -> bool {
        self.ime
    }

    fn push_to_stack(&mut self, value: u16) {
        // MSB at SP-1, then LSB at SP-2.
        self.reg.sp = self.reg.sp.wrapping_sub(1);
        self.bus.borrow_mut().write(self.reg.sp, (value >> 8) as u8);

        self.reg.sp = self.reg.sp.wrapping_sub(1);
        self.bus.borrow_mut().write(self.reg.sp, (value & 0xff) as u8);
    }

    fn pop_from_stack(&mut self) -> u16 {
        let low = self.bus.borrow().read(self.reg.sp);
        self.reg.sp = self.reg.sp.wrapping_add(1);

        let high = self.bus.borrow().read(self.reg.sp);
        self.reg.sp = self.reg.sp.wrapping_add(1);

        u16::from_le_bytes([low, high])
    }

    /// Bookkeeping that happens once per retired instruction.
    fn retire(&mut self) {
        if self.ime_countdown > 0 {
            self.ime_countdown -= 1;
            if self.ime_countdown == 0 {
                self.ime = true;
            }
        }
    }
}

impl Tickable for Cpu {
    fn tick(&mut self) {
        if self.halted {
            return;
        }

        let byte = self.bus.borrow().read(self.reg.pc);
        self.reg.pc = self.reg.pc.wrapping_add(1);

        if let Some(inst) = self.decoder.step(byte) {
            log::trace!("{:#06x}: {}", self.reg.pc, inst);
            self.execute_instruction(inst);
            self.retire();
        }
    }
}

impl InterruptSink for Cpu {
    fn interrupt(&mut self, source: Interrupt) -> bool {
        // Never mid-instruction; the decoder would lose its bytes.
        if self.decoder.mid_instruction() {
            return false;
        }

        if !self.ime {
            // A pending interrupt still lifts HALT, it just isn't serviced.
            self.halted = false;
            return false;
        }

        self.halted = false;
        self.ime = false;
        self.ime_countdown = 0;

        let pc = self.reg.pc;
        self.push_to_stack(pc);
        self.reg.pc = source.vector();

        true
    }
}
