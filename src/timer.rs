//! The DIV/TIMA timer block. DIV free-runs; TIMA counts at one of four
//! TAC-selected rates while enabled, and an overflow reloads it from TMA
//! and requests the timer interrupt. Rates are expressed in master-clock
//! ticks per increment.

use crate::clock::Tickable;
use crate::interrupt_system::{Interrupt, InterruptSystem};
use crate::memory::Memory;
use std::cell::RefCell;
use std::rc::Rc;

const DIV_ADDR: u16 = 0xff04;
const TIMA_ADDR: u16 = 0xff05;
const TMA_ADDR: u16 = 0xff06;
const TAC_ADDR: u16 = 0xff07;

const TAC_ENABLE: u8 = 1 << 2;
const TAC_WRITE_MASK: u8 = 0b111;

/// DIV increments every 256 master ticks (16384 Hz).
const DIV_PERIOD: u32 = 256;

/// Master ticks per TIMA increment for TAC bits 1-0.
fn tima_period(tac: u8) -> u32 {
    match tac & 0b11 {
        0b00 => 1024, // 4096 Hz
        0b01 => 16,   // 262144 Hz
        0b10 => 64,   // 65536 Hz
        0b11 => 256,  // 16384 Hz
        _ => unreachable!(),
    }
}

pub struct Timer {
    interrupts: Rc<RefCell<InterruptSystem>>,
    div: u8,
    tima: u8,
    tma: u8,
    tac: u8,
    div_counter: u32,
    tima_counter: u32,
}

impl Timer {
    pub fn new(interrupts: Rc<RefCell<InterruptSystem>>) -> Timer {
        Timer {
            interrupts,
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            div_counter: 0,
            tima_counter: 0,
        }
    }
}

impl Tickable for Timer {
    fn tick(&mut self) {
        self.div_counter += 1;
        if self.div_counter == DIV_PERIOD {
            self.div_counter = 0;
            self.div = self.div.wrapping_add(1);
        }

        if self.tac & TAC_ENABLE == 0 {
            return;
        }

        self.tima_counter += 1;
        if self.tima_counter >= tima_period(self.tac) {
            self.tima_counter = 0;

            let (tima, overflow) = self.tima.overflowing_add(1);
            self.tima = if overflow { self.tma } else { tima };
            if overflow {
                self.interrupts.borrow_mut().interrupt(Interrupt::Timer);
            }
        }
    }
}

impl Memory for Timer {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            DIV_ADDR => self.div,
            TIMA_ADDR => self.tima,
            TMA_ADDR => self.tma,
            TAC_ADDR => self.tac | !TAC_WRITE_MASK,
            _ => {
                log::error!("Invalid read to timer at {:#06x}, returning junk", addr);
                0xff
            }
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            // Any write clears DIV.
            DIV_ADDR => {
                self.div = 0;
                self.div_counter = 0;
            }
            TIMA_ADDR => self.tima = value,
            TMA_ADDR => self.tma = value,
            TAC_ADDR => self.tac = value & TAC_WRITE_MASK,
            _ => log::error!("Invalid write to timer at {:#06x}, ignoring", addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer() -> (Timer, Rc<RefCell<InterruptSystem>>) {
        let interrupts = Rc::new(RefCell::new(InterruptSystem::new()));
        (Timer::new(interrupts.clone()), interrupts)
    }

    fn run(timer: &mut Timer, ticks: u32) {
        for _ in 0..ticks {
            timer.tick();
        }
    }

    #[test]
    fn div_counts_every_256_ticks_and_resets_on_write() {
        let (mut timer, _) = timer();

        run(&mut timer, 255);
        assert_eq!(timer.read(DIV_ADDR), 0);
        run(&mut timer, 1);
        assert_eq!(timer.read(DIV_ADDR), 1);

        run(&mut timer, 256 * 3);
        assert_eq!(timer.read(DIV_ADDR), 4);

        timer.write(DIV_ADDR, 0x55);
        assert_eq!(timer.read(DIV_ADDR), 0);
    }

    #[test]
    fn tima_only_counts_while_enabled() {
        let (mut timer, _) = timer();

        run(&mut timer, 1024);
        assert_eq!(timer.read(TIMA_ADDR), 0);

        timer.write(TAC_ADDR, TAC_ENABLE | 0b01); // every 16 ticks
        run(&mut timer, 16 * 5);
        assert_eq!(timer.read(TIMA_ADDR), 5);
    }

    #[test]
    fn overflow_reloads_tma_and_interrupts() {
        let (mut timer, interrupts) = timer();

        timer.write(TMA_ADDR, 0xf0);
        timer.write(TIMA_ADDR, 0xff);
        timer.write(TAC_ADDR, TAC_ENABLE | 0b01);

        run(&mut timer, 16);
        assert_eq!(timer.read(TIMA_ADDR), 0xf0);
        assert_ne!(
            interrupts.borrow().read_if() & Interrupt::Timer as u8,
            0
        );
    }

    #[test]
    fn tac_reads_back_with_unused_bits_high() {
        let (mut timer, _) = timer();
        timer.write(TAC_ADDR, 0xff);
        assert_eq!(timer.read(TAC_ADDR), 0xff);
        timer.write(TAC_ADDR, 0x05);
        assert_eq!(timer.read(TAC_ADDR), 0xfd);
    }
}
