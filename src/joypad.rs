//! The button matrix behind the P1/JOYP register. Two selector lines each
//! pull one column of four buttons onto the low nibble; everything is
//! active-low on the wire, so "pulled" and "pressed" read as zero bits.

use crate::interrupt_system::{Interrupt, InterruptSystem};
use crate::memory::Memory;
use bitflags::bitflags;
use std::cell::RefCell;
use std::rc::Rc;

const P1_ADDR: u16 = 0xff00;

const P10_MASK: u8 = 1 << 0;
const P11_MASK: u8 = 1 << 1;
const P12_MASK: u8 = 1 << 2;
const P13_MASK: u8 = 1 << 3;
/// Selects the direction column when pulled low.
const P14_MASK: u8 = 1 << 4;
/// Selects the button column when pulled low.
const P15_MASK: u8 = 1 << 5;

bitflags! {
    /// The physical buttons. The bit layout is internal bookkeeping; the
    /// guest only ever sees columns of four through P1.
    pub struct Buttons: u8 {
        const RIGHT = 1 << 0;
        const LEFT = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
        const A = 1 << 4;
        const B = 1 << 5;
        const SELECT = 1 << 6;
        const START = 1 << 7;
    }
}

pub struct Joypad {
    interrupts: Rc<RefCell<InterruptSystem>>,
    pressed: Buttons,
    p14_pulled: bool,
    p15_pulled: bool,
}

impl Joypad {
    pub fn new(interrupts: Rc<RefCell<InterruptSystem>>) -> Joypad {
        Joypad {
            interrupts,
            pressed: Buttons::empty(),
            p14_pulled: false,
            p15_pulled: false,
        }
    }

    /// Called by the frontend on a key-down event. A freshly pressed
    /// button requests the joypad interrupt.
    pub fn press(&mut self, buttons: Buttons) {
        if !self.pressed.contains(buttons) {
            self.interrupts.borrow_mut().interrupt(Interrupt::Joypad);
        }

        self.pressed.insert(buttons);
    }

    /// Called by the frontend on a key-up event.
    pub fn release(&mut self, buttons: Buttons) {
        self.pressed.remove(buttons);
    }

    pub fn is_pressed(&self, buttons: Buttons) -> bool {
        self.pressed.contains(buttons)
    }

    fn compose_p1(&self) -> u8 {
        // All six lines start pulled up.
        let mut p1 = P15_MASK | P14_MASK | P13_MASK | P12_MASK | P11_MASK | P10_MASK;

        if self.p14_pulled {
            p1 &= !P14_MASK;

            if self.pressed.contains(Buttons::RIGHT) {
                p1 &= !P10_MASK;
            }
            if self.pressed.contains(Buttons::LEFT) {
                p1 &= !P11_MASK;
            }
            if self.pressed.contains(Buttons::UP) {
                p1 &= !P12_MASK;
            }
            if self.pressed.contains(Buttons::DOWN) {
                p1 &= !P13_MASK;
            }
        }

        if self.p15_pulled {
            p1 &= !P15_MASK;

            if self.pressed.contains(Buttons::A) {
                p1 &= !P10_MASK;
            }
            if self.pressed.contains(Buttons::B) {
                p1 &= !P11_MASK;
            }
            if self.pressed.contains(Buttons::SELECT) {
                p1 &= !P12_MASK;
            }
            if self.pressed.contains(Buttons::START) {
                p1 &= !P13_MASK;
            }
        }

        p1
    }
}

impl Memory for Joypad {
    fn read(&self, addr: u16) -> u8 {
        if addr != P1_ADDR {
            log::error!("Invalid read to joypad at {:#06x}, returning junk", addr);
            return 0xff;
        }

        self.compose_p1()
    }

    fn write(&mut self, addr: u16, value: u8) {
        if addr != P1_ADDR {
            log::error!("Invalid write to joypad at {:#06x}, ignoring", addr);
            return;
        }

        self.p14_pulled = value & P14_MASK == 0;
        self.p15_pulled = value & P15_MASK == 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joypad() -> (Joypad, Rc<RefCell<InterruptSystem>>) {
        let interrupts = Rc::new(RefCell::new(InterruptSystem::new()));
        (Joypad::new(interrupts.clone()), interrupts)
    }

    #[test]
    fn nothing_selected_reads_all_high() {
        let (mut joypad, _) = joypad();
        joypad.write(P1_ADDR, 0x30);
        joypad.press(Buttons::A | Buttons::DOWN);
        assert_eq!(joypad.read(P1_ADDR), 0x3f);
    }

    #[test]
    fn direction_column_reports_through_p14() {
        let (mut joypad, _) = joypad();
        joypad.press(Buttons::RIGHT | Buttons::UP);

        joypad.write(P1_ADDR, !P14_MASK & 0x30);
        // P14 low, RIGHT (bit 0) and UP (bit 2) low.
        assert_eq!(joypad.read(P1_ADDR), 0b0010_1010);
    }

    #[test]
    fn button_column_reports_through_p15() {
        let (mut joypad, _) = joypad();
        joypad.press(Buttons::A | Buttons::START);

        joypad.write(P1_ADDR, !P15_MASK & 0x30);
        // P15 low, A (bit 0) and START (bit 3) low.
        assert_eq!(joypad.read(P1_ADDR), 0b0001_0110);
    }

    #[test]
    fn release_restores_the_line() {
        let (mut joypad, _) = joypad();
        joypad.write(P1_ADDR, !P15_MASK & 0x30);

        joypad.press(Buttons::B);
        assert_eq!(joypad.read(P1_ADDR) & P11_MASK, 0);

        joypad.release(Buttons::B);
        assert_ne!(joypad.read(P1_ADDR) & P11_MASK, 0);
    }

    #[test]
    fn a_fresh_press_requests_the_interrupt() {
        let (mut joypad, interrupts) = joypad();

        joypad.press(Buttons::START);
        assert_ne!(
            interrupts.borrow().read_if() & Interrupt::Joypad as u8,
            0
        );

        // Holding the same button does not re-request.
        interrupts.borrow_mut().write_if(0);
        joypad.press(Buttons::START);
        assert_eq!(
            interrupts.borrow().read_if() & Interrupt::Joypad as u8,
            0
        );
    }
}
