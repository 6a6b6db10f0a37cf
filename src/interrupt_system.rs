//! The interrupt controller: the IF/IE latch pair and the dispatch loop
//! that offers pending requests to the CPU. The controller never forces an
//! interrupt through; the sink is free to refuse (interrupts disabled, or
//! mid-instruction), in which case the request simply stays latched.

use crate::clock::Tickable;
use crate::memory::Memory;
use std::cell::RefCell;
use std::rc::Weak;

/// Interrupt sources, in dispatch priority order (lowest bit first). The
/// value of each variant is its bit in the IF/IE registers.
#[derive(Copy, Clone, Debug, PartialEq)]
#[repr(u8)]
pub enum Interrupt {
    VBlank = 1 << 0,
    LcdStatus = 1 << 1,
    Timer = 1 << 2,
    Serial = 1 << 3,
    Joypad = 1 << 4,
}

impl Interrupt {
    /// All sources, highest priority first.
    pub const PRIORITY_ORDER: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStatus,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    /// The fixed service vector jumped to when this source is taken.
    pub fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x40,
            Interrupt::LcdStatus => 0x48,
            Interrupt::Timer => 0x50,
            Interrupt::Serial => 0x58,
            Interrupt::Joypad => 0x60,
        }
    }
}

/// A component the controller can deliver interrupts to. Returning false
/// refuses delivery and leaves the request latched for a later tick.
pub trait InterruptSink {
    fn interrupt(&mut self, source: Interrupt) -> bool;
}

const IF_ADDR: u16 = 0xff0f;
const IE_ADDR: u16 = 0xffff;

/// The three unused bits of IF/IE always read high.
const UNUSED_BITS: u8 = 0b_1110_0000;

pub struct InterruptSystem {
    requested: u8,
    enabled: u8,
    sink: Option<Weak<RefCell<dyn InterruptSink>>>,
}

impl InterruptSystem {
    pub fn new() -> InterruptSystem {
        InterruptSystem {
            requested: 0,
            enabled: 0,
            sink: None,
        }
    }

    /// Attaches the component that requests are delivered to. Held weakly;
    /// the controller does not own its sink.
    pub fn connect_sink(&mut self, sink: Weak<RefCell<dyn InterruptSink>>) {
        self.sink = Some(sink);
    }

    /// Latches a request for `source`. Callable from any peripheral at any
    /// point in the tick; delivery happens on a later controller tick.
    pub fn interrupt(&mut self, source: Interrupt) {
        self.requested |= source as u8;
    }

    pub fn read_if(&self) -> u8 {
        self.requested | UNUSED_BITS
    }

    pub fn write_if(&mut self, value: u8) {
        self.requested = value & !UNUSED_BITS;
    }

    pub fn read_ie(&self) -> u8 {
        self.enabled | UNUSED_BITS
    }

    pub fn write_ie(&mut self, value: u8) {
        self.enabled = value & !UNUSED_BITS;
    }
}

impl Tickable for InterruptSystem {
    fn tick(&mut self) {
        if self.requested & self.enabled == 0 {
            return;
        }

        let sink = match self.sink.as_ref().and_then(Weak::upgrade) {
            Some(sink) => sink,
            None => return,
        };

        for &source in Interrupt::PRIORITY_ORDER.iter() {
            let mask = source as u8;
            if self.requested & self.enabled & mask != 0 {
                if sink.borrow_mut().interrupt(source) {
                    self.requested &= !mask;
                }
            }
        }
    }
}

impl Memory for InterruptSystem {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            IF_ADDR => self.read_if(),
            IE_ADDR => self.read_ie(),
            _ => {
                log::error!("Invalid read to interrupt controller at {:#06x}", addr);
                0xff
            }
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            IF_ADDR => self.write_if(value),
            IE_ADDR => self.write_ie(value),
            _ => log::error!("Invalid write to interrupt controller at {:#06x}", addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    /// Counts deliveries per source, optionally refusing them all.
    struct CountingSink {
        accept: bool,
        delivered: Vec<Interrupt>,
    }

    impl InterruptSink for CountingSink {
        fn interrupt(&mut self, source: Interrupt) -> bool {
            if self.accept {
                self.delivered.push(source);
            }
            self.accept
        }
    }

    fn sink(accept: bool) -> Rc<RefCell<CountingSink>> {
        Rc::new(RefCell::new(CountingSink {
            accept,
            delivered: Vec::new(),
        }))
    }

    fn connected(accept: bool) -> (InterruptSystem, Rc<RefCell<CountingSink>>) {
        let sink = sink(accept);
        let mut system = InterruptSystem::new();
        let sink_dyn: Rc<RefCell<dyn InterruptSink>> = sink.clone();
        let weak: Weak<RefCell<dyn InterruptSink>> = Rc::downgrade(&sink_dyn);
        system.connect_sink(weak);
        (system, sink)
    }

    #[test]
    fn delivery_requires_the_enable_bit() {
        let (mut system, sink) = connected(true);

        system.interrupt(Interrupt::Timer);
        system.tick();
        assert!(sink.borrow().delivered.is_empty());
        assert_eq!(system.read_if(), UNUSED_BITS | 0b100);

        system.write_ie(0b100);
        system.tick();
        assert_eq!(sink.borrow().delivered, vec![Interrupt::Timer]);
        assert_eq!(system.read_if(), UNUSED_BITS);
    }

    #[test]
    fn refusal_keeps_the_request_latched() {
        let (mut system, sink) = connected(false);

        system.write_ie(0xff);
        system.interrupt(Interrupt::Serial);
        system.tick();
        assert!(sink.borrow().delivered.is_empty());
        assert_eq!(system.read_if() & 0b1000, 0b1000);

        sink.borrow_mut().accept = true;
        system.tick();
        assert_eq!(sink.borrow().delivered, vec![Interrupt::Serial]);
        assert_eq!(system.read_if() & 0b1000, 0);
    }

    #[test]
    fn requests_through_if_writes_behave_like_interrupt_calls() {
        let (mut system, sink) = connected(true);

        system.write_ie(0xff);
        system.write(0xff0f, 0b1);
        system.tick();
        assert_eq!(sink.borrow().delivered, vec![Interrupt::VBlank]);
    }

    #[test]
    fn vblank_outranks_everything() {
        let (mut system, sink) = connected(true);

        system.write_ie(0xff);
        system.interrupt(Interrupt::Joypad);
        system.interrupt(Interrupt::VBlank);
        system.tick();
        assert_eq!(
            sink.borrow().delivered,
            vec![Interrupt::VBlank, Interrupt::Joypad]
        );
    }

    #[test]
    fn unused_bits_read_high() {
        let mut system = InterruptSystem::new();
        system.write_if(0);
        system.write_ie(0);
        assert_eq!(system.read(0xff0f), 0b_1110_0000);
        assert_eq!(system.read(0xffff), 0b_1110_0000);

        system.write(0xff0f, 0xff);
        assert_eq!(system.read(0xff0f), 0xff);
    }
}
