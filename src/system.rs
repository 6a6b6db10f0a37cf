//! Construction and wiring of a whole machine: every region registered on
//! the bus once, every tickable registered with the clock once, in the
//! order the spec fixes (interrupt controller, CPU, PPU, DMA, serial,
//! timer). After `new` returns, nothing allocates and nothing fails.

use crate::cartridge::Cartridge;
use crate::clock::Clock;
use crate::cpu::Cpu;
use crate::interrupt_system::{InterruptSink, InterruptSystem};
use crate::joypad::{Buttons, Joypad};
use crate::memory::{InternalRam, Memory, MemoryBus};
use crate::ppu::{Frame, OamDma, Ppu};
use crate::serial_port::SerialPort;
use crate::timer::Timer;
use std::cell::{Ref, RefCell};
use std::rc::{Rc, Weak};

/// Master clock rate in Hz. One tick is one dot.
pub const MASTER_FREQUENCY: u64 = 4_194_304;

/// Dots in one full frame (154 lines of 456 dots).
pub const DOTS_PER_FRAME: u32 = 70224;

pub struct System {
    clock: Clock,
    bus: Rc<RefCell<MemoryBus>>,
    cpu: Rc<RefCell<Cpu>>,
    ppu: Rc<RefCell<Ppu>>,
    joypad: Rc<RefCell<Joypad>>,
    serial: Rc<RefCell<SerialPort>>,
}

impl System {
    /// Builds a machine around the given cartridge. `None` means the
    /// cartridge needs a banking chip this core does not emulate.
    pub fn new(cartridge: Cartridge) -> Option<System> {
        let mbc = cartridge.into_mbc()?;

        let bus = Rc::new(RefCell::new(MemoryBus::new()));
        let interrupts = Rc::new(RefCell::new(InterruptSystem::new()));

        let ppu = Rc::new(RefCell::new(Ppu::new(interrupts.clone())));
        let ram = Rc::new(RefCell::new(InternalRam::new()));
        let joypad = Rc::new(RefCell::new(Joypad::new(interrupts.clone())));
        let serial = Rc::new(RefCell::new(SerialPort::new(interrupts.clone())));
        let timer = Rc::new(RefCell::new(Timer::new(interrupts.clone())));
        let dma = Rc::new(RefCell::new(OamDma::new(bus.clone(), ppu.clone())));

        {
            let mut b = bus.borrow_mut();
            b.register_region(mbc.clone(), 0x0000, 0x7fff);
            b.register_region(mbc, 0xa000, 0xbfff);

            b.register_region(ppu.clone(), 0x8000, 0x9fff);
            b.register_region(ppu.clone(), 0xfe00, 0xfe9f);
            // The PPU block splits around 0xff46, which the DMA engine owns.
            b.register_region(ppu.clone(), 0xff40, 0xff45);
            b.register_region(ppu.clone(), 0xff47, 0xff4b);
            b.register_region(dma.clone(), 0xff46, 0xff46);

            b.register_region(ram.clone(), 0xc000, 0xfdff);
            b.register_region(ram, 0xff80, 0xfffe);

            b.register_region(joypad.clone(), 0xff00, 0xff00);
            b.register_region(serial.clone(), 0xff01, 0xff02);
            b.register_region(timer.clone(), 0xff04, 0xff07);

            b.register_region(interrupts.clone(), 0xff0f, 0xff0f);
            b.register_region(interrupts.clone(), 0xffff, 0xffff);
        }

        let cpu = Rc::new(RefCell::new(Cpu::new(bus.clone())));
        let cpu_sink: Rc<RefCell<dyn InterruptSink>> = cpu.clone();
        let sink: Weak<RefCell<dyn InterruptSink>> = Rc::downgrade(&cpu_sink);
        interrupts.borrow_mut().connect_sink(sink);

        let mut clock = Clock::new(MASTER_FREQUENCY, MASTER_FREQUENCY);
        clock.add_output(interrupts);
        clock.add_output(cpu.clone());
        clock.add_output(ppu.clone());
        clock.add_output(dma);
        clock.add_output(serial.clone());
        clock.add_output(timer);

        Some(System {
            clock,
            bus,
            cpu,
            ppu,
            joypad,
            serial,
        })
    }

    /// Parses a raw ROM image and builds a machine around it.
    pub fn from_image(image: Vec<u8>) -> Option<System> {
        System::new(Cartridge::from_bytes(image)?)
    }

    /// Advances the whole machine by one master tick.
    pub fn tick(&mut self) {
        self.clock.tick();
    }

    /// Runs for one frame's worth of dots.
    pub fn step_frame(&mut self) {
        for _ in 0..DOTS_PER_FRAME {
            self.tick();
        }
    }

    pub fn frame(&self) -> Frame {
        *self.ppu.borrow().frame()
    }

    pub fn press(&mut self, buttons: Buttons) {
        self.joypad.borrow_mut().press(buttons);
    }

    pub fn release(&mut self, buttons: Buttons) {
        self.joypad.borrow_mut().release(buttons);
    }

    /// Queues a byte on the serial link, as if a peer had sent it.
    pub fn serial_send(&mut self, value: u8) {
        self.serial.borrow_mut().send(value);
    }

    /// Takes the next byte the guest has pushed out the serial link.
    pub fn serial_receive(&mut self) -> Option<u8> {
        self.serial.borrow_mut().receive()
    }

    /// Debug peek at the bus.
    pub fn read(&self, addr: u16) -> u8 {
        self.bus.borrow().read(addr)
    }

    /// Debug poke at the bus.
    pub fn write(&mut self, addr: u16, value: u8) {
        self.bus.borrow_mut().write(addr, value);
    }

    /// Debug view of the CPU.
    pub fn cpu(&self) -> Ref<'_, Cpu> {
        self.cpu.borrow()
    }
}
