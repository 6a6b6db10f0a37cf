//! End-to-end scenarios on a fully wired machine: ROM image in, bus
//! traffic and frames out, with the guest program doing the driving.

use dotmatrix::{Interrupt, Mode, System};

/// Route `log` output into the test harness; `RUST_LOG=debug cargo test`
/// makes the emulated machine narrate itself.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds a ROM image with a valid header. `program` lands at the entry
/// point (0x0100); `banks` gives the total 16 KiB bank count.
fn build_image(cartridge_type: u8, rom_size_code: u8, banks: usize, program: &[u8]) -> Vec<u8> {
    let mut image = vec![0u8; banks * 0x4000];

    image[0x0147] = cartridge_type;
    image[0x0148] = rom_size_code;
    image[0x0149] = 0x00;
    image[0x0100..0x0100 + program.len()].copy_from_slice(program);

    let mut sum: u8 = 0;
    for &byte in &image[0x0134..=0x014c] {
        sum = sum.wrapping_add(byte);
    }
    image[0x014d] = 0u8.wrapping_sub(sum).wrapping_sub(0x19);

    image
}

/// JR -2: spins at the entry point forever without touching anything.
const SPIN: [u8; 2] = [0x18, 0xfe];

fn spinning_system() -> System {
    init_logging();
    System::from_image(build_image(0x00, 0x00, 2, &SPIN)).unwrap()
}

fn tick(system: &mut System, n: u32) {
    for _ in 0..n {
        system.tick();
    }
}

#[test]
fn mbc1_bank_select_wraps_past_the_rom_size() {
    // Four banks filled with 0x01..0x04 (bank 0 carries the header and
    // the spin loop instead of its marker).
    let mut image = build_image(0x01, 0x01, 4, &SPIN);
    for bank in 1..4 {
        for byte in &mut image[bank * 0x4000..(bank + 1) * 0x4000] {
            *byte = bank as u8 + 1;
        }
    }
    let mut system = System::from_image(image).unwrap();

    // Bank 5 on a 4-bank cartridge lands on bank 1.
    system.write(0x2000, 5);
    assert_eq!(system.read(0x4000), 0x02);
    assert_eq!(system.read(0x6123), 0x02);
    assert_eq!(system.read(0x7fff), 0x02);

    system.write(0x2000, 3);
    assert_eq!(system.read(0x4000), 0x04);
}

#[test]
fn mbc2_ram_stores_nibbles_behind_its_enable_latch() {
    let mut system = System::from_image(build_image(0x05, 0x01, 4, &SPIN)).unwrap();

    system.write(0x0000, 0x0a);
    system.write(0xa000, 0x55);
    assert_eq!(system.read(0xa000), 0xf5);

    system.write(0x0000, 0x00);
    assert_eq!(system.read(0xa000), 0xff);
}

#[test]
fn serial_loopback_sends_and_receives_through_the_registers() {
    let mut system = spinning_system();

    system.serial_send(0x69);
    system.write(0xff02, 0x81);
    tick(&mut system, 8);

    assert_eq!(system.read(0xff02), 0x01);
    assert_eq!(system.read(0xff01), 0x69);
    assert_eq!(system.serial_receive(), Some(0x00));
}

#[test]
fn oam_dma_copies_a_page_into_oam() {
    let mut system = spinning_system();

    for i in 0..160u16 {
        system.write(0xc500 + i, i as u8);
    }

    system.write(0xff46, 0xc5);
    tick(&mut system, 160);

    // The register reads back its page once the engine is idle again.
    assert_eq!(system.read(0xff46), 0xc5);

    // Park the PPU in a mode where OAM is readable before verifying.
    while system.read(0xff41) & 0b11 != Mode::HBlank as u8 {
        system.tick();
    }
    for i in 0..160u16 {
        assert_eq!(system.read(0xfe00 + i), i as u8);
    }
}

#[test]
fn a_requested_interrupt_is_serviced_within_two_ticks() {
    // EI, then spin. IME comes up once the first jump retires.
    let mut system = System::from_image(build_image(0x00, 0x00, 2, &[0xfb, 0x18, 0xfe])).unwrap();
    tick(&mut system, 3);
    assert!(system.cpu().ime());

    system.write(0xffff, Interrupt::VBlank as u8);
    system.write(0xff0f, Interrupt::VBlank as u8);
    tick(&mut system, 2);

    // PC went through the 0x40 vector and the old PC is on the stack.
    let pc = system.cpu().registers().pc;
    assert!((0x40..0x44).contains(&pc), "pc = {:#06x}", pc);
    assert_eq!(system.cpu().registers().sp, 0xfffc);
    assert_eq!(system.read(0xfffc), 0x01);
    assert_eq!(system.read(0xfffd), 0x01);

    // The request bit was cleared on delivery.
    assert_eq!(system.read(0xff0f) & Interrupt::VBlank as u8, 0);
}

#[test]
fn vblank_is_requested_once_the_visible_lines_are_done() {
    let mut system = spinning_system();

    tick(&mut system, 144 * 456 - 1);
    assert_eq!(system.read(0xff0f) & Interrupt::VBlank as u8, 0);

    tick(&mut system, 1);
    assert_ne!(system.read(0xff0f) & Interrupt::VBlank as u8, 0);
}

#[test]
fn frames_render_what_the_guest_put_in_vram() {
    let mut system = spinning_system();

    // Wait for a window where VRAM is writable, then build a solid tile
    // and point the first map entry at it.
    while system.read(0xff41) & 0b11 != Mode::HBlank as u8 {
        system.tick();
    }
    for i in 0..16 {
        system.write(0x8010 + i, 0xff); // tile 1, all color 3
    }
    system.write(0x9800, 1);
    system.write(0xff47, 0b11_10_01_00); // identity palette

    system.step_frame();

    let frame = system.frame();
    assert_eq!(frame[8][0], 3); // rows drawn after the writes landed
    assert_eq!(frame[8][7], 3);
    assert_eq!(frame[8][8], 0);
    assert_eq!(frame[143][0], 3);
}

#[test]
fn echo_ram_mirrors_work_ram_on_the_live_bus() {
    let mut system = spinning_system();

    system.write(0xc000, 0x12);
    assert_eq!(system.read(0xe000), 0x12);
    system.write(0xfdff, 0x34);
    assert_eq!(system.read(0xddff), 0x34);
}

#[test]
fn halted_cpu_wakes_on_a_timer_interrupt() {
    // EI; enable the timer at the fastest rate; HALT.
    let program = [
        0xfb, // EI
        0x3e, 0x05, // LD A, 0b101
        0xe0, 0x07, // LDH (0x07), A  ; TAC: enabled, 262144 Hz
        0x76, // HALT
        0x18, 0xfe, // JR -2
    ];
    let mut system = System::from_image(build_image(0x00, 0x00, 2, &program)).unwrap();
    system.write(0xffff, Interrupt::Timer as u8);
    system.write(0xff05, 0xff); // TIMA one step from overflow

    tick(&mut system, 6);
    assert!(system.cpu().halted());

    // The next TIMA increment overflows, interrupts, and wakes the CPU
    // into the 0x50 vector.
    tick(&mut system, 20);
    assert!(!system.cpu().halted());
    let pc = system.cpu().registers().pc;
    assert!((0x50..0x60).contains(&pc), "pc = {:#06x}", pc);
}
