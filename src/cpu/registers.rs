//! Storage for the CPU register file. Eight byte-wide registers paired up
//! for 16-bit access, plus SP and PC. The flag register only has storage
//! for its upper nibble; the lower four bits read as zero no matter what
//! was written, which the AF pair has to respect as well.

use bitflags::bitflags;

bitflags! {
    #[derive(Default)]
    pub struct Flags: u8 {
        const Z = 0b_1000_0000;
        const N = 0b_0100_0000;
        const H = 0b_0010_0000;
        const C = 0b_0001_0000;
    }
}

#[derive(Default)]
pub struct Registers {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub flags: Flags,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    pub fn new() -> Registers {
        Default::default()
    }

    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.flags.bits()])
    }

    /// Writing AF re-derives the flag booleans from bits 7-4 and forces
    /// bits 3-0 to zero.
    pub fn set_af(&mut self, value: u16) {
        let [a, f] = value.to_be_bytes();
        self.a = a;
        self.flags = Flags::from_bits_truncate(f);
    }

    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    pub fn set_bc(&mut self, value: u16) {
        let [b, c] = value.to_be_bytes();
        self.b = b;
        self.c = c;
    }

    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    pub fn set_de(&mut self, value: u16) {
        let [d, e] = value.to_be_bytes();
        self.d = d;
        self.e = e;
    }

    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    pub fn set_hl(&mut self, value: u16) {
        let [h, l] = value.to_be_bytes();
        self.h = h;
        self.l = l;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_expose_their_byte_halves() {
        let mut reg = Registers::new();

        reg.set_bc(0x1234);
        assert_eq!(reg.b, 0x12);
        assert_eq!(reg.c, 0x34);
        assert_eq!(reg.bc(), 0x1234);

        reg.set_de(0xa5c3);
        assert_eq!(reg.d, 0xa5);
        assert_eq!(reg.e, 0xc3);

        reg.h = 0xfe;
        reg.l = 0x01;
        assert_eq!(reg.hl(), 0xfe01);
    }

    #[test]
    fn flag_register_masks_its_low_nibble() {
        let mut reg = Registers::new();

        reg.set_af(0x12ff);
        assert_eq!(reg.a, 0x12);
        assert_eq!(reg.flags.bits(), 0xf0);
        assert_eq!(reg.af(), 0x12f0);
    }

    #[test]
    fn flag_bits_map_to_the_documented_positions() {
        let mut reg = Registers::new();

        reg.set_af(0x00_a0);
        assert!(reg.flags.contains(Flags::Z));
        assert!(!reg.flags.contains(Flags::N));
        assert!(reg.flags.contains(Flags::H));
        assert!(!reg.flags.contains(Flags::C));
        assert_eq!(reg.af(), 0x00a0);
    }
}
