//! The instruction decoder: a state machine fed one byte per tick. Most
//! instructions resolve in a single byte; the CB prefix and the immediate
//! forms keep the machine busy for one or two more ticks before the
//! assembled [`Instruction`] is published.

use super::instruction::{Instruction, Opcode, Operand};

#[derive(Copy, Clone, PartialEq)]
enum State {
    Opcode,
    CbPrefix,
    Immediate8,
    Immediate8Sign,
    Immediate16Low,
    Immediate16High,
}

/// Register operand for bits 2-0 of a CB opcode (and the register slots of
/// the unprefixed LD/ALU rows).
const R: [Operand; 8] = [
    Operand::B,
    Operand::C,
    Operand::D,
    Operand::E,
    Operand::H,
    Operand::L,
    Operand::PtrHl,
    Operand::A,
];

/// Rotate/shift operation for bits 5-3 of a CB opcode with bits 7-6 clear.
const ROT: [Opcode; 8] = [
    Opcode::Rlc,
    Opcode::Rrc,
    Opcode::Rl,
    Opcode::Rr,
    Opcode::Sla,
    Opcode::Sra,
    Opcode::Swap,
    Opcode::Srl,
];

// Bits 7-6 / 5-3 / 2-0 of an opcode byte.
fn x(opcode: u8) -> u8 {
    opcode >> 6
}

fn y(opcode: u8) -> u8 {
    (opcode >> 3) & 0b111
}

fn z(opcode: u8) -> u8 {
    opcode & 0b111
}

pub struct Decoder {
    state: State,
    opcode: Opcode,
    lhs: Operand,
    rhs: Operand,
    imm8: Option<u8>,
    imm16_low: u8,
}

impl Decoder {
    pub fn new() -> Decoder {
        Decoder {
            state: State::Opcode,
            opcode: Opcode::Nop,
            lhs: Operand::None,
            rhs: Operand::None,
            imm8: None,
            imm16_low: 0,
        }
    }

    /// True while a partially decoded instruction is in flight. Interrupt
    /// service must not happen in that window.
    pub fn mid_instruction(&self) -> bool {
        self.state != State::Opcode
    }

    /// Feeds the next byte from the instruction stream. Returns the
    /// assembled instruction once all of its bytes have arrived.
    pub fn step(&mut self, value: u8) -> Option<Instruction> {
        match self.state {
            State::Opcode => {
                self.reset();

                if value == 0xcb {
                    self.state = State::CbPrefix;
                    return None;
                }

                match x(value) {
                    1 => self.decode_ld_8bit(value),
                    2 => self.decode_alu(value),
                    _ => self.decode_assorted(value),
                }

                if self.needs_imm8sign() {
                    self.state = State::Immediate8Sign;
                    None
                } else if self.needs_imm8() {
                    self.state = State::Immediate8;
                    None
                } else if self.needs_imm16() {
                    self.state = State::Immediate16Low;
                    None
                } else {
                    Some(self.assemble())
                }
            }
            State::CbPrefix => {
                self.decode_cb(value);
                self.state = State::Opcode;
                Some(self.assemble())
            }
            State::Immediate8 => {
                self.imm8 = Some(value);
                self.state = State::Opcode;
                Some(Instruction::with_imm8(self.opcode, self.lhs, self.rhs, value))
            }
            State::Immediate8Sign => {
                self.state = State::Opcode;
                Some(Instruction::with_imm8sign(
                    self.opcode,
                    self.lhs,
                    self.rhs,
                    value as i8,
                ))
            }
            State::Immediate16Low => {
                self.imm16_low = value;
                self.state = State::Immediate16High;
                None
            }
            State::Immediate16High => {
                self.state = State::Opcode;
                let imm16 = u16::from_le_bytes([self.imm16_low, value]);
                Some(Instruction::with_imm16(self.opcode, self.lhs, self.rhs, imm16))
            }
        }
    }

    fn reset(&mut self) {
        self.opcode = Opcode::Nop;
        self.lhs = Operand::None;
        self.rhs = Operand::None;
        self.imm8 = None;
        self.imm16_low = 0;
    }

    fn assemble(&self) -> Instruction {
        match self.imm8 {
            // RST and the CB bit group pre-fill their immediate; no fetch.
            Some(imm8) => Instruction::with_imm8(self.opcode, self.lhs, self.rhs, imm8),
            None => Instruction::new(self.opcode, self.lhs, self.rhs),
        }
    }

    fn needs_imm8(&self) -> bool {
        let needs = |operand| matches!(operand, Operand::Imm8 | Operand::PtrImm8);
        self.imm8.is_none() && (needs(self.lhs) || needs(self.rhs))
    }

    fn needs_imm8sign(&self) -> bool {
        self.lhs == Operand::Imm8Sign || self.rhs == Operand::Imm8Sign
    }

    fn needs_imm16(&self) -> bool {
        let needs = |operand| matches!(operand, Operand::Imm16 | Operand::PtrImm16);
        needs(self.lhs) || needs(self.rhs)
    }

    fn set(&mut self, opcode: Opcode, lhs: Operand, rhs: Operand) {
        self.opcode = opcode;
        self.lhs = lhs;
        self.rhs = rhs;
    }

    /// The second byte after a CB prefix. Bits 7-6 pick the group, bits 5-3
    /// the rotate/shift operation or the bit index, bits 2-0 the register.
    fn decode_cb(&mut self, opcode: u8) {
        let reg = R[z(opcode) as usize];

        match x(opcode) {
            0 => self.set(ROT[y(opcode) as usize], reg, Operand::None),
            1 => {
                self.set(Opcode::Bit, Operand::Imm8, reg);
                self.imm8 = Some(y(opcode));
            }
            2 => {
                self.set(Opcode::Res, Operand::Imm8, reg);
                self.imm8 = Some(y(opcode));
            }
            3 => {
                self.set(Opcode::Set, Operand::Imm8, reg);
                self.imm8 = Some(y(opcode));
            }
            _ => unreachable!(),
        }
    }

    /// The 8-bit register-to-register load quadrant. The slot where
    /// `LD (HL), (HL)` would sit is repurposed as HALT.
    fn decode_ld_8bit(&mut self, opcode: u8) {
        debug_assert_eq!(x(opcode), 1);

        if opcode == 0x76 {
            self.set(Opcode::Halt, Operand::None, Operand::None);
            return;
        }

        self.set(Opcode::Ld, R[y(opcode) as usize], R[z(opcode) as usize]);
    }

    /// The register-ALU quadrant. A is the implied destination; the unary
    /// forms (SUB, AND, XOR, OR, CP) just carry the operand.
    fn decode_alu(&mut self, opcode: u8) {
        debug_assert_eq!(x(opcode), 2);

        let reg = R[z(opcode) as usize];

        match y(opcode) {
            0 => self.set(Opcode::Add, Operand::A, reg),
            1 => self.set(Opcode::Adc, Operand::A, reg),
            2 => self.set(Opcode::Sub, reg, Operand::None),
            3 => self.set(Opcode::Sbc, Operand::A, reg),
            4 => self.set(Opcode::And, reg, Operand::None),
            5 => self.set(Opcode::Xor, reg, Operand::None),
            6 => self.set(Opcode::Or, reg, Operand::None),
            7 => self.set(Opcode::Cp, reg, Operand::None),
            _ => unreachable!(),
        }
    }

    fn rst(&mut self, target: u8) {
        self.set(Opcode::Rst, Operand::Imm8, Operand::None);
        self.imm8 = Some(target);
    }

    #[rustfmt::skip]
    fn decode_assorted(&mut self, opcode: u8) {
        use Opcode::*;
        use Operand::*;

        match opcode {
            0x00 => self.set(Nop, None, None),
            0x01 => self.set(Ld, Bc, Imm16),
            0x02 => self.set(Ld, PtrBc, A),
            0x03 => self.set(Inc, Bc, None),
            0x04 => self.set(Inc, B, None),
            0x05 => self.set(Dec, B, None),
            0x06 => self.set(Ld, B, Imm8),
            0x07 => self.set(Rlca, None, None),
            0x08 => self.set(Ld, PtrImm16, Sp),
            0x09 => self.set(Add, Hl, Bc),
            0x0a => self.set(Ld, A, PtrBc),
            0x0b => self.set(Dec, Bc, None),
            0x0c => self.set(Inc, C, None),
            0x0d => self.set(Dec, C, None),
            0x0e => self.set(Ld, C, Imm8),
            0x0f => self.set(Rrca, None, None),
            0x10 => self.set(Stop, None, None),
            0x11 => self.set(Ld, De, Imm16),
            0x12 => self.set(Ld, PtrDe, A),
            0x13 => self.set(Inc, De, None),
            0x14 => self.set(Inc, D, None),
            0x15 => self.set(Dec, D, None),
            0x16 => self.set(Ld, D, Imm8),
            0x17 => self.set(Rla, None, None),
            0x18 => self.set(Jr, Imm8Sign, None),
            0x19 => self.set(Add, Hl, De),
            0x1a => self.set(Ld, A, PtrDe),
            0x1b => self.set(Dec, De, None),
            0x1c => self.set(Inc, E, None),
            0x1d => self.set(Dec, E, None),
            0x1e => self.set(Ld, E, Imm8),
            0x1f => self.set(Rra, None, None),
            0x20 => self.set(Jr, FlagNz, Imm8Sign),
            0x21 => self.set(Ld, Hl, Imm16),
            0x22 => self.set(Ldi, PtrHl, A),
            0x23 => self.set(Inc, Hl, None),
            0x24 => self.set(Inc, H, None),
            0x25 => self.set(Dec, H, None),
            0x26 => self.set(Ld, H, Imm8),
            0x27 => self.set(Daa, None, None),
            0x28 => self.set(Jr, FlagZ, Imm8Sign),
            0x29 => self.set(Add, Hl, Hl),
            0x2a => self.set(Ldi, A, PtrHl),
            0x2b => self.set(Dec, Hl, None),
            0x2c => self.set(Inc, L, None),
            0x2d => self.set(Dec, L, None),
            0x2e => self.set(Ld, L, Imm8),
            0x2f => self.set(Cpl, None, None),
            0x30 => self.set(Jr, FlagNc, Imm8Sign),
            0x31 => self.set(Ld, Sp, Imm16),
            0x32 => self.set(Ldd, PtrHl, A),
            0x33 => self.set(Inc, Sp, None),
            0x34 => self.set(Inc, PtrHl, None),
            0x35 => self.set(Dec, PtrHl, None),
            0x36 => self.set(Ld, PtrHl, Imm8),
            0x37 => self.set(Scf, None, None),
            0x38 => self.set(Jr, FlagC, Imm8Sign),
            0x39 => self.set(Add, Hl, Sp),
            0x3a => self.set(Ldd, A, PtrHl),
            0x3b => self.set(Dec, Sp, None),
            0x3c => self.set(Inc, A, None),
            0x3d => self.set(Dec, A, None),
            0x3e => self.set(Ld, A, Imm8),
            0x3f => self.set(Ccf, None, None),
            0xc0 => self.set(Ret, FlagNz, None),
            0xc1 => self.set(Pop, Bc, None),
            0xc2 => self.set(Jp, FlagNz, Imm16),
            0xc3 => self.set(Jp, Imm16, None),
            0xc4 => self.set(Call, FlagNz, Imm16),
            0xc5 => self.set(Push, Bc, None),
            0xc6 => self.set(Add, A, Imm8),
            0xc7 => self.rst(0x00),
            0xc8 => self.set(Ret, FlagZ, None),
            0xc9 => self.set(Ret, None, None),
            0xca => self.set(Jp, FlagZ, Imm16),
            0xcc => self.set(Call, FlagZ, Imm16),
            0xcd => self.set(Call, Imm16, None),
            0xce => self.set(Adc, A, Imm8),
            0xcf => self.rst(0x08),
            0xd0 => self.set(Ret, FlagNc, None),
            0xd1 => self.set(Pop, De, None),
            0xd2 => self.set(Jp, FlagNc, Imm16),
            0xd4 => self.set(Call, FlagNc, Imm16),
            0xd5 => self.set(Push, De, None),
            0xd6 => self.set(Sub, Imm8, None),
            0xd7 => self.rst(0x10),
            0xd8 => self.set(Ret, FlagC, None),
            0xd9 => self.set(Reti, None, None),
            0xda => self.set(Jp, FlagC, Imm16),
            0xdc => self.set(Call, FlagC, Imm16),
            0xde => self.set(Sbc, A, Imm8),
            0xdf => self.rst(0x18),
            0xe0 => self.set(Ldh, PtrImm8, A),
            0xe1 => self.set(Pop, Hl, None),
            0xe2 => self.set(Ld, PtrC, A),
            0xe5 => self.set(Push, Hl, None),
            0xe6 => self.set(And, Imm8, None),
            0xe7 => self.rst(0x20),
            0xe8 => self.set(Add, Sp, Imm8Sign),
            0xe9 => self.set(Jp, PtrHl, None),
            0xea => self.set(Ld, PtrImm16, A),
            0xee => self.set(Xor, Imm8, None),
            0xef => self.rst(0x28),
            0xf0 => self.set(Ldh, A, PtrImm8),
            0xf1 => self.set(Pop, Af, None),
            0xf2 => self.set(Ld, A, PtrC),
            0xf3 => self.set(Di, None, None),
            0xf5 => self.set(Push, Af, None),
            0xf6 => self.set(Or, Imm8, None),
            0xf7 => self.rst(0x30),
            0xf8 => self.set(Ldhl, Sp, Imm8Sign),
            0xf9 => self.set(Ld, Sp, Hl),
            0xfa => self.set(Ld, A, PtrImm16),
            0xfb => self.set(Ei, None, None),
            0xfe => self.set(Cp, Imm8, None),
            0xff => self.rst(0x38),

            _ => {
                log::error!("Unknown instruction {:#04x}, treating as NOP", opcode);
                self.set(Nop, None, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs `bytes` through a fresh decoder; exactly the last byte must
    /// publish an instruction.
    fn decode(bytes: &[u8]) -> Instruction {
        let mut decoder = Decoder::new();

        for &byte in &bytes[..bytes.len() - 1] {
            assert!(decoder.step(byte).is_none());
            assert!(decoder.mid_instruction());
        }

        let instruction = decoder.step(bytes[bytes.len() - 1]).expect("not published");
        assert!(!decoder.mid_instruction());
        instruction
    }

    #[test]
    fn single_byte_loads() {
        let inst = decode(&[0x41]);
        assert_eq!(inst.opcode(), Opcode::Ld);
        assert_eq!(inst.lhs(), Operand::B);
        assert_eq!(inst.rhs(), Operand::C);

        let inst = decode(&[0x7e]);
        assert_eq!(inst.opcode(), Opcode::Ld);
        assert_eq!(inst.lhs(), Operand::A);
        assert_eq!(inst.rhs(), Operand::PtrHl);
    }

    #[test]
    fn the_ld_hl_hl_slot_is_halt() {
        assert_eq!(decode(&[0x76]).opcode(), Opcode::Halt);
    }

    #[test]
    fn alu_row_decodes_by_bits_5_to_3() {
        let inst = decode(&[0x80]);
        assert_eq!(inst.opcode(), Opcode::Add);
        assert_eq!(inst.lhs(), Operand::A);
        assert_eq!(inst.rhs(), Operand::B);

        let inst = decode(&[0x96]);
        assert_eq!(inst.opcode(), Opcode::Sub);
        assert_eq!(inst.lhs(), Operand::PtrHl);

        let inst = decode(&[0xbf]);
        assert_eq!(inst.opcode(), Opcode::Cp);
        assert_eq!(inst.lhs(), Operand::A);
    }

    #[test]
    fn immediate8_takes_two_ticks() {
        let inst = decode(&[0x3e, 0x42]);
        assert_eq!(inst.opcode(), Opcode::Ld);
        assert_eq!(inst.lhs(), Operand::A);
        assert_eq!(inst.imm8(), Some(0x42));
    }

    #[test]
    fn immediate16_arrives_low_byte_first() {
        let inst = decode(&[0xc3, 0x34, 0x12]);
        assert_eq!(inst.opcode(), Opcode::Jp);
        assert_eq!(inst.imm16(), Some(0x1234));
    }

    #[test]
    fn signed_immediates_keep_their_sign() {
        let inst = decode(&[0x18, 0xfe]);
        assert_eq!(inst.opcode(), Opcode::Jr);
        assert_eq!(inst.imm8sign(), Some(-2));
    }

    #[test]
    fn cb_prefix_decodes_the_second_byte() {
        // SWAP A
        let inst = decode(&[0xcb, 0x37]);
        assert_eq!(inst.opcode(), Opcode::Swap);
        assert_eq!(inst.lhs(), Operand::A);

        // RLC (HL)
        let inst = decode(&[0xcb, 0x06]);
        assert_eq!(inst.opcode(), Opcode::Rlc);
        assert_eq!(inst.lhs(), Operand::PtrHl);

        // SRL B
        let inst = decode(&[0xcb, 0x38]);
        assert_eq!(inst.opcode(), Opcode::Srl);
        assert_eq!(inst.lhs(), Operand::B);
    }

    #[test]
    fn cb_bit_group_carries_the_bit_index() {
        // BIT 7, H
        let inst = decode(&[0xcb, 0x7c]);
        assert_eq!(inst.opcode(), Opcode::Bit);
        assert_eq!(inst.imm8(), Some(7));
        assert_eq!(inst.rhs(), Operand::H);

        // RES 0, A
        let inst = decode(&[0xcb, 0x87]);
        assert_eq!(inst.opcode(), Opcode::Res);
        assert_eq!(inst.imm8(), Some(0));
        assert_eq!(inst.rhs(), Operand::A);

        // SET 3, (HL)
        let inst = decode(&[0xcb, 0xde]);
        assert_eq!(inst.opcode(), Opcode::Set);
        assert_eq!(inst.imm8(), Some(3));
        assert_eq!(inst.rhs(), Operand::PtrHl);
    }

    #[test]
    fn rst_publishes_with_its_vector_prefilled() {
        let inst = decode(&[0xef]);
        assert_eq!(inst.opcode(), Opcode::Rst);
        assert_eq!(inst.imm8(), Some(0x28));
    }

    #[test]
    fn unknown_opcodes_fall_back_to_nop() {
        assert_eq!(decode(&[0xd3]).opcode(), Opcode::Nop);
        assert_eq!(decode(&[0xfd]).opcode(), Opcode::Nop);
    }

    #[test]
    fn decoding_continues_after_an_unknown_opcode() {
        let mut decoder = Decoder::new();
        decoder.step(0xd3);
        let inst = decoder.step(0x04).unwrap();
        assert_eq!(inst.opcode(), Opcode::Inc);
        assert_eq!(inst.lhs(), Operand::B);
    }
}
