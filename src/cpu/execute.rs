//! Execution of decoded instructions. Operand tags are resolved to real
//! registers, immediates or memory cells right here, with one match per
//! access; every opcode then works through the same `read8`/`write8`
//! helpers regardless of where its operands actually live.
//!
//! A tag that reaches a resolver it was never meant for is a decoder bug,
//! not a guest error, and panics.

use super::instruction::{Instruction, Opcode, Operand};
use super::registers::Flags;
use super::Cpu;
use crate::memory::Memory;

fn low_nibble(value: u8) -> u8 {
    value & 0x0f
}

impl Cpu {
    pub(super) fn execute_instruction(&mut self, inst: Instruction) {
        match inst.opcode() {
            Opcode::Nop => {}
            Opcode::Ld => self.ld(inst),
            Opcode::Ldh => self.ld(inst),
            Opcode::Ldi => self.ldi(inst),
            Opcode::Ldd => self.ldd(inst),
            Opcode::Ldhl => self.ldhl(inst),
            Opcode::Add => self.add(inst),
            Opcode::Adc => self.adc(inst),
            Opcode::Sub => self.sub(inst),
            Opcode::Sbc => self.sbc(inst),
            Opcode::And => self.and(inst),
            Opcode::Or => self.or(inst),
            Opcode::Xor => self.xor(inst),
            Opcode::Cp => self.cp(inst),
            Opcode::Inc => self.inc(inst),
            Opcode::Dec => self.dec(inst),
            Opcode::Rlca => self.rlca(),
            Opcode::Rla => self.rla(),
            Opcode::Rrca => self.rrca(),
            Opcode::Rra => self.rra(),
            Opcode::Rlc => self.rlc(inst, inst.lhs()),
            Opcode::Rl => self.rl(inst, inst.lhs()),
            Opcode::Rrc => self.rrc(inst, inst.lhs()),
            Opcode::Rr => self.rr(inst, inst.lhs()),
            Opcode::Sla => self.sla(inst),
            Opcode::Sra => self.sra(inst),
            Opcode::Srl => self.srl(inst),
            Opcode::Swap => self.swap(inst),
            Opcode::Bit => self.bit(inst),
            Opcode::Res => self.res(inst),
            Opcode::Set => self.set(inst),
            Opcode::Daa => self.daa(),
            Opcode::Cpl => self.cpl(),
            Opcode::Scf => self.scf(),
            Opcode::Ccf => self.ccf(),
            Opcode::Jp => self.jp(inst),
            Opcode::Jr => self.jr(inst),
            Opcode::Call => self.call(inst),
            Opcode::Ret => self.ret(inst),
            Opcode::Reti => self.reti(inst),
            Opcode::Rst => self.rst(inst),
            Opcode::Push => self.push(inst),
            Opcode::Pop => self.pop(inst),
            Opcode::Di => self.di(),
            Opcode::Ei => self.ei(),
            Opcode::Halt => self.halt(),
            Opcode::Stop => self.stop(),
        }
    }

    // ---- Operand resolution --------------------------------------------

    fn is_operand8(operand: Operand) -> bool {
        matches!(
            operand,
            Operand::A
                | Operand::B
                | Operand::C
                | Operand::D
                | Operand::E
                | Operand::H
                | Operand::L
                | Operand::PtrBc
                | Operand::PtrDe
                | Operand::PtrHl
                | Operand::PtrC
                | Operand::Imm8
                | Operand::PtrImm8
                | Operand::PtrImm16
        )
    }

    fn is_operand16(operand: Operand) -> bool {
        matches!(
            operand,
            Operand::Af | Operand::Bc | Operand::De | Operand::Hl | Operand::Sp | Operand::Imm16
        )
    }

    fn imm8(&self, inst: Instruction) -> u8 {
        inst.imm8().expect("instruction carries no 8-bit immediate")
    }

    fn imm8sign(&self, inst: Instruction) -> i8 {
        inst.imm8sign()
            .expect("instruction carries no signed immediate")
    }

    fn imm16(&self, inst: Instruction) -> u16 {
        inst.imm16().expect("instruction carries no 16-bit immediate")
    }

    fn read8(&mut self, inst: Instruction, operand: Operand) -> u8 {
        match operand {
            Operand::A => self.reg.a,
            Operand::B => self.reg.b,
            Operand::C => self.reg.c,
            Operand::D => self.reg.d,
            Operand::E => self.reg.e,
            Operand::H => self.reg.h,
            Operand::L => self.reg.l,
            Operand::PtrBc => self.bus.borrow().read(self.reg.bc()),
            Operand::PtrDe => self.bus.borrow().read(self.reg.de()),
            Operand::PtrHl => self.bus.borrow().read(self.reg.hl()),
            Operand::PtrC => self.bus.borrow().read(0xff00 + self.reg.c as u16),
            Operand::Imm8 => self.imm8(inst),
            Operand::PtrImm8 => self.bus.borrow().read(0xff00 + self.imm8(inst) as u16),
            Operand::PtrImm16 => self.bus.borrow().read(self.imm16(inst)),
            _ => panic!("operand {:?} is not an 8-bit source", operand),
        }
    }

    fn write8(&mut self, inst: Instruction, operand: Operand, value: u8) {
        match operand {
            Operand::A => self.reg.a = value,
            Operand::B => self.reg.b = value,
            Operand::C => self.reg.c = value,
            Operand::D => self.reg.d = value,
            Operand::E => self.reg.e = value,
            Operand::H => self.reg.h = value,
            Operand::L => self.reg.l = value,
            Operand::PtrBc => self.bus.borrow_mut().write(self.reg.bc(), value),
            Operand::PtrDe => self.bus.borrow_mut().write(self.reg.de(), value),
            Operand::PtrHl => self.bus.borrow_mut().write(self.reg.hl(), value),
            Operand::PtrC => {
                let addr = 0xff00 + self.reg.c as u16;
                self.bus.borrow_mut().write(addr, value)
            }
            Operand::PtrImm8 => {
                let addr = 0xff00 + self.imm8(inst) as u16;
                self.bus.borrow_mut().write(addr, value)
            }
            Operand::PtrImm16 => {
                let addr = self.imm16(inst);
                self.bus.borrow_mut().write(addr, value)
            }
            Operand::Imm8 | Operand::Imm8Sign => {
                log::error!("Write to an immediate operand, ignoring")
            }
            _ => panic!("operand {:?} is not an 8-bit sink", operand),
        }
    }

    fn read16(&self, inst: Instruction, operand: Operand) -> u16 {
        match operand {
            Operand::Af => self.reg.af(),
            Operand::Bc => self.reg.bc(),
            Operand::De => self.reg.de(),
            Operand::Hl => self.reg.hl(),
            Operand::Sp => self.reg.sp,
            Operand::Imm16 => self.imm16(inst),
            _ => panic!("operand {:?} is not a 16-bit source", operand),
        }
    }

    fn write16(&mut self, operand: Operand, value: u16) {
        match operand {
            Operand::Af => self.reg.set_af(value),
            Operand::Bc => self.reg.set_bc(value),
            Operand::De => self.reg.set_de(value),
            Operand::Hl => self.reg.set_hl(value),
            Operand::Sp => self.reg.sp = value,
            Operand::Imm16 => log::error!("Write to an immediate operand, ignoring"),
            _ => panic!("operand {:?} is not a 16-bit sink", operand),
        }
    }

    /// Evaluates a condition-code tag against F, or None for operands that
    /// are not conditions.
    fn condition(&self, operand: Operand) -> Option<bool> {
        match operand {
            Operand::FlagZ => Some(self.reg.flags.contains(Flags::Z)),
            Operand::FlagNz => Some(!self.reg.flags.contains(Flags::Z)),
            Operand::FlagC => Some(self.reg.flags.contains(Flags::C)),
            Operand::FlagNc => Some(!self.reg.flags.contains(Flags::C)),
            _ => None,
        }
    }

    // ---- Loads ----------------------------------------------------------

    fn ld(&mut self, inst: Instruction) {
        let (lhs, rhs) = (inst.lhs(), inst.rhs());

        // LD (a16), SP stores both halves of SP; it is the only 16-bit
        // store through a pointer operand.
        if lhs == Operand::PtrImm16 && rhs == Operand::Sp {
            let addr = self.imm16(inst);
            self.bus.borrow_mut().write16(addr, self.reg.sp);
            return;
        }

        if Cpu::is_operand8(lhs) && Cpu::is_operand8(rhs) {
            let value = self.read8(inst, rhs);
            self.write8(inst, lhs, value);
        } else if Cpu::is_operand16(lhs) && Cpu::is_operand16(rhs) {
            let value = self.read16(inst, rhs);
            self.write16(lhs, value);
        } else {
            panic!("LD with mismatched operands: {}", inst);
        }
    }

    fn ldi(&mut self, inst: Instruction) {
        self.ld(inst);
        self.reg.set_hl(self.reg.hl().wrapping_add(1));
    }

    fn ldd(&mut self, inst: Instruction) {
        self.ld(inst);
        self.reg.set_hl(self.reg.hl().wrapping_sub(1));
    }

    /// LDHL SP, e: HL = SP + e with the add-low flag rules.
    fn ldhl(&mut self, inst: Instruction) {
        let sp = self.reg.sp;
        let offset = self.imm8sign(inst);
        let result = self.sp_plus_offset(sp, offset);
        self.reg.set_hl(result);
    }

    /// Shared by ADD SP, e and LDHL SP, e: 16-bit result, but H and C come
    /// from bits 3 and 7 of the low byte.
    fn sp_plus_offset(&mut self, sp: u16, offset: i8) -> u16 {
        let offset = offset as i32;
        let result = (sp as i32 + offset) as u16;

        self.reg.flags.remove(Flags::Z | Flags::N);
        self.reg
            .flags
            .set(Flags::H, (sp & 0x000f) as i32 + (offset & 0x0f) > 0x000f);
        self.reg
            .flags
            .set(Flags::C, (sp & 0x00ff) as i32 + (offset & 0xff) > 0x00ff);

        result
    }

    // ---- 8-bit arithmetic ----------------------------------------------

    fn add(&mut self, inst: Instruction) {
        match inst.lhs() {
            Operand::A => {
                let x = self.reg.a;
                let y = self.read8(inst, inst.rhs());
                let result = x.wrapping_add(y);
                self.reg.a = result;

                self.reg.flags.set(Flags::Z, result == 0);
                self.reg.flags.remove(Flags::N);
                self.reg
                    .flags
                    .set(Flags::H, low_nibble(x) + low_nibble(y) > 0x0f);
                self.reg.flags.set(Flags::C, x as u16 + y as u16 > 0xff);
            }
            Operand::Hl => {
                let x = self.reg.hl();
                let y = self.read16(inst, inst.rhs());
                let (result, carry) = x.overflowing_add(y);
                self.reg.set_hl(result);

                self.reg.flags.remove(Flags::N);
                self.reg
                    .flags
                    .set(Flags::H, (x & 0x0fff) + (y & 0x0fff) > 0x0fff);
                self.reg.flags.set(Flags::C, carry);
            }
            Operand::Sp => {
                let offset = self.imm8sign(inst);
                self.reg.sp = self.sp_plus_offset(self.reg.sp, offset);
            }
            other => panic!("ADD with destination {:?}", other),
        }
    }

    fn adc(&mut self, inst: Instruction) {
        let x = self.reg.a;
        let y = self.read8(inst, inst.rhs());
        let carry = self.reg.flags.contains(Flags::C) as u8;
        let result = x.wrapping_add(y).wrapping_add(carry);
        self.reg.a = result;

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N);
        self.reg
            .flags
            .set(Flags::H, low_nibble(x) + low_nibble(y) + carry > 0x0f);
        self.reg
            .flags
            .set(Flags::C, x as u16 + y as u16 + carry as u16 > 0xff);
    }

    fn sub(&mut self, inst: Instruction) {
        let result = self.compare(inst);
        self.reg.a = result;
    }

    /// CP is SUB that throws the difference away.
    fn cp(&mut self, inst: Instruction) {
        self.compare(inst);
    }

    fn compare(&mut self, inst: Instruction) -> u8 {
        let x = self.reg.a;
        let y = self.read8(inst, inst.lhs());
        let result = x.wrapping_sub(y);

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.insert(Flags::N);
        self.reg.flags.set(Flags::H, low_nibble(x) < low_nibble(y));
        self.reg.flags.set(Flags::C, x < y);

        result
    }

    fn sbc(&mut self, inst: Instruction) {
        let x = self.reg.a;
        let y = self.read8(inst, inst.rhs());
        let carry = self.reg.flags.contains(Flags::C) as u8;
        let result = x.wrapping_sub(y).wrapping_sub(carry);
        self.reg.a = result;

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.insert(Flags::N);
        self.reg
            .flags
            .set(Flags::H, low_nibble(x) < low_nibble(y) + carry);
        // Borrow happens outright, or on the carry when x == y.
        self.reg
            .flags
            .set(Flags::C, x < y || (x == y && carry == 1));
    }

    fn and(&mut self, inst: Instruction) {
        let result = self.reg.a & self.read8(inst, inst.lhs());
        self.reg.a = result;

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::C);
        self.reg.flags.insert(Flags::H);
    }

    fn or(&mut self, inst: Instruction) {
        let result = self.reg.a | self.read8(inst, inst.lhs());
        self.reg.a = result;

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::H | Flags::C);
    }

    fn xor(&mut self, inst: Instruction) {
        let result = self.reg.a ^ self.read8(inst, inst.lhs());
        self.reg.a = result;

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::H | Flags::C);
    }

    fn inc(&mut self, inst: Instruction) {
        let operand = inst.lhs();

        if Cpu::is_operand8(operand) {
            let value = self.read8(inst, operand);
            let result = value.wrapping_add(1);
            self.write8(inst, operand, result);

            self.reg.flags.set(Flags::Z, result == 0);
            self.reg.flags.remove(Flags::N);
            // 0b1111 + 1 is the only low-nibble combination that carries.
            self.reg.flags.set(Flags::H, low_nibble(value) == 0x0f);
        } else {
            let value = self.read16(inst, operand);
            self.write16(operand, value.wrapping_add(1));
        }
    }

    fn dec(&mut self, inst: Instruction) {
        let operand = inst.lhs();

        if Cpu::is_operand8(operand) {
            let value = self.read8(inst, operand);
            let result = value.wrapping_sub(1);
            self.write8(inst, operand, result);

            self.reg.flags.set(Flags::Z, result == 0);
            self.reg.flags.insert(Flags::N);
            // 0b0000 - 1 is the only low-nibble combination that borrows.
            self.reg.flags.set(Flags::H, low_nibble(value) == 0x00);
        } else {
            let value = self.read16(inst, operand);
            self.write16(operand, value.wrapping_sub(1));
        }
    }

    // ---- Rotates, shifts, bit operations -------------------------------

    fn rlc(&mut self, inst: Instruction, operand: Operand) {
        let value = self.read8(inst, operand);
        let result = value.rotate_left(1);
        self.write8(inst, operand, result);

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::H);
        self.reg.flags.set(Flags::C, value >> 7 == 1);
    }

    fn rl(&mut self, inst: Instruction, operand: Operand) {
        let value = self.read8(inst, operand);
        let carry = self.reg.flags.contains(Flags::C) as u8;
        let result = (value << 1) | carry;
        self.write8(inst, operand, result);

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::H);
        self.reg.flags.set(Flags::C, value >> 7 == 1);
    }

    fn rrc(&mut self, inst: Instruction, operand: Operand) {
        let value = self.read8(inst, operand);
        let result = value.rotate_right(1);
        self.write8(inst, operand, result);

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::H);
        self.reg.flags.set(Flags::C, value & 1 == 1);
    }

    fn rr(&mut self, inst: Instruction, operand: Operand) {
        let value = self.read8(inst, operand);
        let carry = self.reg.flags.contains(Flags::C) as u8;
        let result = (value >> 1) | (carry << 7);
        self.write8(inst, operand, result);

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::H);
        self.reg.flags.set(Flags::C, value & 1 == 1);
    }

    // The A-register rotate shorthands differ from their CB forms in one
    // way only: they always clear Z.

    fn rlca(&mut self) {
        self.rlc(
            Instruction::new(Opcode::Rlca, Operand::A, Operand::None),
            Operand::A,
        );
        self.reg.flags.remove(Flags::Z);
    }

    fn rla(&mut self) {
        self.rl(
            Instruction::new(Opcode::Rla, Operand::A, Operand::None),
            Operand::A,
        );
        self.reg.flags.remove(Flags::Z);
    }

    fn rrca(&mut self) {
        self.rrc(
            Instruction::new(Opcode::Rrca, Operand::A, Operand::None),
            Operand::A,
        );
        self.reg.flags.remove(Flags::Z);
    }

    fn rra(&mut self) {
        self.rr(
            Instruction::new(Opcode::Rra, Operand::A, Operand::None),
            Operand::A,
        );
        self.reg.flags.remove(Flags::Z);
    }

    fn sla(&mut self, inst: Instruction) {
        let value = self.read8(inst, inst.lhs());
        let result = value << 1;
        self.write8(inst, inst.lhs(), result);

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::H);
        self.reg.flags.set(Flags::C, value >> 7 == 1);
    }

    fn sra(&mut self, inst: Instruction) {
        let value = self.read8(inst, inst.lhs());
        // Arithmetic shift: bit 7 stays put.
        let result = (value >> 1) | (value & 0x80);
        self.write8(inst, inst.lhs(), result);

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::H);
        self.reg.flags.set(Flags::C, value & 1 == 1);
    }

    fn srl(&mut self, inst: Instruction) {
        let value = self.read8(inst, inst.lhs());
        let result = value >> 1;
        self.write8(inst, inst.lhs(), result);

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::H);
        self.reg.flags.set(Flags::C, value & 1 == 1);
    }

    fn swap(&mut self, inst: Instruction) {
        let value = self.read8(inst, inst.lhs());
        let result = value.rotate_left(4);
        self.write8(inst, inst.lhs(), result);

        self.reg.flags.set(Flags::Z, result == 0);
        self.reg.flags.remove(Flags::N | Flags::H | Flags::C);
    }

    fn bit(&mut self, inst: Instruction) {
        let index = self.imm8(inst);
        let value = self.read8(inst, inst.rhs());

        self.reg.flags.set(Flags::Z, value & (1 << index) == 0);
        self.reg.flags.remove(Flags::N);
        self.reg.flags.insert(Flags::H);
    }

    fn res(&mut self, inst: Instruction) {
        let index = self.imm8(inst);
        let value = self.read8(inst, inst.rhs());
        self.write8(inst, inst.rhs(), value & !(1 << index));
    }

    fn set(&mut self, inst: Instruction) {
        let index = self.imm8(inst);
        let value = self.read8(inst, inst.rhs());
        self.write8(inst, inst.rhs(), value | (1 << index));
    }

    // ---- Accumulator and flag housekeeping -----------------------------

    fn daa(&mut self) {
        let mut a = self.reg.a;

        if !self.reg.flags.contains(Flags::N) {
            if self.reg.flags.contains(Flags::H) || low_nibble(a) > 0x09 {
                // If the +0x06 adjustment itself overflows, the value was
                // in 0xfa..=0xff and the "a > 0x9f" test below would miss
                // it, so fold the overflow into the carry now.
                if 0xff - a < 0x06 {
                    self.reg.flags.insert(Flags::C);
                }
                a = a.wrapping_add(0x06);
            }

            if self.reg.flags.contains(Flags::C) || a > 0x9f {
                a = a.wrapping_add(0x60);
                self.reg.flags.insert(Flags::C);
            }
        } else {
            if self.reg.flags.contains(Flags::H) {
                a = a.wrapping_sub(0x06);
            }

            if self.reg.flags.contains(Flags::C) {
                a = a.wrapping_sub(0x60);
            }
        }

        self.reg.a = a;
        self.reg.flags.set(Flags::Z, a == 0);
        self.reg.flags.remove(Flags::H);
    }

    fn cpl(&mut self) {
        self.reg.a = !self.reg.a;
        self.reg.flags.insert(Flags::N | Flags::H);
    }

    fn scf(&mut self) {
        self.reg.flags.remove(Flags::N | Flags::H);
        self.reg.flags.insert(Flags::C);
    }

    fn ccf(&mut self) {
        self.reg.flags.remove(Flags::N | Flags::H);
        self.reg.flags.toggle(Flags::C);
    }

    // ---- Control flow ---------------------------------------------------

    fn jp(&mut self, inst: Instruction) {
        match inst.lhs() {
            Operand::Imm16 => self.reg.pc = self.imm16(inst),
            // Despite the mnemonic there is no indirection here: PC <- HL.
            Operand::PtrHl => self.reg.pc = self.reg.hl(),
            cond => {
                let taken = self
                    .condition(cond)
                    .unwrap_or_else(|| panic!("JP with operand {:?}", cond));
                if taken {
                    self.reg.pc = self.imm16(inst);
                }
            }
        }
    }

    fn jr(&mut self, inst: Instruction) {
        let taken = match inst.lhs() {
            Operand::Imm8Sign => true,
            cond => self
                .condition(cond)
                .unwrap_or_else(|| panic!("JR with operand {:?}", cond)),
        };

        if taken {
            let offset = self.imm8sign(inst);
            self.reg.pc = self.reg.pc.wrapping_add(offset as u16);
        }
    }

    fn call(&mut self, inst: Instruction) {
        let taken = match inst.lhs() {
            Operand::Imm16 => true,
            cond => self
                .condition(cond)
                .unwrap_or_else(|| panic!("CALL with operand {:?}", cond)),
        };

        if taken {
            let pc = self.reg.pc;
            self.push_to_stack(pc);
            self.reg.pc = self.imm16(inst);
        }
    }

    fn ret(&mut self, inst: Instruction) {
        let taken = match inst.lhs() {
            Operand::None => true,
            cond => self
                .condition(cond)
                .unwrap_or_else(|| panic!("RET with operand {:?}", cond)),
        };

        if taken {
            self.reg.pc = self.pop_from_stack();
        }
    }

    fn reti(&mut self, inst: Instruction) {
        self.ret(inst);
        // Unlike EI, the enable takes effect immediately.
        self.ime = true;
    }

    fn rst(&mut self, inst: Instruction) {
        let target = self.imm8(inst);
        let pc = self.reg.pc;
        self.push_to_stack(pc);
        self.reg.pc = target as u16;
    }

    fn push(&mut self, inst: Instruction) {
        let value = self.read16(inst, inst.lhs());
        self.push_to_stack(value);
    }

    fn pop(&mut self, inst: Instruction) {
        let value = self.pop_from_stack();
        self.write16(inst.lhs(), value);
    }

    // ---- Interrupt master enable, HALT ---------------------------------

    fn di(&mut self) {
        self.ime = false;
        self.ime_countdown = 0;
    }

    /// IME goes high only after the instruction following EI has retired;
    /// the tick loop counts this down.
    fn ei(&mut self) {
        self.ime_countdown = 2;
    }

    fn halt(&mut self) {
        self.halted = true;
    }

    fn stop(&mut self) {
        // Near enough: park like HALT until something wakes us.
        log::info!("STOP executed, parking the CPU");
        self.halted = true;
    }
}
