//! The decoded form of an instruction: an opcode, up to two operand tags,
//! and whatever immediates the byte stream carried. Tags are resolved to
//! actual registers or memory cells by the executor, not here.

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Opcode {
    Adc,
    Add,
    And,
    Bit,
    Call,
    Ccf,
    Cp,
    Cpl,
    Daa,
    Dec,
    Di,
    Ei,
    Halt,
    Inc,
    Jp,
    Jr,
    Ld,
    Ldd,
    Ldh,
    Ldhl,
    Ldi,
    Nop,
    Or,
    Pop,
    Push,
    Res,
    Ret,
    Reti,
    Rl,
    Rla,
    Rlc,
    Rlca,
    Rr,
    Rra,
    Rrc,
    Rrca,
    Rst,
    Sbc,
    Scf,
    Set,
    Sla,
    Sra,
    Srl,
    Stop,
    Sub,
    Swap,
    Xor,
}

/// Operand tags. `Ptr*` variants address memory through the named value;
/// the high-memory forms (`PtrC`, `PtrImm8`) are biased by 0xff00.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Operand {
    None,
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    Af,
    Bc,
    De,
    Hl,
    Sp,
    PtrBc,
    PtrDe,
    PtrHl,
    PtrC,
    Imm8,
    Imm8Sign,
    PtrImm8,
    Imm16,
    PtrImm16,
    FlagZ,
    FlagNz,
    FlagC,
    FlagNc,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Instruction {
    opcode: Opcode,
    lhs: Operand,
    rhs: Operand,
    imm8: Option<u8>,
    imm8sign: Option<i8>,
    imm16: Option<u16>,
}

impl Instruction {
    pub fn new(opcode: Opcode, lhs: Operand, rhs: Operand) -> Instruction {
        // rhs without lhs would make the operand slots ambiguous.
        debug_assert!(!(lhs == Operand::None && rhs != Operand::None));

        Instruction {
            opcode,
            lhs,
            rhs,
            imm8: None,
            imm8sign: None,
            imm16: None,
        }
    }

    pub fn with_imm8(opcode: Opcode, lhs: Operand, rhs: Operand, imm8: u8) -> Instruction {
        Instruction {
            imm8: Some(imm8),
            ..Instruction::new(opcode, lhs, rhs)
        }
    }

    pub fn with_imm8sign(opcode: Opcode, lhs: Operand, rhs: Operand, imm8sign: i8) -> Instruction {
        Instruction {
            imm8sign: Some(imm8sign),
            ..Instruction::new(opcode, lhs, rhs)
        }
    }

    pub fn with_imm16(opcode: Opcode, lhs: Operand, rhs: Operand, imm16: u16) -> Instruction {
        Instruction {
            imm16: Some(imm16),
            ..Instruction::new(opcode, lhs, rhs)
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn lhs(&self) -> Operand {
        self.lhs
    }

    pub fn rhs(&self) -> Operand {
        self.rhs
    }

    pub fn imm8(&self) -> Option<u8> {
        self.imm8
    }

    pub fn imm8sign(&self) -> Option<i8> {
        self.imm8sign
    }

    pub fn imm16(&self) -> Option<u16> {
        self.imm16
    }

    fn fmt_operand(&self, operand: Operand, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match operand {
            Operand::None => Ok(()),
            Operand::A => write!(f, "A"),
            Operand::B => write!(f, "B"),
            Operand::C => write!(f, "C"),
            Operand::D => write!(f, "D"),
            Operand::E => write!(f, "E"),
            Operand::H => write!(f, "H"),
            Operand::L => write!(f, "L"),
            Operand::Af => write!(f, "AF"),
            Operand::Bc => write!(f, "BC"),
            Operand::De => write!(f, "DE"),
            Operand::Hl => write!(f, "HL"),
            Operand::Sp => write!(f, "SP"),
            Operand::PtrBc => write!(f, "(BC)"),
            Operand::PtrDe => write!(f, "(DE)"),
            Operand::PtrHl => write!(f, "(HL)"),
            Operand::PtrC => write!(f, "(C)"),
            Operand::FlagZ => write!(f, "Z"),
            Operand::FlagNz => write!(f, "NZ"),
            Operand::FlagC => write!(f, "C"),
            Operand::FlagNc => write!(f, "NC"),
            Operand::Imm8 => write!(f, "{:#04x}", self.imm8.unwrap_or(0)),
            Operand::Imm8Sign => write!(f, "{}", self.imm8sign.unwrap_or(0)),
            Operand::PtrImm8 => write!(f, "({:#04x})", self.imm8.unwrap_or(0)),
            Operand::Imm16 => write!(f, "{:#06x}", self.imm16.unwrap_or(0)),
            Operand::PtrImm16 => write!(f, "({:#06x})", self.imm16.unwrap_or(0)),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.opcode {
            Opcode::Adc => "ADC",
            Opcode::Add => "ADD",
            Opcode::And => "AND",
            Opcode::Bit => "BIT",
            Opcode::Call => "CALL",
            Opcode::Ccf => "CCF",
            Opcode::Cp => "CP",
            Opcode::Cpl => "CPL",
            Opcode::Daa => "DAA",
            Opcode::Dec => "DEC",
            Opcode::Di => "DI",
            Opcode::Ei => "EI",
            Opcode::Halt => "HALT",
            Opcode::Inc => "INC",
            Opcode::Jp => "JP",
            Opcode::Jr => "JR",
            Opcode::Ld => "LD",
            Opcode::Ldd => "LDD",
            Opcode::Ldh => "LDH",
            Opcode::Ldhl => "LDHL",
            Opcode::Ldi => "LDI",
            Opcode::Nop => "NOP",
            Opcode::Or => "OR",
            Opcode::Pop => "POP",
            Opcode::Push => "PUSH",
            Opcode::Res => "RES",
            Opcode::Ret => "RET",
            Opcode::Reti => "RETI",
            Opcode::Rl => "RL",
            Opcode::Rla => "RLA",
            Opcode::Rlc => "RLC",
            Opcode::Rlca => "RLCA",
            Opcode::Rr => "RR",
            Opcode::Rra => "RRA",
            Opcode::Rrc => "RRC",
            Opcode::Rrca => "RRCA",
            Opcode::Rst => "RST",
            Opcode::Sbc => "SBC",
            Opcode::Scf => "SCF",
            Opcode::Set => "SET",
            Opcode::Sla => "SLA",
            Opcode::Sra => "SRA",
            Opcode::Srl => "SRL",
            Opcode::Stop => "STOP",
            Opcode::Sub => "SUB",
            Opcode::Swap => "SWAP",
            Opcode::Xor => "XOR",
        };

        write!(f, "{}", name)?;

        if self.lhs != Operand::None {
            write!(f, " ")?;
            self.fmt_operand(self.lhs, f)?;
        }

        if self.rhs != Operand::None {
            write!(f, ", ")?;
            self.fmt_operand(self.rhs, f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_like_an_assembler_listing() {
        assert_eq!(
            Instruction::new(Opcode::Ld, Operand::A, Operand::B).to_string(),
            "LD A, B"
        );
        assert_eq!(Instruction::new(Opcode::Nop, Operand::None, Operand::None).to_string(), "NOP");
        assert_eq!(
            Instruction::with_imm16(Opcode::Jp, Operand::Imm16, Operand::None, 0x150).to_string(),
            "JP 0x0150"
        );
        assert_eq!(
            Instruction::with_imm8sign(Opcode::Jr, Operand::FlagNz, Operand::Imm8Sign, -2)
                .to_string(),
            "JR NZ, -2"
        );
        assert_eq!(
            Instruction::with_imm8(Opcode::Ldh, Operand::PtrImm8, Operand::A, 0x47).to_string(),
            "LDH (0x47), A"
        );
    }
}
