use crate::numbers::sign_extend;
use std::fmt::{Debug, Formatter};

/// Wrapper for LC-3 u16 instruction.
/// format is: `OOOO_DDD_P_PPPP_PPPP`
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Instruction(u16);

impl Instruction {
    /// Gives the value of only the specified bit range.
    ///
    /// # Parameters
    /// - `from`: starting index
    /// - `to`: end index (inclusive), mut be greater or equal to `from`
    ///
    /// # Panics
    /// - asserts that to is greater or equal from and both are valid indexes
    #[must_use]
    pub fn get_bit_range(self, from: u8, to: u8) -> u16 {
        debug_assert!(
            to >= from,
            "wrong direction of from: {from:?} and to: {to:?}"
        );
        debug_assert!(
            (00..u16::BITS).contains(&u32::from(to)),
            "index: {to:?} to u16 is greater than maximum value {:?}",
            u16::BITS - 1
        );
        let width = u32::from(to - from) + 1;
        (self.0 >> from) & (u16::MAX >> (u16::BITS - width))
    }
    /// Gives the value of a bit range of at most 8 bits as `u8`.
    /// See [`Instruction::get_bit_range()`]
    #[must_use]
    pub fn get_bit_range_u8(self, from: u8, to: u8) -> u8 {
        debug_assert!(to - from < 8, "bit range {from}..={to} does not fit into u8");
        self.get_bit_range(from, to).to_le_bytes()[0]
    }
    #[must_use]
    pub fn get_bit(self, index: u8) -> bool {
        self.get_bit_range(index, index) == 1
    }
    #[must_use]
    pub fn op_code(self) -> u8 {
        self.get_bit_range_u8(12, 15)
    }
    #[must_use]
    pub fn dr_number(self) -> u8 {
        self.get_bit_range_u8(9, 11)
    }
    #[must_use]
    pub fn sr1_number(self) -> u8 {
        self.get_bit_range_u8(6, 8)
    }
    #[must_use]
    pub fn sr2_number(self) -> u8 {
        self.get_bit_range_u8(0, 2)
    }
    #[must_use]
    pub fn is_immediate(self) -> bool {
        self.get_bit(5)
    }
    #[must_use]
    pub fn get_immediate(self) -> u16 {
        sign_extend(self.get_bit_range(0, 4), 5)
    }
    /// Sign extended offset of the lowest `len` bits, to be added with wrapping.
    #[must_use]
    pub fn pc_offset(self, len: u8) -> u16 {
        sign_extend(self.get_bit_range(0, len - 1), len)
    }
    #[must_use]
    pub fn trap_vector(self) -> u8 {
        self.get_bit_range_u8(0, 7)
    }
    #[must_use]
    pub const fn as_binary(self) -> u16 {
        self.0
    }
}

impl Debug for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Op: {:04b}, DR: {:03b}, PC_Off: {:09b}",
            self.op_code(),
            self.dr_number(),
            self.get_bit_range(0, 8)
        )
    }
}

impl From<u16> for Instruction {
    fn from(bits: u16) -> Self {
        Self(bits)
    }
}

/// The 4 bit LC-3 opcodes.
#[repr(u8)]
#[derive(enumn::N, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Opcode {
    Br = 0b0000,
    Add = 0b0001,
    Ld = 0b0010,
    St = 0b0011,
    Jsr = 0b0100,
    And = 0b0101,
    Ldr = 0b0110,
    Str = 0b0111,
    Rti = 0b1000,
    Not = 0b1001,
    Ldi = 0b1010,
    Sti = 0b1011,
    Jmp = 0b1100,
    Res = 0b1101,
    Lea = 0b1110,
    Trap = 0b1111,
}

/// Second operand of `ADD` and `AND`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(u8),
    /// Already sign extended `imm5`
    Immediate(u16),
}

/// A decoded instruction with its operand fields, offsets are already sign extended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    Add { dr: u8, sr1: u8, operand: Operand },
    And { dr: u8, sr1: u8, operand: Operand },
    Not { dr: u8, sr: u8 },
    Br { nzp: u16, pc_offset: u16 },
    Jmp { base_r: u8 },
    Jsr { pc_offset: u16 },
    Jsrr { base_r: u8 },
    Ld { dr: u8, pc_offset: u16 },
    Ldi { dr: u8, pc_offset: u16 },
    Ldr { dr: u8, base_r: u8, offset: u16 },
    Lea { dr: u8, pc_offset: u16 },
    St { sr: u8, pc_offset: u16 },
    Sti { sr: u8, pc_offset: u16 },
    Str { sr: u8, base_r: u8, offset: u16 },
    Trap { trap_vector: u8 },
    /// `RTI` and the reserved opcode, both cannot be executed.
    Invalid { opcode: Opcode },
}

impl From<Instruction> for Operation {
    fn from(i: Instruction) -> Self {
        let Some(opcode) = Opcode::n(i.op_code()) else {
            unreachable!("all 16 values of a 4 bit opcode are defined");
        };
        let operand = || {
            if i.is_immediate() {
                Operand::Immediate(i.get_immediate())
            } else {
                Operand::Register(i.sr2_number())
            }
        };
        match opcode {
            Opcode::Add => Self::Add {
                dr: i.dr_number(),
                sr1: i.sr1_number(),
                operand: operand(),
            },
            Opcode::And => Self::And {
                dr: i.dr_number(),
                sr1: i.sr1_number(),
                operand: operand(),
            },
            Opcode::Not => Self::Not {
                dr: i.dr_number(),
                sr: i.sr1_number(),
            },
            Opcode::Br => Self::Br {
                nzp: i.get_bit_range(9, 11),
                pc_offset: i.pc_offset(9),
            },
            Opcode::Jmp => Self::Jmp {
                base_r: i.sr1_number(),
            },
            Opcode::Jsr if i.get_bit(11) => Self::Jsr {
                pc_offset: i.pc_offset(11),
            },
            Opcode::Jsr => Self::Jsrr {
                base_r: i.sr1_number(),
            },
            Opcode::Ld => Self::Ld {
                dr: i.dr_number(),
                pc_offset: i.pc_offset(9),
            },
            Opcode::Ldi => Self::Ldi {
                dr: i.dr_number(),
                pc_offset: i.pc_offset(9),
            },
            Opcode::Ldr => Self::Ldr {
                dr: i.dr_number(),
                base_r: i.sr1_number(),
                offset: i.pc_offset(6),
            },
            Opcode::Lea => Self::Lea {
                dr: i.dr_number(),
                pc_offset: i.pc_offset(9),
            },
            Opcode::St => Self::St {
                sr: i.dr_number(),
                pc_offset: i.pc_offset(9),
            },
            Opcode::Sti => Self::Sti {
                sr: i.dr_number(),
                pc_offset: i.pc_offset(9),
            },
            Opcode::Str => Self::Str {
                sr: i.dr_number(),
                base_r: i.sr1_number(),
                offset: i.pc_offset(6),
            },
            Opcode::Trap => Self::Trap {
                trap_vector: i.trap_vector(),
            },
            Opcode::Rti | Opcode::Res => Self::Invalid { opcode },
        }
    }
}
