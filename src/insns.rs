//! The instruction model: one opcode byte plus a tagged operand shape.
//!
//! Operands are grouped by shape rather than by mnemonic, so the codec can be
//! exhaustive over the formats instead of the full opcode set. Register
//! numbers here are absolute; symbolic `vN`/`pN` registers only exist on the
//! assembler's input side.

use serde::{Deserialize, Serialize};

use crate::error::{DexError, ErrorKind};
use crate::format::check_literal;
use crate::opcodes::{opcode, Opcode};

/// The closed set of operand shapes across all instruction formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operands {
    /// No operands (10x).
    None,
    /// Plain register operands (12x, 11x, 22x, 23x, 32x, 35c register lists).
    Regs(Vec<u16>),
    /// Registers plus a literal constant (11n, 21s, 21h, 22b, 22s, 31i, 51l).
    Lit { regs: Vec<u16>, value: i64 },
    /// Registers plus a signed branch target, in code units relative to this
    /// instruction (10t, 20t, 21t, 22t, 30t).
    Branch { regs: Vec<u16>, delta: i32 },
    /// Registers plus a constant-pool index (21c, 22c, 31c, 35c).
    Idx { regs: Vec<u16>, index: u32 },
    /// Registers plus two pool indices (45cc: method + proto).
    IdxPair { regs: Vec<u16>, index: u32, index2: u32 },
    /// A contiguous register range plus a pool index (3rc).
    Range { first: u16, count: u8, index: u32 },
    /// A register range plus two pool indices (4rcc).
    RangePair { first: u16, count: u8, index: u32, index2: u32 },
    /// One register plus the signed code-unit delta to a payload block (31t).
    Payload { reg: u16, delta: i32 },
}

/// A single decoded or constructed instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insn {
    pub opcode: u8,
    pub operands: Operands,
}

fn lookup(value: u8) -> Result<&'static Opcode, DexError> {
    opcode(value)
        .ok_or_else(|| ErrorKind::UnknownOpcode { opcode: value, offset: None }.into())
}

impl Insn {
    /// Builds an instruction with plain register operands (or none).
    pub fn plain(opcode: u8, regs: Vec<u16>) -> Result<Insn, DexError> {
        lookup(opcode)?;
        let operands = if regs.is_empty() { Operands::None } else { Operands::Regs(regs) };
        Ok(Insn { opcode, operands })
    }

    /// Builds a literal-carrying instruction, range-checking the literal
    /// against the opcode's format.
    pub fn lit(opcode: u8, regs: Vec<u16>, value: i64) -> Result<Insn, DexError> {
        let op = lookup(opcode)?;
        check_literal(op, value)?;
        Ok(Insn { opcode, operands: Operands::Lit { regs, value } })
    }

    /// Builds a branch instruction. `delta` is relative to the instruction's
    /// own code-unit offset; per-format range checks happen at encode time.
    pub fn branch(opcode: u8, regs: Vec<u16>, delta: i32) -> Result<Insn, DexError> {
        lookup(opcode)?;
        Ok(Insn { opcode, operands: Operands::Branch { regs, delta } })
    }

    /// Builds an instruction carrying a constant-pool index.
    pub fn with_index(opcode: u8, regs: Vec<u16>, index: u32) -> Result<Insn, DexError> {
        lookup(opcode)?;
        Ok(Insn { opcode, operands: Operands::Idx { regs, index } })
    }

    /// Builds a 45cc-shaped instruction (method index + proto index).
    pub fn with_index_pair(
        opcode: u8,
        regs: Vec<u16>,
        index: u32,
        index2: u32,
    ) -> Result<Insn, DexError> {
        lookup(opcode)?;
        Ok(Insn { opcode, operands: Operands::IdxPair { regs, index, index2 } })
    }

    /// Builds a register-range instruction (3rc).
    pub fn range(opcode: u8, first: u16, count: u8, index: u32) -> Result<Insn, DexError> {
        lookup(opcode)?;
        Ok(Insn { opcode, operands: Operands::Range { first, count, index } })
    }

    /// Builds a register-range instruction with two indices (4rcc).
    pub fn range_pair(
        opcode: u8,
        first: u16,
        count: u8,
        index: u32,
        index2: u32,
    ) -> Result<Insn, DexError> {
        lookup(opcode)?;
        Ok(Insn { opcode, operands: Operands::RangePair { first, count, index, index2 } })
    }

    /// Builds a payload-referencing instruction (31t). The delta is patched
    /// in by the assembler once the payload's final offset is known.
    pub fn payload_ref(opcode: u8, reg: u16, delta: i32) -> Result<Insn, DexError> {
        lookup(opcode)?;
        Ok(Insn { opcode, operands: Operands::Payload { reg, delta } })
    }

    /// The table entry for this instruction's opcode byte.
    pub fn def(&self) -> Result<&'static Opcode, DexError> {
        lookup(self.opcode)
    }

    /// Wire length in code units.
    pub fn units(&self) -> Result<usize, DexError> {
        Ok(self.def()?.format.units())
    }
}
