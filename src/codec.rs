//! Bit-level encode and decode of instructions, one rule per format.
//!
//! Everything here works on 16-bit code units. The opcode byte is always the
//! low byte of the first unit; multi-unit literals and offsets are stored
//! low unit first.

use std::collections::HashMap;

use log::debug;

use crate::error::{DexError, ErrorKind};
use crate::format::{check_literal, Format};
use crate::insns::{Insn, Operands};
use crate::opcodes::{opcode, Opcode};
use crate::payload::payload_at;

// Field extraction helpers, unit 0 layout: bbbb aaaa oooo oooo.
fn op(u: u16) -> u8 {
    (u & 0xff) as u8
}
fn a8(u: u16) -> u16 {
    u >> 8
}
fn a4(u: u16) -> u16 {
    (u >> 8) & 0xf
}
fn b4(u: u16) -> u16 {
    u >> 12
}
fn s4(n: u16) -> i32 {
    ((n as i32) << 28) >> 28
}
fn s8(n: u16) -> i32 {
    (n as u8) as i8 as i32
}
fn s16(u: u16) -> i32 {
    u as i16 as i32
}

fn reg4(def: &Opcode, operand: usize, r: u16) -> Result<u16, DexError> {
    if r > 0xf {
        return Err(ErrorKind::RegisterOutOfRange {
            opcode: def.name,
            operand,
            register: r as u32,
            limit: 0x10,
        }
        .into());
    }
    Ok(r)
}

fn reg8(def: &Opcode, operand: usize, r: u16) -> Result<u16, DexError> {
    if r > 0xff {
        return Err(ErrorKind::RegisterOutOfRange {
            opcode: def.name,
            operand,
            register: r as u32,
            limit: 0x100,
        }
        .into());
    }
    Ok(r)
}

fn idx16(def: &Opcode, index: u32) -> Result<u16, DexError> {
    if index > 0xffff {
        return Err(ErrorKind::LiteralOutOfRange {
            opcode: def.name,
            value: index as i64,
            min: 0,
            max: 0xffff,
        }
        .into());
    }
    Ok(index as u16)
}

fn branch16(def: &Opcode, delta: i32) -> Result<u16, DexError> {
    if delta < i16::MIN as i32 || delta > i16::MAX as i32 {
        return Err(ErrorKind::BranchOutOfRange {
            opcode: def.name,
            delta,
            min: i16::MIN as i32,
            max: i16::MAX as i32,
        }
        .into());
    }
    Ok(delta as i16 as u16)
}

fn mismatch(def: &Opcode, expected: &'static str) -> DexError {
    ErrorKind::OperandMismatch { opcode: def.name, expected }.into()
}

/// Packs the register-list head unit and nibble unit shared by 35c and 45cc.
fn reg_list(def: &Opcode, regs: &[u16]) -> Result<(u16, u16), DexError> {
    if regs.len() > 5 {
        return Err(mismatch(def, "at most five argument registers"));
    }
    for (i, &r) in regs.iter().enumerate() {
        reg4(def, i, r)?;
    }
    let g = regs.get(4).copied().unwrap_or(0);
    let head = (def.value as u16) | (g << 8) | ((regs.len() as u16) << 12);
    let mut nibbles = 0u16;
    for (i, &r) in regs.iter().take(4).enumerate() {
        nibbles |= r << (4 * i);
    }
    Ok((head, nibbles))
}

/// Encodes one instruction into its code units.
///
/// The operand shape must match the opcode's format; anything else is an
/// `OperandMismatch`. Literals are range-checked again here so instructions
/// deserialized or hand-built without the constructors stay honest.
pub fn encode(insn: &Insn) -> Result<Vec<u16>, DexError> {
    let def = insn.def()?;
    let o = def.value as u16;
    match def.format {
        Format::Format10x => match &insn.operands {
            Operands::None => Ok(vec![o]),
            _ => Err(mismatch(def, "no operands")),
        },
        Format::Format12x => match &insn.operands {
            Operands::Regs(regs) => {
                let &[a, b] = regs.as_slice() else {
                    return Err(mismatch(def, "two registers"));
                };
                Ok(vec![o | (reg4(def, 0, a)? << 8) | (reg4(def, 1, b)? << 12)])
            }
            _ => Err(mismatch(def, "two registers")),
        },
        Format::Format11n => match &insn.operands {
            Operands::Lit { regs, value } => {
                let &[a] = regs.as_slice() else {
                    return Err(mismatch(def, "one register and a literal"));
                };
                check_literal(def, *value)?;
                let nib = (*value as u16) & 0xf;
                Ok(vec![o | (reg4(def, 0, a)? << 8) | (nib << 12)])
            }
            _ => Err(mismatch(def, "one register and a literal")),
        },
        Format::Format11x => match &insn.operands {
            Operands::Regs(regs) => {
                let &[a] = regs.as_slice() else {
                    return Err(mismatch(def, "one register"));
                };
                Ok(vec![o | (reg8(def, 0, a)? << 8)])
            }
            _ => Err(mismatch(def, "one register")),
        },
        Format::Format10t => match &insn.operands {
            Operands::Branch { regs, delta } if regs.is_empty() => {
                if *delta < i8::MIN as i32 || *delta > i8::MAX as i32 {
                    return Err(ErrorKind::BranchOutOfRange {
                        opcode: def.name,
                        delta: *delta,
                        min: i8::MIN as i32,
                        max: i8::MAX as i32,
                    }
                    .into());
                }
                Ok(vec![o | (((*delta as i8 as u8) as u16) << 8)])
            }
            _ => Err(mismatch(def, "a branch target and no registers")),
        },
        Format::Format20t => match &insn.operands {
            Operands::Branch { regs, delta } if regs.is_empty() => {
                Ok(vec![o, branch16(def, *delta)?])
            }
            _ => Err(mismatch(def, "a branch target and no registers")),
        },
        Format::Format22x => match &insn.operands {
            Operands::Regs(regs) => {
                let &[a, b] = regs.as_slice() else {
                    return Err(mismatch(def, "two registers"));
                };
                Ok(vec![o | (reg8(def, 0, a)? << 8), b])
            }
            _ => Err(mismatch(def, "two registers")),
        },
        Format::Format21t => match &insn.operands {
            Operands::Branch { regs, delta } => {
                let &[a] = regs.as_slice() else {
                    return Err(mismatch(def, "one register and a branch target"));
                };
                Ok(vec![o | (reg8(def, 0, a)? << 8), branch16(def, *delta)?])
            }
            _ => Err(mismatch(def, "one register and a branch target")),
        },
        Format::Format21s => match &insn.operands {
            Operands::Lit { regs, value } => {
                let &[a] = regs.as_slice() else {
                    return Err(mismatch(def, "one register and a literal"));
                };
                check_literal(def, *value)?;
                Ok(vec![o | (reg8(def, 0, a)? << 8), *value as i16 as u16])
            }
            _ => Err(mismatch(def, "one register and a literal")),
        },
        Format::Format21h => match &insn.operands {
            Operands::Lit { regs, value } => {
                let &[a] = regs.as_slice() else {
                    return Err(mismatch(def, "one register and a literal"));
                };
                check_literal(def, *value)?;
                let shift = if def.wide_target() { 48 } else { 16 };
                Ok(vec![o | (reg8(def, 0, a)? << 8), (*value >> shift) as i16 as u16])
            }
            _ => Err(mismatch(def, "one register and a literal")),
        },
        Format::Format21c => match &insn.operands {
            Operands::Idx { regs, index } => {
                let &[a] = regs.as_slice() else {
                    return Err(mismatch(def, "one register and a pool index"));
                };
                Ok(vec![o | (reg8(def, 0, a)? << 8), idx16(def, *index)?])
            }
            _ => Err(mismatch(def, "one register and a pool index")),
        },
        Format::Format23x => match &insn.operands {
            Operands::Regs(regs) => {
                let &[a, b, c] = regs.as_slice() else {
                    return Err(mismatch(def, "three registers"));
                };
                Ok(vec![
                    o | (reg8(def, 0, a)? << 8),
                    reg8(def, 1, b)? | (reg8(def, 2, c)? << 8),
                ])
            }
            _ => Err(mismatch(def, "three registers")),
        },
        Format::Format22b => match &insn.operands {
            Operands::Lit { regs, value } => {
                let &[a, b] = regs.as_slice() else {
                    return Err(mismatch(def, "two registers and a literal"));
                };
                check_literal(def, *value)?;
                let lit = ((*value as i8 as u8) as u16) << 8;
                Ok(vec![o | (reg8(def, 0, a)? << 8), reg8(def, 1, b)? | lit])
            }
            _ => Err(mismatch(def, "two registers and a literal")),
        },
        Format::Format22t => match &insn.operands {
            Operands::Branch { regs, delta } => {
                let &[a, b] = regs.as_slice() else {
                    return Err(mismatch(def, "two registers and a branch target"));
                };
                Ok(vec![
                    o | (reg4(def, 0, a)? << 8) | (reg4(def, 1, b)? << 12),
                    branch16(def, *delta)?,
                ])
            }
            _ => Err(mismatch(def, "two registers and a branch target")),
        },
        Format::Format22s => match &insn.operands {
            Operands::Lit { regs, value } => {
                let &[a, b] = regs.as_slice() else {
                    return Err(mismatch(def, "two registers and a literal"));
                };
                check_literal(def, *value)?;
                Ok(vec![
                    o | (reg4(def, 0, a)? << 8) | (reg4(def, 1, b)? << 12),
                    *value as i16 as u16,
                ])
            }
            _ => Err(mismatch(def, "two registers and a literal")),
        },
        Format::Format22c => match &insn.operands {
            Operands::Idx { regs, index } => {
                let &[a, b] = regs.as_slice() else {
                    return Err(mismatch(def, "two registers and a pool index"));
                };
                Ok(vec![
                    o | (reg4(def, 0, a)? << 8) | (reg4(def, 1, b)? << 12),
                    idx16(def, *index)?,
                ])
            }
            _ => Err(mismatch(def, "two registers and a pool index")),
        },
        Format::Format32x => match &insn.operands {
            Operands::Regs(regs) => {
                let &[a, b] = regs.as_slice() else {
                    return Err(mismatch(def, "two registers"));
                };
                Ok(vec![o, a, b])
            }
            _ => Err(mismatch(def, "two registers")),
        },
        Format::Format30t => match &insn.operands {
            Operands::Branch { regs, delta } if regs.is_empty() => {
                let bits = *delta as u32;
                Ok(vec![o, bits as u16, (bits >> 16) as u16])
            }
            _ => Err(mismatch(def, "a branch target and no registers")),
        },
        Format::Format31t => match &insn.operands {
            Operands::Payload { reg, delta } => {
                let bits = *delta as u32;
                Ok(vec![o | (reg8(def, 0, *reg)? << 8), bits as u16, (bits >> 16) as u16])
            }
            _ => Err(mismatch(def, "one register and a payload target")),
        },
        Format::Format31i => match &insn.operands {
            Operands::Lit { regs, value } => {
                let &[a] = regs.as_slice() else {
                    return Err(mismatch(def, "one register and a literal"));
                };
                check_literal(def, *value)?;
                let bits = *value as i32 as u32;
                Ok(vec![o | (reg8(def, 0, a)? << 8), bits as u16, (bits >> 16) as u16])
            }
            _ => Err(mismatch(def, "one register and a literal")),
        },
        Format::Format31c => match &insn.operands {
            Operands::Idx { regs, index } => {
                let &[a] = regs.as_slice() else {
                    return Err(mismatch(def, "one register and a pool index"));
                };
                Ok(vec![o | (reg8(def, 0, a)? << 8), *index as u16, (*index >> 16) as u16])
            }
            _ => Err(mismatch(def, "one register and a pool index")),
        },
        Format::Format35c => match &insn.operands {
            Operands::Idx { regs, index } => {
                let (head, nibbles) = reg_list(def, regs)?;
                Ok(vec![head, idx16(def, *index)?, nibbles])
            }
            _ => Err(mismatch(def, "an argument register list and a pool index")),
        },
        Format::Format3rc => match &insn.operands {
            Operands::Range { first, count, index } => {
                Ok(vec![o | ((*count as u16) << 8), idx16(def, *index)?, *first])
            }
            _ => Err(mismatch(def, "a register range and a pool index")),
        },
        Format::Format45cc => match &insn.operands {
            Operands::IdxPair { regs, index, index2 } => {
                let (head, nibbles) = reg_list(def, regs)?;
                Ok(vec![head, idx16(def, *index)?, nibbles, idx16(def, *index2)?])
            }
            _ => Err(mismatch(def, "an argument register list and two pool indices")),
        },
        Format::Format4rcc => match &insn.operands {
            Operands::RangePair { first, count, index, index2 } => Ok(vec![
                o | ((*count as u16) << 8),
                idx16(def, *index)?,
                *first,
                idx16(def, *index2)?,
            ]),
            _ => Err(mismatch(def, "a register range and two pool indices")),
        },
        Format::Format51l => match &insn.operands {
            Operands::Lit { regs, value } => {
                let &[a] = regs.as_slice() else {
                    return Err(mismatch(def, "one register and a literal"));
                };
                let bits = *value as u64;
                Ok(vec![
                    o | (reg8(def, 0, a)? << 8),
                    bits as u16,
                    (bits >> 16) as u16,
                    (bits >> 32) as u16,
                    (bits >> 48) as u16,
                ])
            }
            _ => Err(mismatch(def, "one register and a literal")),
        },
    }
}

fn require(name: &'static str, units: &[u16], pc: usize, need: usize) -> Result<(), DexError> {
    if pc + need > units.len() {
        return Err(ErrorKind::TruncatedStream {
            opcode: name,
            offset: pc,
            need,
            have: units.len() - pc,
        }
        .into());
    }
    Ok(())
}

fn i32_at(units: &[u16], pc: usize) -> i32 {
    (units[pc] as u32 | ((units[pc + 1] as u32) << 16)) as i32
}

/// Decodes the instruction at `pc`, returning it and its length in code
/// units. Payload blocks are not instructions; use
/// [`crate::payload::payload_at`] for those.
pub fn decode(units: &[u16], pc: usize) -> Result<(Insn, usize), DexError> {
    require("instruction", units, pc, 1)?;
    let u0 = units[pc];
    let value = op(u0);
    let def = opcode(value)
        .ok_or(ErrorKind::UnknownOpcode { opcode: value, offset: Some(pc) })?;
    let len = def.format.units();
    require(def.name, units, pc, len)?;

    let operands = match def.format {
        Format::Format10x => Operands::None,
        Format::Format12x => Operands::Regs(vec![a4(u0), b4(u0)]),
        Format::Format11n => Operands::Lit { regs: vec![a4(u0)], value: s4(b4(u0)) as i64 },
        Format::Format11x => Operands::Regs(vec![a8(u0)]),
        Format::Format10t => Operands::Branch { regs: vec![], delta: s8(a8(u0)) },
        Format::Format20t => Operands::Branch { regs: vec![], delta: s16(units[pc + 1]) },
        Format::Format22x => Operands::Regs(vec![a8(u0), units[pc + 1]]),
        Format::Format21t => {
            Operands::Branch { regs: vec![a8(u0)], delta: s16(units[pc + 1]) }
        }
        Format::Format21s => {
            Operands::Lit { regs: vec![a8(u0)], value: s16(units[pc + 1]) as i64 }
        }
        Format::Format21h => {
            let shift = if def.wide_target() { 48 } else { 16 };
            Operands::Lit {
                regs: vec![a8(u0)],
                value: ((units[pc + 1] as i16) as i64) << shift,
            }
        }
        Format::Format21c => {
            Operands::Idx { regs: vec![a8(u0)], index: units[pc + 1] as u32 }
        }
        Format::Format23x => {
            let u1 = units[pc + 1];
            Operands::Regs(vec![a8(u0), u1 & 0xff, u1 >> 8])
        }
        Format::Format22b => {
            let u1 = units[pc + 1];
            Operands::Lit { regs: vec![a8(u0), u1 & 0xff], value: s8(u1 >> 8) as i64 }
        }
        Format::Format22t => {
            Operands::Branch { regs: vec![a4(u0), b4(u0)], delta: s16(units[pc + 1]) }
        }
        Format::Format22s => {
            Operands::Lit { regs: vec![a4(u0), b4(u0)], value: s16(units[pc + 1]) as i64 }
        }
        Format::Format22c => {
            Operands::Idx { regs: vec![a4(u0), b4(u0)], index: units[pc + 1] as u32 }
        }
        Format::Format32x => Operands::Regs(vec![units[pc + 1], units[pc + 2]]),
        Format::Format30t => Operands::Branch { regs: vec![], delta: i32_at(units, pc + 1) },
        Format::Format31t => {
            Operands::Payload { reg: a8(u0), delta: i32_at(units, pc + 1) }
        }
        Format::Format31i => {
            Operands::Lit { regs: vec![a8(u0)], value: i32_at(units, pc + 1) as i64 }
        }
        Format::Format31c => Operands::Idx {
            regs: vec![a8(u0)],
            index: units[pc + 1] as u32 | ((units[pc + 2] as u32) << 16),
        },
        Format::Format35c | Format::Format45cc => {
            let count = b4(u0) as usize;
            if count > 5 {
                return Err(DexError::new(ErrorKind::BadInstruction {
                    opcode: def.name,
                    offset: pc,
                    reason: "register count above five",
                }));
            }
            let nibbles = units[pc + 2];
            let mut regs = Vec::with_capacity(count);
            for i in 0..count.min(4) {
                regs.push((nibbles >> (4 * i)) & 0xf);
            }
            if count == 5 {
                regs.push(a4(u0));
            }
            let index = units[pc + 1] as u32;
            if def.format == Format::Format45cc {
                Operands::IdxPair { regs, index, index2: units[pc + 3] as u32 }
            } else {
                Operands::Idx { regs, index }
            }
        }
        Format::Format3rc => Operands::Range {
            first: units[pc + 2],
            count: a8(u0) as u8,
            index: units[pc + 1] as u32,
        },
        Format::Format4rcc => Operands::RangePair {
            first: units[pc + 2],
            count: a8(u0) as u8,
            index: units[pc + 1] as u32,
            index2: units[pc + 3] as u32,
        },
        Format::Format51l => {
            let bits = units[pc + 1] as u64
                | ((units[pc + 2] as u64) << 16)
                | ((units[pc + 3] as u64) << 32)
                | ((units[pc + 4] as u64) << 48);
            Operands::Lit { regs: vec![a8(u0)], value: bits as i64 }
        }
    };
    Ok((Insn { opcode: value, operands }, len))
}

/// Iterator over `(offset, instruction)` pairs of a whole code-unit stream.
///
/// Payload blocks cannot be found by a linear opcode scan (their first unit
/// decodes as a NOP), so the stream is pre-scanned once: every 31t reference
/// marks its target, and marked regions are skipped at their data-dependent
/// length during iteration. Stops after yielding the first error.
pub struct DecodeAll<'a> {
    units: &'a [u16],
    pc: usize,
    payloads: HashMap<usize, usize>,
    done: bool,
}

pub fn decode_all(units: &[u16]) -> DecodeAll<'_> {
    DecodeAll { units, pc: 0, payloads: scan_payloads(units), done: false }
}

fn scan_payloads(units: &[u16]) -> HashMap<usize, usize> {
    let mut map = HashMap::new();
    let mut pc = 0;
    while pc < units.len() {
        if let Some(&len) = map.get(&pc) {
            pc += len;
            continue;
        }
        let Ok((insn, len)) = decode(units, pc) else { break };
        if let Operands::Payload { delta, .. } = insn.operands {
            let target = pc as i64 + delta as i64;
            if target >= 0 {
                if let Ok((_, plen)) = payload_at(units, target as usize) {
                    map.insert(target as usize, plen);
                }
            }
        }
        pc += len;
    }
    map
}

impl<'a> Iterator for DecodeAll<'a> {
    type Item = Result<(usize, Insn), DexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while let Some(&len) = self.payloads.get(&self.pc) {
            debug!("skipping {} payload code units at {}", len, self.pc);
            self.pc += len;
        }
        if self.pc >= self.units.len() {
            return None;
        }
        match decode(self.units, self.pc) {
            Ok((insn, len)) => {
                let at = self.pc;
                self.pc += len;
                Some(Ok((at, insn)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
