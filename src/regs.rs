//! Symbolic registers and the per-method register window.
//!
//! A method's frame holds `registers_size` registers; the last `ins_size` of
//! them receive the incoming arguments. Symbolic `pN` names count from the
//! start of that input block, so `pN` maps to `locals + N`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DexError, ErrorKind};

/// A register as written in symbolic method bodies: `vN` or `pN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymReg {
    Local(u16),
    Param(u16),
}

/// Shorthand for `SymReg::Local(n)`.
pub fn v(n: u16) -> SymReg {
    SymReg::Local(n)
}

/// Shorthand for `SymReg::Param(n)`.
pub fn p(n: u16) -> SymReg {
    SymReg::Param(n)
}

impl fmt::Display for SymReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymReg::Local(n) => write!(f, "v{}", n),
            SymReg::Param(n) => write!(f, "p{}", n),
        }
    }
}

/// The register window of one method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWindow {
    registers_size: u16,
    ins_size: u16,
}

impl RegisterWindow {
    /// Builds the window from a total register count (`.registers` style)
    /// plus the input-argument word count.
    pub fn from_registers(registers_size: u16, ins_size: u16) -> Result<Self, DexError> {
        if registers_size < ins_size {
            return Err(
                ErrorKind::BadRegisterWindow { registers: registers_size, ins: ins_size }.into()
            );
        }
        Ok(RegisterWindow { registers_size, ins_size })
    }

    /// Builds the window from a local count (`.locals` style) plus the
    /// input-argument word count.
    pub fn from_locals(locals: u16, ins_size: u16) -> Result<Self, DexError> {
        let registers_size = locals
            .checked_add(ins_size)
            .ok_or(ErrorKind::BadRegisterWindow { registers: locals, ins: ins_size })?;
        Ok(RegisterWindow { registers_size, ins_size })
    }

    pub fn registers_size(&self) -> u16 {
        self.registers_size
    }

    pub fn ins_size(&self) -> u16 {
        self.ins_size
    }

    pub fn locals(&self) -> u16 {
        self.registers_size - self.ins_size
    }

    /// Maps a symbolic register to its absolute number, bounds-checked
    /// against the window. Opcode and operand attribution is filled in by
    /// the caller that knows the instruction.
    pub fn resolve(&self, reg: SymReg) -> Result<u16, DexError> {
        match reg {
            SymReg::Local(n) => {
                if n >= self.registers_size {
                    return Err(ErrorKind::RegisterOutOfRange {
                        opcode: "",
                        operand: 0,
                        register: n as u32,
                        limit: self.registers_size as u32,
                    }
                    .into());
                }
                Ok(n)
            }
            SymReg::Param(n) => {
                if n >= self.ins_size {
                    return Err(ErrorKind::RegisterOutOfRange {
                        opcode: "",
                        operand: 0,
                        register: n as u32,
                        limit: self.ins_size as u32,
                    }
                    .into());
                }
                Ok(self.locals() + n)
            }
        }
    }
}
