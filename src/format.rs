//! The instruction format table: fixed code-unit lengths and literal ranges.

use crate::error::{DexError, ErrorKind};
use crate::opcodes::Opcode;

/// The bit-layout template shared by a group of opcodes. Payload blocks are
/// not formats; they are pseudo-instructions owned by [`crate::payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Format10x,
    Format12x,
    Format11n,
    Format11x,
    Format10t,
    Format20t,
    Format22x,
    Format21t,
    Format21s,
    Format21h,
    Format21c,
    Format23x,
    Format22b,
    Format22t,
    Format22s,
    Format22c,
    Format32x,
    Format30t,
    Format31t,
    Format31i,
    Format31c,
    Format35c,
    Format3rc,
    Format45cc,
    Format4rcc,
    Format51l,
}

impl Format {
    /// Length in 16-bit code units. Fixed per format; the wire length of an
    /// instruction never depends on its operand values.
    pub const fn units(&self) -> usize {
        match self {
            Format::Format10x
            | Format::Format12x
            | Format::Format11n
            | Format::Format11x
            | Format::Format10t => 1,

            Format::Format20t
            | Format::Format22x
            | Format::Format21t
            | Format::Format21s
            | Format::Format21h
            | Format::Format21c
            | Format::Format23x
            | Format::Format22b
            | Format::Format22t
            | Format::Format22s
            | Format::Format22c => 2,

            Format::Format32x
            | Format::Format30t
            | Format::Format31t
            | Format::Format31i
            | Format::Format31c
            | Format::Format35c
            | Format::Format3rc => 3,

            Format::Format45cc | Format::Format4rcc => 4,

            Format::Format51l => 5,
        }
    }
}

fn range_check(op: &Opcode, value: i64, min: i64, max: i64) -> Result<(), DexError> {
    if value < min || value > max {
        return Err(DexError::new(ErrorKind::LiteralOutOfRange {
            opcode: op.name,
            value,
            min,
            max,
        }));
    }
    Ok(())
}

/// Checks that `value` fits the literal field of the opcode's format.
///
/// Called by the literal instruction constructors and again by the assembler
/// before emission. For 21h the opcode's wide-target flag selects the 16- or
/// 48-bit shift; shifted-out bits must be exactly zero.
pub fn check_literal(op: &Opcode, value: i64) -> Result<(), DexError> {
    match op.format {
        Format::Format11n => range_check(op, value, -8, 7),
        Format::Format21s | Format::Format22s => {
            range_check(op, value, i16::MIN as i64, i16::MAX as i64)
        }
        Format::Format22b => range_check(op, value, i8::MIN as i64, i8::MAX as i64),
        Format::Format31i => range_check(op, value, i32::MIN as i64, i32::MAX as i64),
        Format::Format21h => {
            let shift = if op.wide_target() { 48 } else { 16 };
            let high = value >> shift;
            if high < i16::MIN as i64 || high > i16::MAX as i64 {
                return Err(DexError::new(ErrorKind::LiteralOutOfRange {
                    opcode: op.name,
                    value,
                    min: (i16::MIN as i64) << shift,
                    max: (i16::MAX as i64) << shift,
                }));
            }
            if high << shift != value {
                return Err(DexError::new(ErrorKind::MisalignedHigh16Literal {
                    opcode: op.name,
                    value,
                }));
            }
            Ok(())
        }
        Format::Format51l => Ok(()),
        _ => Err(DexError::new(ErrorKind::OperandMismatch {
            opcode: op.name,
            expected: "no literal operand",
        })),
    }
}
