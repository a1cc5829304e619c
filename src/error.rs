use std::fmt;

/// The closed set of failures this crate reports.
///
/// Structural kinds mean the input bytes are not a valid instruction stream;
/// semantic kinds mean a caller supplied a value the wire format cannot
/// represent; resolution kinds are consistency errors in a symbolic method
/// body. None of them are retried anywhere in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    // Structural
    /// `offset` is the stream position when decoding; `None` when the opcode
    /// byte came from a caller rather than a stream.
    UnknownOpcode { opcode: u8, offset: Option<usize> },
    UnknownIdent { ident: u16, offset: usize },
    TruncatedStream { opcode: &'static str, offset: usize, need: usize, have: usize },
    BadInstruction { opcode: &'static str, offset: usize, reason: &'static str },

    // Semantic / construction
    LiteralOutOfRange { opcode: &'static str, value: i64, min: i64, max: i64 },
    MisalignedHigh16Literal { opcode: &'static str, value: i64 },
    RegisterOutOfRange { opcode: &'static str, operand: usize, register: u32, limit: u32 },
    BranchOutOfRange { opcode: &'static str, delta: i32, min: i32, max: i32 },
    OperandMismatch { opcode: &'static str, expected: &'static str },
    BadRegisterWindow { registers: u16, ins: u16 },
    BadPayload { reason: &'static str },
    UnsortedSwitchKeys { position: usize },

    // Resolution
    UnknownLabel { label: String, opcode: &'static str },
    DuplicateLabel { label: String, offset: u32 },
    PayloadMultiplyReferenced { label: String },
    BadTryRange { start: String, end: String },
    Unresolved { kind: &'static str, symbol: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexError {
    kind: ErrorKind,
    contexts: Vec<String>,
}

impl DexError {
    pub fn new(kind: ErrorKind) -> Self {
        DexError { kind, contexts: Vec::new() }
    }

    /// Pushes a context frame, e.g. the method or opcode being processed.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.contexts.push(context.into());
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Fills in opcode/operand attribution for errors raised below the level
    /// that knows the instruction, e.g. a register window bound check.
    pub(crate) fn at_operand(mut self, opcode: &'static str, operand: usize) -> Self {
        if let ErrorKind::RegisterOutOfRange { opcode: o, operand: i, .. } = &mut self.kind {
            if o.is_empty() {
                *o = opcode;
                *i = operand;
            }
        }
        self
    }
}

impl From<ErrorKind> for DexError {
    fn from(kind: ErrorKind) -> Self {
        DexError::new(kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UnknownOpcode { opcode, offset } => {
                write!(f, "unknown opcode 0x{:02x}", opcode)?;
                if let Some(offset) = offset {
                    write!(f, " at code unit {}", offset)?;
                }
                Ok(())
            }
            ErrorKind::UnknownIdent { ident, offset } => {
                write!(f, "unknown payload ident 0x{:04x} at code unit {}", ident, offset)
            }
            ErrorKind::BadInstruction { opcode, offset, reason } => {
                write!(f, "malformed {} at code unit {}: {}", opcode, offset, reason)
            }
            ErrorKind::TruncatedStream { opcode, offset, need, have } => {
                write!(
                    f,
                    "truncated {} at code unit {}: need {} code units, have {}",
                    opcode, offset, need, have
                )
            }
            ErrorKind::LiteralOutOfRange { opcode, value, min, max } => {
                write!(f, "literal {} out of range [{}, {}] for {}", value, min, max, opcode)
            }
            ErrorKind::MisalignedHigh16Literal { opcode, value } => {
                write!(
                    f,
                    "literal 0x{:x} has non-zero low bits for high16 encoding of {}",
                    value, opcode
                )
            }
            ErrorKind::RegisterOutOfRange { opcode, operand, register, limit } => {
                write!(
                    f,
                    "register v{} out of range (limit {}) in operand {} of {}",
                    register, limit, operand, opcode
                )
            }
            ErrorKind::BranchOutOfRange { opcode, delta, min, max } => {
                write!(
                    f,
                    "branch offset {} out of range [{}, {}] for {}",
                    delta, min, max, opcode
                )
            }
            ErrorKind::OperandMismatch { opcode, expected } => {
                write!(f, "{} expects {}", opcode, expected)
            }
            ErrorKind::BadRegisterWindow { registers, ins } => {
                write!(
                    f,
                    "register window of {} registers cannot hold {} input argument words",
                    registers, ins
                )
            }
            ErrorKind::BadPayload { reason } => write!(f, "bad payload: {}", reason),
            ErrorKind::UnsortedSwitchKeys { position } => {
                write!(f, "sparse-switch keys are not in ascending order at entry {}", position)
            }
            ErrorKind::UnknownLabel { label, opcode } => {
                write!(f, "label :{} referenced by {} is never declared", label, opcode)
            }
            ErrorKind::DuplicateLabel { label, offset } => {
                write!(f, "label :{} declared twice (second at code unit {})", label, offset)
            }
            ErrorKind::PayloadMultiplyReferenced { label } => {
                write!(f, "switch payload :{} is referenced by more than one instruction", label)
            }
            ErrorKind::BadTryRange { start, end } => {
                write!(f, "invalid try range :{} .. :{}", start, end)
            }
            ErrorKind::Unresolved { kind, symbol } => {
                write!(f, "unresolved {} reference {}", kind, symbol)
            }
        }
    }
}

impl fmt::Display for DexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        let mut connector = " for ";
        for context in &self.contexts {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl std::error::Error for DexError {}
