//! The static Dalvik opcode table.
//!
//! One entry per defined opcode byte of the standard Android set; gaps in the
//! byte space simply have no entry. The table never changes after definition,
//! so lookups go through a 256-slot index built once.

use bitflags::bitflags;
use once_cell::sync::Lazy;

use crate::format::Format;

/// The kind of constant-pool reference an opcode's index operand names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    None,
    String,
    Type,
    Field,
    Method,
    CallSite,
    MethodProto,
    MethodHandle,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpcodeFlags: u32 {
        const CAN_THROW = 0x1;
        const CAN_CONTINUE = 0x2;
        const SETS_RESULT = 0x4;
        const SETS_REGISTER = 0x8;
        const SETS_WIDE_REGISTER = 0x10;
    }
}

/// An opcode with its wire value, mnemonic, format and properties.
pub struct Opcode {
    pub value: u8,
    pub name: &'static str,
    pub reference_type: ReferenceType,
    pub format: Format,
    pub flags: OpcodeFlags,
}

impl Opcode {
    const fn new(
        value: u8,
        name: &'static str,
        reference_type: ReferenceType,
        format: Format,
        flags: OpcodeFlags,
    ) -> Self {
        Opcode { value, name, reference_type, format, flags }
    }

    /// Whether the result occupies a register pair. Decides the 21h shift.
    pub fn wide_target(&self) -> bool {
        self.flags.contains(OpcodeFlags::SETS_WIDE_REGISTER)
    }

    pub fn can_throw(&self) -> bool {
        self.flags.contains(OpcodeFlags::CAN_THROW)
    }

    pub fn can_continue(&self) -> bool {
        self.flags.contains(OpcodeFlags::CAN_CONTINUE)
    }

    pub fn sets_result(&self) -> bool {
        self.flags.contains(OpcodeFlags::SETS_RESULT)
    }
}

const NONE: OpcodeFlags = OpcodeFlags::empty();
const CONT: OpcodeFlags = OpcodeFlags::CAN_CONTINUE;
const THROW: OpcodeFlags = OpcodeFlags::CAN_THROW.union(CONT);
const SETS: OpcodeFlags = CONT.union(OpcodeFlags::SETS_REGISTER);
const SETS_W: OpcodeFlags = SETS.union(OpcodeFlags::SETS_WIDE_REGISTER);
const T_SETS: OpcodeFlags = THROW.union(OpcodeFlags::SETS_REGISTER);
const T_SETS_W: OpcodeFlags = T_SETS.union(OpcodeFlags::SETS_WIDE_REGISTER);
const RESULT: OpcodeFlags = THROW.union(OpcodeFlags::SETS_RESULT);

use Format::*;
use ReferenceType as R;

#[rustfmt::skip]
pub static OPCODES: &[Opcode] = &[
    Opcode::new(0x00, "nop", R::None, Format10x, CONT),
    Opcode::new(0x01, "move", R::None, Format12x, SETS),
    Opcode::new(0x02, "move/from16", R::None, Format22x, SETS),
    Opcode::new(0x03, "move/16", R::None, Format32x, SETS),
    Opcode::new(0x04, "move-wide", R::None, Format12x, SETS_W),
    Opcode::new(0x05, "move-wide/from16", R::None, Format22x, SETS_W),
    Opcode::new(0x06, "move-wide/16", R::None, Format32x, SETS_W),
    Opcode::new(0x07, "move-object", R::None, Format12x, SETS),
    Opcode::new(0x08, "move-object/from16", R::None, Format22x, SETS),
    Opcode::new(0x09, "move-object/16", R::None, Format32x, SETS),
    Opcode::new(0x0a, "move-result", R::None, Format11x, SETS),
    Opcode::new(0x0b, "move-result-wide", R::None, Format11x, SETS_W),
    Opcode::new(0x0c, "move-result-object", R::None, Format11x, SETS),
    Opcode::new(0x0d, "move-exception", R::None, Format11x, SETS),
    Opcode::new(0x0e, "return-void", R::None, Format10x, NONE),
    Opcode::new(0x0f, "return", R::None, Format11x, NONE),
    Opcode::new(0x10, "return-wide", R::None, Format11x, NONE),
    Opcode::new(0x11, "return-object", R::None, Format11x, NONE),
    Opcode::new(0x12, "const/4", R::None, Format11n, SETS),
    Opcode::new(0x13, "const/16", R::None, Format21s, SETS),
    Opcode::new(0x14, "const", R::None, Format31i, SETS),
    Opcode::new(0x15, "const/high16", R::None, Format21h, SETS),
    Opcode::new(0x16, "const-wide/16", R::None, Format21s, SETS_W),
    Opcode::new(0x17, "const-wide/32", R::None, Format31i, SETS_W),
    Opcode::new(0x18, "const-wide", R::None, Format51l, SETS_W),
    Opcode::new(0x19, "const-wide/high16", R::None, Format21h, SETS_W),
    Opcode::new(0x1a, "const-string", R::String, Format21c, T_SETS),
    Opcode::new(0x1b, "const-string/jumbo", R::String, Format31c, T_SETS),
    Opcode::new(0x1c, "const-class", R::Type, Format21c, T_SETS),
    Opcode::new(0x1d, "monitor-enter", R::None, Format11x, THROW),
    Opcode::new(0x1e, "monitor-exit", R::None, Format11x, THROW),
    Opcode::new(0x1f, "check-cast", R::Type, Format21c, T_SETS),
    Opcode::new(0x20, "instance-of", R::Type, Format22c, T_SETS),
    Opcode::new(0x21, "array-length", R::None, Format12x, T_SETS),
    Opcode::new(0x22, "new-instance", R::Type, Format21c, T_SETS),
    Opcode::new(0x23, "new-array", R::Type, Format22c, T_SETS),
    Opcode::new(0x24, "filled-new-array", R::Type, Format35c, RESULT),
    Opcode::new(0x25, "filled-new-array/range", R::Type, Format3rc, RESULT),
    Opcode::new(0x26, "fill-array-data", R::None, Format31t, THROW),
    Opcode::new(0x27, "throw", R::None, Format11x, OpcodeFlags::CAN_THROW),
    Opcode::new(0x28, "goto", R::None, Format10t, NONE),
    Opcode::new(0x29, "goto/16", R::None, Format20t, NONE),
    Opcode::new(0x2a, "goto/32", R::None, Format30t, NONE),
    Opcode::new(0x2b, "packed-switch", R::None, Format31t, CONT),
    Opcode::new(0x2c, "sparse-switch", R::None, Format31t, CONT),
    Opcode::new(0x2d, "cmpl-float", R::None, Format23x, SETS),
    Opcode::new(0x2e, "cmpg-float", R::None, Format23x, SETS),
    Opcode::new(0x2f, "cmpl-double", R::None, Format23x, SETS),
    Opcode::new(0x30, "cmpg-double", R::None, Format23x, SETS),
    Opcode::new(0x31, "cmp-long", R::None, Format23x, SETS),
    Opcode::new(0x32, "if-eq", R::None, Format22t, CONT),
    Opcode::new(0x33, "if-ne", R::None, Format22t, CONT),
    Opcode::new(0x34, "if-lt", R::None, Format22t, CONT),
    Opcode::new(0x35, "if-ge", R::None, Format22t, CONT),
    Opcode::new(0x36, "if-gt", R::None, Format22t, CONT),
    Opcode::new(0x37, "if-le", R::None, Format22t, CONT),
    Opcode::new(0x38, "if-eqz", R::None, Format21t, CONT),
    Opcode::new(0x39, "if-nez", R::None, Format21t, CONT),
    Opcode::new(0x3a, "if-ltz", R::None, Format21t, CONT),
    Opcode::new(0x3b, "if-gez", R::None, Format21t, CONT),
    Opcode::new(0x3c, "if-gtz", R::None, Format21t, CONT),
    Opcode::new(0x3d, "if-lez", R::None, Format21t, CONT),
    Opcode::new(0x44, "aget", R::None, Format23x, T_SETS),
    Opcode::new(0x45, "aget-wide", R::None, Format23x, T_SETS_W),
    Opcode::new(0x46, "aget-object", R::None, Format23x, T_SETS),
    Opcode::new(0x47, "aget-boolean", R::None, Format23x, T_SETS),
    Opcode::new(0x48, "aget-byte", R::None, Format23x, T_SETS),
    Opcode::new(0x49, "aget-char", R::None, Format23x, T_SETS),
    Opcode::new(0x4a, "aget-short", R::None, Format23x, T_SETS),
    Opcode::new(0x4b, "aput", R::None, Format23x, THROW),
    Opcode::new(0x4c, "aput-wide", R::None, Format23x, THROW),
    Opcode::new(0x4d, "aput-object", R::None, Format23x, THROW),
    Opcode::new(0x4e, "aput-boolean", R::None, Format23x, THROW),
    Opcode::new(0x4f, "aput-byte", R::None, Format23x, THROW),
    Opcode::new(0x50, "aput-char", R::None, Format23x, THROW),
    Opcode::new(0x51, "aput-short", R::None, Format23x, THROW),
    Opcode::new(0x52, "iget", R::Field, Format22c, T_SETS),
    Opcode::new(0x53, "iget-wide", R::Field, Format22c, T_SETS_W),
    Opcode::new(0x54, "iget-object", R::Field, Format22c, T_SETS),
    Opcode::new(0x55, "iget-boolean", R::Field, Format22c, T_SETS),
    Opcode::new(0x56, "iget-byte", R::Field, Format22c, T_SETS),
    Opcode::new(0x57, "iget-char", R::Field, Format22c, T_SETS),
    Opcode::new(0x58, "iget-short", R::Field, Format22c, T_SETS),
    Opcode::new(0x59, "iput", R::Field, Format22c, THROW),
    Opcode::new(0x5a, "iput-wide", R::Field, Format22c, THROW),
    Opcode::new(0x5b, "iput-object", R::Field, Format22c, THROW),
    Opcode::new(0x5c, "iput-boolean", R::Field, Format22c, THROW),
    Opcode::new(0x5d, "iput-byte", R::Field, Format22c, THROW),
    Opcode::new(0x5e, "iput-char", R::Field, Format22c, THROW),
    Opcode::new(0x5f, "iput-short", R::Field, Format22c, THROW),
    Opcode::new(0x60, "sget", R::Field, Format21c, T_SETS),
    Opcode::new(0x61, "sget-wide", R::Field, Format21c, T_SETS_W),
    Opcode::new(0x62, "sget-object", R::Field, Format21c, T_SETS),
    Opcode::new(0x63, "sget-boolean", R::Field, Format21c, T_SETS),
    Opcode::new(0x64, "sget-byte", R::Field, Format21c, T_SETS),
    Opcode::new(0x65, "sget-char", R::Field, Format21c, T_SETS),
    Opcode::new(0x66, "sget-short", R::Field, Format21c, T_SETS),
    Opcode::new(0x67, "sput", R::Field, Format21c, THROW),
    Opcode::new(0x68, "sput-wide", R::Field, Format21c, THROW),
    Opcode::new(0x69, "sput-object", R::Field, Format21c, THROW),
    Opcode::new(0x6a, "sput-boolean", R::Field, Format21c, THROW),
    Opcode::new(0x6b, "sput-byte", R::Field, Format21c, THROW),
    Opcode::new(0x6c, "sput-char", R::Field, Format21c, THROW),
    Opcode::new(0x6d, "sput-short", R::Field, Format21c, THROW),
    Opcode::new(0x6e, "invoke-virtual", R::Method, Format35c, RESULT),
    Opcode::new(0x6f, "invoke-super", R::Method, Format35c, RESULT),
    Opcode::new(0x70, "invoke-direct", R::Method, Format35c, RESULT),
    Opcode::new(0x71, "invoke-static", R::Method, Format35c, RESULT),
    Opcode::new(0x72, "invoke-interface", R::Method, Format35c, RESULT),
    Opcode::new(0x74, "invoke-virtual/range", R::Method, Format3rc, RESULT),
    Opcode::new(0x75, "invoke-super/range", R::Method, Format3rc, RESULT),
    Opcode::new(0x76, "invoke-direct/range", R::Method, Format3rc, RESULT),
    Opcode::new(0x77, "invoke-static/range", R::Method, Format3rc, RESULT),
    Opcode::new(0x78, "invoke-interface/range", R::Method, Format3rc, RESULT),
    Opcode::new(0x7b, "neg-int", R::None, Format12x, SETS),
    Opcode::new(0x7c, "not-int", R::None, Format12x, SETS),
    Opcode::new(0x7d, "neg-long", R::None, Format12x, SETS_W),
    Opcode::new(0x7e, "not-long", R::None, Format12x, SETS_W),
    Opcode::new(0x7f, "neg-float", R::None, Format12x, SETS),
    Opcode::new(0x80, "neg-double", R::None, Format12x, SETS_W),
    Opcode::new(0x81, "int-to-long", R::None, Format12x, SETS_W),
    Opcode::new(0x82, "int-to-float", R::None, Format12x, SETS),
    Opcode::new(0x83, "int-to-double", R::None, Format12x, SETS_W),
    Opcode::new(0x84, "long-to-int", R::None, Format12x, SETS),
    Opcode::new(0x85, "long-to-float", R::None, Format12x, SETS),
    Opcode::new(0x86, "long-to-double", R::None, Format12x, SETS_W),
    Opcode::new(0x87, "float-to-int", R::None, Format12x, SETS),
    Opcode::new(0x88, "float-to-long", R::None, Format12x, SETS_W),
    Opcode::new(0x89, "float-to-double", R::None, Format12x, SETS_W),
    Opcode::new(0x8a, "double-to-int", R::None, Format12x, SETS),
    Opcode::new(0x8b, "double-to-long", R::None, Format12x, SETS_W),
    Opcode::new(0x8c, "double-to-float", R::None, Format12x, SETS),
    Opcode::new(0x8d, "int-to-byte", R::None, Format12x, SETS),
    Opcode::new(0x8e, "int-to-char", R::None, Format12x, SETS),
    Opcode::new(0x8f, "int-to-short", R::None, Format12x, SETS),
    Opcode::new(0x90, "add-int", R::None, Format23x, SETS),
    Opcode::new(0x91, "sub-int", R::None, Format23x, SETS),
    Opcode::new(0x92, "mul-int", R::None, Format23x, SETS),
    Opcode::new(0x93, "div-int", R::None, Format23x, T_SETS),
    Opcode::new(0x94, "rem-int", R::None, Format23x, T_SETS),
    Opcode::new(0x95, "and-int", R::None, Format23x, SETS),
    Opcode::new(0x96, "or-int", R::None, Format23x, SETS),
    Opcode::new(0x97, "xor-int", R::None, Format23x, SETS),
    Opcode::new(0x98, "shl-int", R::None, Format23x, SETS),
    Opcode::new(0x99, "shr-int", R::None, Format23x, SETS),
    Opcode::new(0x9a, "ushr-int", R::None, Format23x, SETS),
    Opcode::new(0x9b, "add-long", R::None, Format23x, SETS_W),
    Opcode::new(0x9c, "sub-long", R::None, Format23x, SETS_W),
    Opcode::new(0x9d, "mul-long", R::None, Format23x, SETS_W),
    Opcode::new(0x9e, "div-long", R::None, Format23x, T_SETS_W),
    Opcode::new(0x9f, "rem-long", R::None, Format23x, T_SETS_W),
    Opcode::new(0xa0, "and-long", R::None, Format23x, SETS_W),
    Opcode::new(0xa1, "or-long", R::None, Format23x, SETS_W),
    Opcode::new(0xa2, "xor-long", R::None, Format23x, SETS_W),
    Opcode::new(0xa3, "shl-long", R::None, Format23x, SETS_W),
    Opcode::new(0xa4, "shr-long", R::None, Format23x, SETS_W),
    Opcode::new(0xa5, "ushr-long", R::None, Format23x, SETS_W),
    Opcode::new(0xa6, "add-float", R::None, Format23x, SETS),
    Opcode::new(0xa7, "sub-float", R::None, Format23x, SETS),
    Opcode::new(0xa8, "mul-float", R::None, Format23x, SETS),
    Opcode::new(0xa9, "div-float", R::None, Format23x, SETS),
    Opcode::new(0xaa, "rem-float", R::None, Format23x, SETS),
    Opcode::new(0xab, "add-double", R::None, Format23x, SETS_W),
    Opcode::new(0xac, "sub-double", R::None, Format23x, SETS_W),
    Opcode::new(0xad, "mul-double", R::None, Format23x, SETS_W),
    Opcode::new(0xae, "div-double", R::None, Format23x, SETS_W),
    Opcode::new(0xaf, "rem-double", R::None, Format23x, SETS_W),
    Opcode::new(0xb0, "add-int/2addr", R::None, Format12x, SETS),
    Opcode::new(0xb1, "sub-int/2addr", R::None, Format12x, SETS),
    Opcode::new(0xb2, "mul-int/2addr", R::None, Format12x, SETS),
    Opcode::new(0xb3, "div-int/2addr", R::None, Format12x, T_SETS),
    Opcode::new(0xb4, "rem-int/2addr", R::None, Format12x, T_SETS),
    Opcode::new(0xb5, "and-int/2addr", R::None, Format12x, SETS),
    Opcode::new(0xb6, "or-int/2addr", R::None, Format12x, SETS),
    Opcode::new(0xb7, "xor-int/2addr", R::None, Format12x, SETS),
    Opcode::new(0xb8, "shl-int/2addr", R::None, Format12x, SETS),
    Opcode::new(0xb9, "shr-int/2addr", R::None, Format12x, SETS),
    Opcode::new(0xba, "ushr-int/2addr", R::None, Format12x, SETS),
    Opcode::new(0xbb, "add-long/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xbc, "sub-long/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xbd, "mul-long/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xbe, "div-long/2addr", R::None, Format12x, T_SETS_W),
    Opcode::new(0xbf, "rem-long/2addr", R::None, Format12x, T_SETS_W),
    Opcode::new(0xc0, "and-long/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xc1, "or-long/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xc2, "xor-long/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xc3, "shl-long/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xc4, "shr-long/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xc5, "ushr-long/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xc6, "add-float/2addr", R::None, Format12x, SETS),
    Opcode::new(0xc7, "sub-float/2addr", R::None, Format12x, SETS),
    Opcode::new(0xc8, "mul-float/2addr", R::None, Format12x, SETS),
    Opcode::new(0xc9, "div-float/2addr", R::None, Format12x, SETS),
    Opcode::new(0xca, "rem-float/2addr", R::None, Format12x, SETS),
    Opcode::new(0xcb, "add-double/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xcc, "sub-double/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xcd, "mul-double/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xce, "div-double/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xcf, "rem-double/2addr", R::None, Format12x, SETS_W),
    Opcode::new(0xd0, "add-int/lit16", R::None, Format22s, SETS),
    Opcode::new(0xd1, "rsub-int", R::None, Format22s, SETS),
    Opcode::new(0xd2, "mul-int/lit16", R::None, Format22s, SETS),
    Opcode::new(0xd3, "div-int/lit16", R::None, Format22s, T_SETS),
    Opcode::new(0xd4, "rem-int/lit16", R::None, Format22s, T_SETS),
    Opcode::new(0xd5, "and-int/lit16", R::None, Format22s, SETS),
    Opcode::new(0xd6, "or-int/lit16", R::None, Format22s, SETS),
    Opcode::new(0xd7, "xor-int/lit16", R::None, Format22s, SETS),
    Opcode::new(0xd8, "add-int/lit8", R::None, Format22b, SETS),
    Opcode::new(0xd9, "rsub-int/lit8", R::None, Format22b, SETS),
    Opcode::new(0xda, "mul-int/lit8", R::None, Format22b, SETS),
    Opcode::new(0xdb, "div-int/lit8", R::None, Format22b, T_SETS),
    Opcode::new(0xdc, "rem-int/lit8", R::None, Format22b, T_SETS),
    Opcode::new(0xdd, "and-int/lit8", R::None, Format22b, SETS),
    Opcode::new(0xde, "or-int/lit8", R::None, Format22b, SETS),
    Opcode::new(0xdf, "xor-int/lit8", R::None, Format22b, SETS),
    Opcode::new(0xe0, "shl-int/lit8", R::None, Format22b, SETS),
    Opcode::new(0xe1, "shr-int/lit8", R::None, Format22b, SETS),
    Opcode::new(0xe2, "ushr-int/lit8", R::None, Format22b, SETS),
    Opcode::new(0xfa, "invoke-polymorphic", R::Method, Format45cc, RESULT),
    Opcode::new(0xfb, "invoke-polymorphic/range", R::Method, Format4rcc, RESULT),
    Opcode::new(0xfc, "invoke-custom", R::CallSite, Format35c, RESULT),
    Opcode::new(0xfd, "invoke-custom/range", R::CallSite, Format3rc, RESULT),
    Opcode::new(0xfe, "const-method-handle", R::MethodHandle, Format21c, T_SETS),
    Opcode::new(0xff, "const-method-type", R::MethodProto, Format21c, T_SETS),
];

static BY_VALUE: Lazy<[Option<&'static Opcode>; 256]> = Lazy::new(|| {
    let mut table: [Option<&'static Opcode>; 256] = [None; 256];
    for op in OPCODES {
        debug_assert!(table[op.value as usize].is_none(), "duplicate opcode 0x{:02x}", op.value);
        table[op.value as usize] = Some(op);
    }
    table
});

/// Looks up an opcode by its wire value.
pub fn opcode(value: u8) -> Option<&'static Opcode> {
    BY_VALUE[value as usize]
}
