//! # Dexasm
//!
//! A library for encoding, decoding and assembling Dalvik (DEX) method
//! bytecode
//!
//! The instruction codec ([`codec`]) turns instructions into 16-bit code
//! units and back; [`payload`] handles the out-of-line switch and array-data
//! blocks; [`assemble`] runs a two-pass symbolic assembler over a method body
//! with labels, `vN`/`pN` registers and textual pool references, producing a
//! ready-to-write code-unit array with exception ranges and register sizes.
//! Constant pools, the dex container and the textual smali syntax live in
//! collaborator crates behind the [`resolver::PoolResolver`] boundary.
//!
//! # Examples
//!
//! ```
//!  use dexasm::assemble::{AsmInsn, AsmOperands, BodyItem, MethodAssembler, MethodBody, RegDirective};
//!  use dexasm::regs::v;
//!  use dexasm::resolver::NullResolver;
//!
//!  let body = MethodBody {
//!      regs: RegDirective::Registers(1),
//!      ins_words: 0,
//!      items: vec![
//!          BodyItem::Insn(AsmInsn {
//!              opcode: 0x12, // const/4
//!              operands: AsmOperands::Lit { regs: vec![v(0)], value: 5 },
//!          }),
//!          BodyItem::Insn(AsmInsn {
//!              opcode: 0x0f, // return
//!              operands: AsmOperands::Regs(vec![v(0)]),
//!          }),
//!      ],
//!  };
//!  let out = MethodAssembler::new(&NullResolver).assemble(&body).unwrap();
//!  assert_eq!(out.code_units, vec![0x5012, 0x000f]);
//! ```

pub mod assemble;
pub mod codec;
pub mod error;
pub mod format;
pub mod insns;
pub mod opcodes;
pub mod payload;
pub mod regs;
pub mod resolver;
mod tests;

pub use error::{DexError, ErrorKind};
