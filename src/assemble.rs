//! The two-pass method assembler.
//!
//! Pass one walks the body once, binding every label to its code-unit offset;
//! pass two re-walks it, resolving registers, labels and pool references and
//! encoding instructions. Both passes must compute instruction lengths the
//! same way, which they do by sharing the format table. Payload blocks are
//! appended after the last instruction, NOP-padded to even offsets, and the
//! 31t references that point at them are patched in place.

use std::collections::{BTreeMap, HashMap};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::codec::encode;
use crate::error::{DexError, ErrorKind};
use crate::insns::{Insn, Operands};
use crate::opcodes::{opcode, Opcode, ReferenceType};
use crate::payload::Payload;
use crate::regs::{RegisterWindow, SymReg};
use crate::resolver::PoolResolver;

/// A symbolic constant-pool reference, resolved to an index at emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefTarget {
    Str(String),
    Type(String),
    Field { class: String, name: String, descriptor: String },
    Method { class: String, name: String, proto: String },
    Proto(String),
    CallSite(String),
    MethodHandle(String),
}

/// Operand shapes on the symbolic side: registers are `vN`/`pN`, branch and
/// payload targets are labels, pool references are textual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsmOperands {
    None,
    Regs(Vec<SymReg>),
    Lit { regs: Vec<SymReg>, value: i64 },
    Branch { regs: Vec<SymReg>, label: String },
    Ref { regs: Vec<SymReg>, target: RefTarget },
    /// 45cc: an invoke-polymorphic call with its separate proto index.
    RefPair { regs: Vec<SymReg>, target: RefTarget, proto: String },
    Range { first: SymReg, count: u8, target: RefTarget },
    /// 4rcc.
    RangePair { first: SymReg, count: u8, target: RefTarget, proto: String },
    PayloadRef { reg: SymReg, label: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsmInsn {
    pub opcode: u8,
    pub operands: AsmOperands,
}

/// One element of a symbolic method body, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyItem {
    Label(String),
    Insn(AsmInsn),
    /// A packed-switch table; targets are labels, deltas are computed from
    /// the single referencing instruction.
    PackedSwitchData { label: String, first_key: i32, targets: Vec<String> },
    SparseSwitchData { label: String, entries: Vec<(i32, String)> },
    ArrayData { label: String, element_width: u16, data: Vec<u8> },
    /// An exception handler range. `exception` is a type descriptor;
    /// `None` is the catch-all.
    Catch { start: String, end: String, exception: Option<String>, handler: String },
}

/// How the register count was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegDirective {
    Registers(u16),
    Locals(u16),
}

/// The assembler's input: one method body plus the externally derived count
/// of input-argument words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBody {
    pub regs: RegDirective,
    pub ins_words: u16,
    pub items: Vec<BodyItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchHandler {
    /// Resolved exception type index; `None` for the catch-all.
    pub type_index: Option<u32>,
    pub addr: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryItem {
    pub start_addr: u32,
    pub insn_count: u16,
    pub handlers: Vec<CatchHandler>,
}

/// The assembled method: sizes, code units, the final label table and the
/// exception ranges, everything a code-item writer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodAssembly {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub code_units: Vec<u16>,
    pub label_offsets: HashMap<String, u32>,
    pub tries: Vec<TryItem>,
}

/// Which kind of payload declaration a label names.
enum PayloadDecl {
    Switch,
    Array,
}

/// A 31t delta slot waiting for its payload's final offset.
struct PatchSite {
    patch_at: usize,
    insn_offset: u32,
}

pub struct MethodAssembler<'a, R: PoolResolver> {
    resolver: &'a R,
}

impl<'a, R: PoolResolver> MethodAssembler<'a, R> {
    pub fn new(resolver: &'a R) -> Self {
        MethodAssembler { resolver }
    }

    pub fn assemble(&self, body: &MethodBody) -> Result<MethodAssembly, DexError> {
        let window = match body.regs {
            RegDirective::Registers(n) => RegisterWindow::from_registers(n, body.ins_words)?,
            RegDirective::Locals(n) => RegisterWindow::from_locals(n, body.ins_words)?,
        };

        let (labels, payload_decls) = collect_labels(&body.items)?;

        let mut code: Vec<u16> = Vec::new();
        let mut outs: u16 = 0;
        let mut patches: HashMap<String, Vec<PatchSite>> = HashMap::new();

        for item in &body.items {
            let BodyItem::Insn(insn) = item else { continue };
            let def = lookup(insn.opcode)?;
            let offset = code.len() as u32;
            let lowered =
                lower(insn, def, offset, &window, &labels, &payload_decls, self.resolver)?;
            if let AsmOperands::PayloadRef { label, .. } = &insn.operands {
                patches.entry(label.clone()).or_default().push(PatchSite {
                    patch_at: code.len() + 1,
                    insn_offset: offset,
                });
            }
            code.extend(encode(&lowered)?);
            if let Some(words) = invoke_arg_words(def, &lowered) {
                outs = outs.max(words);
            }
        }

        let mut labels = labels;
        append_payloads(&body.items, &mut code, &mut labels, &patches)?;

        let tries = build_tries(&body.items, &labels, self.resolver)?;

        Ok(MethodAssembly {
            registers_size: window.registers_size(),
            ins_size: window.ins_size(),
            outs_size: outs,
            code_units: code,
            label_offsets: labels,
            tries,
        })
    }
}

fn lookup(value: u8) -> Result<&'static Opcode, DexError> {
    opcode(value)
        .ok_or_else(|| ErrorKind::UnknownOpcode { opcode: value, offset: None }.into())
}

/// The collection pass: one walk binding labels to offsets. Instructions
/// advance by their format's fixed length; payload declarations contribute
/// zero because they are appended after the last instruction.
fn collect_labels(
    items: &[BodyItem],
) -> Result<(HashMap<String, u32>, HashMap<String, PayloadDecl>), DexError> {
    let mut labels: HashMap<String, u32> = HashMap::new();
    let mut payload_decls: HashMap<String, PayloadDecl> = HashMap::new();
    let mut offset: u32 = 0;
    for item in items {
        match item {
            BodyItem::Label(name) => {
                // Payload labels share the namespace, whichever is declared first.
                if payload_decls.contains_key(name)
                    || labels.insert(name.clone(), offset).is_some()
                {
                    return Err(
                        ErrorKind::DuplicateLabel { label: name.clone(), offset }.into()
                    );
                }
            }
            BodyItem::Insn(insn) => {
                offset += lookup(insn.opcode)?.format.units() as u32;
            }
            BodyItem::PackedSwitchData { label, .. } | BodyItem::SparseSwitchData { label, .. } => {
                if labels.contains_key(label)
                    || payload_decls.insert(label.clone(), PayloadDecl::Switch).is_some()
                {
                    return Err(
                        ErrorKind::DuplicateLabel { label: label.clone(), offset }.into()
                    );
                }
            }
            BodyItem::ArrayData { label, .. } => {
                if labels.contains_key(label)
                    || payload_decls.insert(label.clone(), PayloadDecl::Array).is_some()
                {
                    return Err(
                        ErrorKind::DuplicateLabel { label: label.clone(), offset }.into()
                    );
                }
            }
            BodyItem::Catch { .. } => {}
        }
    }
    Ok((labels, payload_decls))
}

fn resolve_regs(
    def: &Opcode,
    window: &RegisterWindow,
    regs: &[SymReg],
) -> Result<Vec<u16>, DexError> {
    regs.iter()
        .enumerate()
        .map(|(i, &r)| window.resolve(r).map_err(|e| e.at_operand(def.name, i)))
        .collect()
}

fn resolve_ref(
    def: &Opcode,
    target: &RefTarget,
    resolver: &impl PoolResolver,
) -> Result<u32, DexError> {
    match (def.reference_type, target) {
        (ReferenceType::String, RefTarget::Str(s)) => resolver.string_index(s),
        (ReferenceType::Type, RefTarget::Type(d)) => resolver.type_index(d),
        (ReferenceType::Field, RefTarget::Field { class, name, descriptor }) => {
            resolver.field_index(class, name, descriptor)
        }
        (ReferenceType::Method, RefTarget::Method { class, name, proto }) => {
            resolver.method_index(class, name, proto)
        }
        (ReferenceType::MethodProto, RefTarget::Proto(p)) => resolver.proto_index(p),
        (ReferenceType::CallSite, RefTarget::CallSite(n)) => resolver.call_site_index(n),
        (ReferenceType::MethodHandle, RefTarget::MethodHandle(n)) => {
            resolver.method_handle_index(n)
        }
        _ => Err(ErrorKind::OperandMismatch {
            opcode: def.name,
            expected: "a pool reference matching the opcode's reference kind",
        }
        .into()),
    }
    .map_err(|e| e.context(def.name))
}

fn branch_target(
    def: &Opcode,
    labels: &HashMap<String, u32>,
    label: &str,
    insn_offset: u32,
) -> Result<i32, DexError> {
    let target = labels
        .get(label)
        .ok_or_else(|| ErrorKind::UnknownLabel { label: label.to_string(), opcode: def.name })?;
    Ok(*target as i32 - insn_offset as i32)
}

/// Lowers one symbolic instruction to its absolute form. Branch deltas are
/// final here; payload deltas are zero until the patch pass.
fn lower(
    insn: &AsmInsn,
    def: &'static Opcode,
    offset: u32,
    window: &RegisterWindow,
    labels: &HashMap<String, u32>,
    payload_decls: &HashMap<String, PayloadDecl>,
    resolver: &impl PoolResolver,
) -> Result<Insn, DexError> {
    let operands = match &insn.operands {
        AsmOperands::None => Operands::None,
        AsmOperands::Regs(regs) => Operands::Regs(resolve_regs(def, window, regs)?),
        AsmOperands::Lit { regs, value } => {
            Operands::Lit { regs: resolve_regs(def, window, regs)?, value: *value }
        }
        AsmOperands::Branch { regs, label } => Operands::Branch {
            regs: resolve_regs(def, window, regs)?,
            delta: branch_target(def, labels, label, offset)?,
        },
        AsmOperands::Ref { regs, target } => Operands::Idx {
            regs: resolve_regs(def, window, regs)?,
            index: resolve_ref(def, target, resolver)?,
        },
        AsmOperands::RefPair { regs, target, proto } => Operands::IdxPair {
            regs: resolve_regs(def, window, regs)?,
            index: resolve_ref(def, target, resolver)?,
            index2: resolver.proto_index(proto).map_err(|e| e.context(def.name))?,
        },
        AsmOperands::Range { first, count, target } => Operands::Range {
            first: window.resolve(*first).map_err(|e| e.at_operand(def.name, 0))?,
            count: *count,
            index: resolve_ref(def, target, resolver)?,
        },
        AsmOperands::RangePair { first, count, target, proto } => Operands::RangePair {
            first: window.resolve(*first).map_err(|e| e.at_operand(def.name, 0))?,
            count: *count,
            index: resolve_ref(def, target, resolver)?,
            index2: resolver.proto_index(proto).map_err(|e| e.context(def.name))?,
        },
        AsmOperands::PayloadRef { reg, label } => {
            if !payload_decls.contains_key(label) {
                return Err(ErrorKind::UnknownLabel {
                    label: label.clone(),
                    opcode: def.name,
                }
                .into());
            }
            Operands::Payload {
                reg: window.resolve(*reg).map_err(|e| e.at_operand(def.name, 0))?,
                delta: 0,
            }
        }
    };
    Ok(Insn { opcode: insn.opcode, operands })
}

/// Outgoing argument words if this is an invoke, in either register-list or
/// range form.
fn invoke_arg_words(def: &Opcode, insn: &Insn) -> Option<u16> {
    if !matches!(def.reference_type, ReferenceType::Method | ReferenceType::CallSite) {
        return None;
    }
    match &insn.operands {
        Operands::Idx { regs, .. } | Operands::IdxPair { regs, .. } => Some(regs.len() as u16),
        Operands::Range { count, .. } | Operands::RangePair { count, .. } => {
            Some(*count as u16)
        }
        _ => None,
    }
}

const NOP: u16 = 0x0000;

/// Appends payload blocks in declaration order and patches the 31t delta
/// slots that reference them. Switch payloads take their target deltas from
/// their single referencing instruction; array payloads are position-free
/// and may be shared.
fn append_payloads(
    items: &[BodyItem],
    code: &mut Vec<u16>,
    labels: &mut HashMap<String, u32>,
    patches: &HashMap<String, Vec<PatchSite>>,
) -> Result<(), DexError> {
    for item in items {
        let (label, payload) = match item {
            BodyItem::PackedSwitchData { label, first_key, targets } => {
                let refs = single_ref(label, patches, "packed-switch")?;
                let Some(site) = refs else {
                    continue;
                };
                let mut deltas = Vec::with_capacity(targets.len());
                for t in targets {
                    let target = labels.get(t).ok_or_else(|| ErrorKind::UnknownLabel {
                        label: t.clone(),
                        opcode: "packed-switch",
                    })?;
                    deltas.push(*target as i32 - site.insn_offset as i32);
                }
                (label, Payload::PackedSwitch { first_key: *first_key, targets: deltas })
            }
            BodyItem::SparseSwitchData { label, entries } => {
                let refs = single_ref(label, patches, "sparse-switch")?;
                let Some(site) = refs else {
                    continue;
                };
                let mut keys = Vec::with_capacity(entries.len());
                let mut deltas = Vec::with_capacity(entries.len());
                for (key, t) in entries {
                    let target = labels.get(t).ok_or_else(|| ErrorKind::UnknownLabel {
                        label: t.clone(),
                        opcode: "sparse-switch",
                    })?;
                    keys.push(*key);
                    deltas.push(*target as i32 - site.insn_offset as i32);
                }
                (label, Payload::SparseSwitch { keys, targets: deltas })
            }
            BodyItem::ArrayData { label, element_width, data } => {
                if !patches.contains_key(label) {
                    warn!("array data :{} is never referenced, dropping it", label);
                    continue;
                }
                (label, Payload::FillArrayData { element_width: *element_width, data: data.clone() })
            }
            _ => continue,
        };

        if code.len() % 2 != 0 {
            code.push(NOP);
        }
        let payload_offset = code.len() as u32;
        labels.insert(label.clone(), payload_offset);
        for site in &patches[label] {
            let delta = (payload_offset as i32 - site.insn_offset as i32) as u32;
            code[site.patch_at] = delta as u16;
            code[site.patch_at + 1] = (delta >> 16) as u16;
        }
        let units = payload.encode()?;
        code.extend(units);
    }
    Ok(())
}

/// For a switch payload: its single patch site, `None` if unreferenced (the
/// declaration is then dropped with a warning), an error if shared.
fn single_ref<'p>(
    label: &str,
    patches: &'p HashMap<String, Vec<PatchSite>>,
    kind: &str,
) -> Result<Option<&'p PatchSite>, DexError> {
    match patches.get(label) {
        None => {
            warn!("{} data :{} is never referenced, dropping it", kind, label);
            Ok(None)
        }
        Some(sites) if sites.len() > 1 => {
            Err(ErrorKind::PayloadMultiplyReferenced { label: label.to_string() }.into())
        }
        Some(sites) => Ok(Some(&sites[0])),
    }
}

/// Builds the try/catch table: handler labels resolved, ranges grouped by
/// (start, end), typed handlers sorted by type index with at most one
/// catch-all per range, ranges emitted in start order.
fn build_tries(
    items: &[BodyItem],
    labels: &HashMap<String, u32>,
    resolver: &impl PoolResolver,
) -> Result<Vec<TryItem>, DexError> {
    let mut ranges: BTreeMap<(u32, u32), Vec<CatchHandler>> = BTreeMap::new();
    for item in items {
        let BodyItem::Catch { start, end, exception, handler } = item else { continue };
        let resolve = |label: &String| {
            labels.get(label).copied().ok_or_else(|| {
                DexError::new(ErrorKind::UnknownLabel { label: label.clone(), opcode: ".catch" })
            })
        };
        let start_addr = resolve(start)?;
        let end_addr = resolve(end)?;
        if start_addr >= end_addr || end_addr - start_addr > u16::MAX as u32 {
            return Err(
                ErrorKind::BadTryRange { start: start.clone(), end: end.clone() }.into()
            );
        }
        let type_index = match exception {
            Some(descriptor) => {
                Some(resolver.type_index(descriptor).map_err(|e| e.context(".catch"))?)
            }
            None => None,
        };
        let addr = resolve(handler)?;
        let handlers = ranges.entry((start_addr, end_addr)).or_default();
        if type_index.is_none() && handlers.iter().any(|h| h.type_index.is_none()) {
            return Err(DexError::new(ErrorKind::BadTryRange {
                start: start.clone(),
                end: end.clone(),
            })
            .context("second catch-all handler"));
        }
        handlers.push(CatchHandler { type_index, addr });
    }

    let mut tries = Vec::with_capacity(ranges.len());
    for ((start_addr, end_addr), mut handlers) in ranges {
        // Typed handlers in type-index order, the catch-all last.
        handlers.sort_by_key(|h| match h.type_index {
            Some(idx) => (0u8, idx),
            None => (1u8, 0),
        });
        tries.push(TryItem {
            start_addr,
            insn_count: (end_addr - start_addr) as u16,
            handlers,
        });
    }
    Ok(tries)
}
