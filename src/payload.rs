//! Out-of-line payload pseudo-instructions: switch tables and array data.
//!
//! A payload starts with a NOP-coded unit whose high byte is the ident, so a
//! linear opcode scan cannot find one; callers reach them through the 31t
//! reference that points at them. Every payload must start at an even
//! code-unit offset.

use serde::{Deserialize, Serialize};

use crate::error::{DexError, ErrorKind};

pub const PACKED_SWITCH_IDENT: u16 = 0x0100;
pub const SPARSE_SWITCH_IDENT: u16 = 0x0200;
pub const FILL_ARRAY_DATA_IDENT: u16 = 0x0300;

/// A decoded payload block. Switch targets are signed code-unit deltas
/// relative to the referencing instruction, not to the payload itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    PackedSwitch { first_key: i32, targets: Vec<i32> },
    SparseSwitch { keys: Vec<i32>, targets: Vec<i32> },
    FillArrayData { element_width: u16, data: Vec<u8> },
}

impl Payload {
    /// Length in 16-bit code units, including the ident and size units.
    pub fn units(&self) -> usize {
        match self {
            Payload::PackedSwitch { targets, .. } => 4 + 2 * targets.len(),
            Payload::SparseSwitch { keys, .. } => 2 + 4 * keys.len(),
            Payload::FillArrayData { data, .. } => 4 + data.len().div_ceil(2),
        }
    }

    /// Checks internal consistency: sparse keys strictly ascending and
    /// matching the target count, array width one of 1/2/4/8 dividing the
    /// data length.
    pub fn validate(&self) -> Result<(), DexError> {
        match self {
            Payload::PackedSwitch { targets, .. } => {
                if targets.len() > u16::MAX as usize {
                    return Err(ErrorKind::BadPayload {
                        reason: "packed-switch has more than 65535 targets",
                    }
                    .into());
                }
                Ok(())
            }
            Payload::SparseSwitch { keys, targets } => {
                if keys.len() != targets.len() {
                    return Err(ErrorKind::BadPayload {
                        reason: "sparse-switch key and target counts differ",
                    }
                    .into());
                }
                if keys.len() > u16::MAX as usize {
                    return Err(ErrorKind::BadPayload {
                        reason: "sparse-switch has more than 65535 entries",
                    }
                    .into());
                }
                for (i, pair) in keys.windows(2).enumerate() {
                    if pair[1] <= pair[0] {
                        return Err(ErrorKind::UnsortedSwitchKeys { position: i + 1 }.into());
                    }
                }
                Ok(())
            }
            Payload::FillArrayData { element_width, data } => {
                if !matches!(element_width, 1 | 2 | 4 | 8) {
                    return Err(ErrorKind::BadPayload {
                        reason: "array element width must be 1, 2, 4 or 8",
                    }
                    .into());
                }
                if data.len() % *element_width as usize != 0 {
                    return Err(ErrorKind::BadPayload {
                        reason: "array data length is not a multiple of the element width",
                    }
                    .into());
                }
                Ok(())
            }
        }
    }

    /// Encodes the payload into code units. Fails if [`Self::validate`] does.
    pub fn encode(&self) -> Result<Vec<u16>, DexError> {
        self.validate()?;
        let mut out = Vec::with_capacity(self.units());
        match self {
            Payload::PackedSwitch { first_key, targets } => {
                out.push(PACKED_SWITCH_IDENT);
                out.push(targets.len() as u16);
                push_i32(&mut out, *first_key);
                for &t in targets {
                    push_i32(&mut out, t);
                }
            }
            Payload::SparseSwitch { keys, targets } => {
                out.push(SPARSE_SWITCH_IDENT);
                out.push(keys.len() as u16);
                for &k in keys {
                    push_i32(&mut out, k);
                }
                for &t in targets {
                    push_i32(&mut out, t);
                }
            }
            Payload::FillArrayData { element_width, data } => {
                out.push(FILL_ARRAY_DATA_IDENT);
                out.push(*element_width);
                let count = (data.len() / *element_width as usize) as u32;
                out.push(count as u16);
                out.push((count >> 16) as u16);
                for pair in data.chunks(2) {
                    let lo = pair[0] as u16;
                    let hi = pair.get(1).copied().unwrap_or(0) as u16;
                    out.push(lo | (hi << 8));
                }
            }
        }
        Ok(out)
    }
}

fn push_i32(out: &mut Vec<u16>, v: i32) {
    let bits = v as u32;
    out.push(bits as u16);
    out.push((bits >> 16) as u16);
}

fn require(units: &[u16], pc: usize, need: usize) -> Result<(), DexError> {
    if pc + need > units.len() {
        return Err(ErrorKind::TruncatedStream {
            opcode: "payload",
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

/// Decodes the payload block starting at `pc`, returning it and its length
/// in code units. `pc` must point at the ident unit.
pub fn payload_at(units: &[u16], pc: usize) -> Result<(Payload, usize), DexError> {
    require(units, pc, 2)?;
    match units[pc] {
        PACKED_SWITCH_IDENT => {
            let count = units[pc + 1] as usize;
            let len = 4 + 2 * count;
            require(units, pc, len)?;
            let first_key = i32_at(units, pc + 2);
            let mut targets = Vec::with_capacity(count);
            for i in 0..count {
                targets.push(i32_at(units, pc + 4 + 2 * i));
            }
            Ok((Payload::PackedSwitch { first_key, targets }, len))
        }
        SPARSE_SWITCH_IDENT => {
            let count = units[pc + 1] as usize;
            let len = 2 + 4 * count;
            require(units, pc, len)?;
            let mut keys = Vec::with_capacity(count);
            let mut targets = Vec::with_capacity(count);
            for i in 0..count {
                keys.push(i32_at(units, pc + 2 + 2 * i));
                targets.push(i32_at(units, pc + 2 + 2 * count + 2 * i));
            }
            let payload = Payload::SparseSwitch { keys, targets };
            payload.validate()?;
            Ok((payload, len))
        }
        FILL_ARRAY_DATA_IDENT => {
            require(units, pc, 4)?;
            let element_width = units[pc + 1];
            let count = units[pc + 2] as u32 | ((units[pc + 3] as u32) << 16);
            let bytes = (element_width as usize)
                .checked_mul(count as usize)
                .ok_or(ErrorKind::BadPayload { reason: "array data size overflows" })?;
            let len = 4 + bytes.div_ceil(2);
            require(units, pc, len)?;
            let mut data = Vec::with_capacity(bytes);
            for i in 0..bytes {
                let unit = units[pc + 4 + i / 2];
                data.push(if i % 2 == 0 { unit as u8 } else { (unit >> 8) as u8 });
            }
            let payload = Payload::FillArrayData { element_width, data };
            payload.validate()?;
            Ok((payload, len))
        }
        other => Err(ErrorKind::UnknownIdent { ident: other, offset: pc }.into()),
    }
}
