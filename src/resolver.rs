//! The boundary to the constant pools.
//!
//! The assembler never owns string, type, field or method pools; it asks an
//! injected resolver for indices and trusts what it gets back. A resolver
//! that cannot satisfy a lookup reports `ErrorKind::Unresolved` with the
//! symbol text. Sharing one resolver across threads is the owner's concern.

use crate::error::DexError;

pub trait PoolResolver {
    fn string_index(&self, s: &str) -> Result<u32, DexError>;

    /// `descriptor` is a type descriptor, e.g. `Ljava/lang/String;`.
    fn type_index(&self, descriptor: &str) -> Result<u32, DexError>;

    fn field_index(&self, class: &str, name: &str, descriptor: &str) -> Result<u32, DexError>;

    /// `proto` is a method prototype descriptor, e.g. `(I)V`.
    fn method_index(&self, class: &str, name: &str, proto: &str) -> Result<u32, DexError>;

    fn proto_index(&self, proto: &str) -> Result<u32, DexError>;

    fn call_site_index(&self, name: &str) -> Result<u32, DexError>;

    fn method_handle_index(&self, name: &str) -> Result<u32, DexError>;
}

/// Resolves everything to index 0. Only useful for tests and for assembling
/// bodies whose encoded bytes will be re-linked later.
pub struct NullResolver;

impl PoolResolver for NullResolver {
    fn string_index(&self, _s: &str) -> Result<u32, DexError> {
        Ok(0)
    }

    fn type_index(&self, _descriptor: &str) -> Result<u32, DexError> {
        Ok(0)
    }

    fn field_index(&self, _class: &str, _name: &str, _descriptor: &str) -> Result<u32, DexError> {
        Ok(0)
    }

    fn method_index(&self, _class: &str, _name: &str, _proto: &str) -> Result<u32, DexError> {
        Ok(0)
    }

    fn proto_index(&self, _proto: &str) -> Result<u32, DexError> {
        Ok(0)
    }

    fn call_site_index(&self, _name: &str) -> Result<u32, DexError> {
        Ok(0)
    }

    fn method_handle_index(&self, _name: &str) -> Result<u32, DexError> {
        Ok(0)
    }
}
