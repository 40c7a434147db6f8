// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Runtime reflection over live simulation memory.
//!
//! A [`MemoryDirectory`] maps variable names to [`RefDescriptor`]s: a raw
//! address, a runtime type tag, element size, and declared dimensions. The
//! marshaling layer treats values as opaque byte runs of known length and
//! only interprets the type tag at final rendering.
//!
//! # Architecture
//!
//! ```text
//! +-----------------------------------------------------------+
//! |  embedder / simulation                                    |
//! |     declares variables into a VarRegistry                 |
//! +-----------------------------------------------------------+
//! |  MemoryDirectory (trait)                                  |
//! |     resolve | is_known_region | live count | text handle  |
//! +-----------------------------------------------------------+
//! |  raw peek boundary (this module, unsafe)                  |
//! |     bounded copy | pointer-cell read | capped NUL scans   |
//! +-----------------------------------------------------------+
//! ```
//!
//! All raw-pointer interpretation is confined to the handful of helpers at
//! the bottom of this module; everything above them works on descriptors
//! and byte slices.

pub mod registry;

use crate::config::ERROR_TOKEN_BYTES;

/// Raw address of a simulation variable, as an integer.
pub type VarAddress = usize;

/// Address value meaning "no target".
pub const NULL_ADDR: VarAddress = 0;

// =======================================================================
// Bad-address sentinel
// =======================================================================

/// Process-wide cell whose address marks references that failed to resolve.
///
/// Using a real static (never null) keeps the invalid path safe to stage:
/// marshaling an invalid reference copies these bytes, producing the fixed
/// zero token instead of touching an unmapped page.
static BAD_REF_CELL: i32 = 0;

/// Address of the bad-address sentinel. Stable for the process lifetime.
#[inline]
pub fn bad_ref_addr() -> VarAddress {
    std::ptr::addr_of!(BAD_REF_CELL) as VarAddress
}

// =======================================================================
// Type tags
// =======================================================================

/// Runtime type tag for a simulation variable.
///
/// The tag drives sizing, ASCII rendering, and byte-swap granularity. It is
/// a closed set; dispatch on it is always an explicit `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    /// One byte, rendered as `1`/`0`.
    Bool,
    /// One byte, rendered as a character glyph (escaped when unprintable).
    Char,
    /// One byte, rendered as its decimal value.
    U8,
    /// Four-byte wide character, rendered as its decimal code point.
    WChar,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Four-byte enumeration discriminant, rendered in decimal.
    Enum,
    /// Narrow text. Staged from the live string each cycle.
    Text,
    /// Wide text (4-byte code units). Staged from the live string each cycle.
    WText,
    /// Resolution-failure sentinel. Marshals a fixed zero token.
    Invalid,
}

impl BaseType {
    /// True for the text-run types, which are never byte-swapped and render
    /// as (escaped) strings.
    #[inline]
    pub fn is_text(self) -> bool {
        matches!(self, BaseType::Text | BaseType::WText)
    }
}

// =======================================================================
// Descriptors
// =======================================================================

/// Resolved description of one variable: where it lives and how to read it.
#[derive(Debug, Clone)]
pub struct RefDescriptor {
    /// Fully qualified name the variable was resolved under.
    pub name: String,
    /// Address of the value, or of the pointer cell when
    /// `pointer_present` is set.
    pub addr: VarAddress,
    /// Runtime type tag of one element.
    pub base_type: BaseType,
    /// Size of one element in bytes.
    pub elem_size: usize,
    /// Declared extents. An entry of `0` is an unbounded trailing dimension
    /// sized from the live container instead of the declaration.
    pub dims: Vec<usize>,
    /// How many leading dimensions the request already indexed away.
    pub indexed_dims: usize,
    /// The address designates a pointer cell that must be followed to reach
    /// the payload.
    pub pointer_present: bool,
    /// Declared base unit, when the variable carries one.
    pub unit: Option<String>,
}

impl RefDescriptor {
    /// Descriptor for a name that failed to resolve. Points at the
    /// bad-address sentinel and marshals the fixed error token.
    pub fn error(name: &str) -> Self {
        RefDescriptor {
            name: name.to_string(),
            addr: bad_ref_addr(),
            base_type: BaseType::Invalid,
            elem_size: ERROR_TOKEN_BYTES,
            dims: Vec::new(),
            indexed_dims: 0,
            pointer_present: false,
            unit: Some("--".to_string()),
        }
    }
}

/// Live byte run of a managed text value.
#[derive(Debug, Clone, Copy)]
pub struct TextHandle {
    /// Address of the first byte of character data.
    pub addr: VarAddress,
    /// Current length in bytes (code units x unit size for wide text).
    pub len_bytes: usize,
}

// =======================================================================
// Directory trait
// =======================================================================

/// Name-to-memory mapping consumed by the marshaling layer.
///
/// Implementations own all address bookkeeping; callers of the raw peek
/// helpers below trust the descriptors a directory hands out.
pub trait MemoryDirectory: Send + Sync {
    /// Resolve a name to a descriptor. `None` when the name is unknown or
    /// does not designate a leaf value.
    fn resolve(&self, name: &str) -> Option<RefDescriptor>;

    /// Whether `addr` falls inside a region the directory still tracks.
    fn is_known_region(&self, addr: VarAddress) -> bool;

    /// Live element count of an unbounded trailing dimension.
    fn live_element_count(&self, desc: &RefDescriptor) -> usize;

    /// Byte run of the managed text value at `addr`, if `addr` designates
    /// one.
    fn text_handle(&self, addr: VarAddress) -> Option<TextHandle>;
}

// =======================================================================
// Raw peek boundary
// =======================================================================

/// Copy `dst.len()` bytes from a raw simulation address.
///
/// # Safety
/// `src` must designate at least `dst.len()` readable bytes for the duration
/// of the call. Descriptors from a live directory entry satisfy this.
#[inline]
pub(crate) unsafe fn copy_from_addr(src: VarAddress, dst: &mut [u8]) {
    // SAFETY: caller guarantees src covers dst.len() readable bytes; dst is
    // a fresh exclusive slice, so the ranges cannot overlap.
    std::ptr::copy_nonoverlapping(src as *const u8, dst.as_mut_ptr(), dst.len());
}

/// Read one pointer-width value from a pointer cell.
///
/// # Safety
/// `addr` must designate a readable, aligned pointer-sized cell.
#[inline]
pub(crate) unsafe fn read_ptr_cell(addr: VarAddress) -> VarAddress {
    // SAFETY: caller guarantees addr is a live aligned pointer cell.
    *(addr as *const usize)
}

/// Length in bytes of a NUL-terminated narrow string, capped at `cap`.
///
/// # Safety
/// `addr` must designate readable bytes up to and including either the
/// terminating NUL or the `cap` boundary.
pub(crate) unsafe fn narrow_text_len(addr: VarAddress, cap: usize) -> usize {
    let base = addr as *const u8;
    for i in 0..cap {
        // SAFETY: i < cap, within the caller-guaranteed readable range.
        if *base.add(i) == 0 {
            return i;
        }
    }
    cap
}

/// Length in code units of a zero-terminated wide string, capped at
/// `cap_units`.
///
/// # Safety
/// `addr` must designate readable, aligned 4-byte units up to and including
/// either the terminating zero or the `cap_units` boundary.
pub(crate) unsafe fn wide_text_len(addr: VarAddress, cap_units: usize) -> usize {
    let base = addr as *const u32;
    for i in 0..cap_units {
        // SAFETY: i < cap_units, within the caller-guaranteed readable range.
        if *base.add(i) == 0 {
            return i;
        }
    }
    cap_units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_ref_addr_is_stable_and_nonzero() {
        let a = bad_ref_addr();
        let b = bad_ref_addr();
        assert_ne!(a, NULL_ADDR);
        assert_eq!(a, b);
    }

    #[test]
    fn test_error_descriptor_points_at_sentinel() {
        let desc = RefDescriptor::error("missing.var");
        assert_eq!(desc.addr, bad_ref_addr());
        assert_eq!(desc.base_type, BaseType::Invalid);
        assert_eq!(desc.elem_size, ERROR_TOKEN_BYTES);
        assert_eq!(desc.unit.as_deref(), Some("--"));
    }

    #[test]
    fn test_narrow_text_len_stops_at_nul_or_cap() {
        let bytes = *b"jackie\0extra";
        let addr = bytes.as_ptr() as VarAddress;
        assert_eq!(unsafe { narrow_text_len(addr, bytes.len()) }, 6);
        assert_eq!(unsafe { narrow_text_len(addr, 3) }, 3);
    }

    #[test]
    fn test_wide_text_len_stops_at_zero_unit() {
        let units: [u32; 5] = [0x6a, 0x61, 0x79, 0, 0x41];
        let addr = units.as_ptr() as VarAddress;
        assert_eq!(unsafe { wide_text_len(addr, units.len()) }, 3);
    }
}
