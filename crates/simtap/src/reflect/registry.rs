// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! In-process variable registry.
//!
//! `VarRegistry` is the crate's [`MemoryDirectory`] implementation: the
//! embedder declares each observable variable once (name, address, type,
//! optional unit) and the telemetry layer resolves against it from then on.
//! Declaration is `unsafe` because the registry records raw addresses; the
//! embedder guarantees each declared value outlives its entry.

use super::{
    BaseType, MemoryDirectory, RefDescriptor, TextHandle, VarAddress, NULL_ADDR,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use widestring::U32String;

/// Maps a Rust scalar type to its runtime type tag.
///
/// `i8` is the glyph byte (`Char`), `u8` the numeric byte, and `char` the
/// 4-byte wide character.
pub trait SimValue: Copy {
    /// Type tag recorded in descriptors for this Rust type.
    const BASE_TYPE: BaseType;
}

macro_rules! impl_sim_value {
    ($($rust:ty => $tag:ident),* $(,)?) => {
        $(impl SimValue for $rust {
            const BASE_TYPE: BaseType = BaseType::$tag;
        })*
    };
}

impl_sim_value! {
    bool => Bool,
    i8 => Char,
    u8 => U8,
    char => WChar,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    /// Value bytes live at the descriptor address.
    Direct,
    /// A managed `String` lives at the descriptor address.
    Text,
    /// A managed `U32String` lives at the descriptor address.
    WText,
    /// A pointer cell lives at the descriptor address; the payload is
    /// `count` elements behind it.
    Indirect { count: usize },
}

struct Entry {
    desc: RefDescriptor,
    kind: EntryKind,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Storage footprint of every entry, keyed by base address.
    regions: BTreeMap<VarAddress, usize>,
}

/// In-process name-to-memory directory.
///
/// Read-mostly: resolution and staging take the read lock, declaration and
/// removal the write lock.
#[derive(Default)]
pub struct VarRegistry {
    inner: RwLock<Inner>,
}

impl VarRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared registry wrapped in `Arc`.
    pub fn shared() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::new())
    }

    /// Declare a scalar variable.
    ///
    /// # Safety
    /// `value` must stay valid, at a fixed address, until the entry is
    /// removed or the registry is dropped.
    pub unsafe fn declare_scalar<T: SimValue>(&self, name: &str, value: *const T) {
        self.insert(
            name,
            value as VarAddress,
            T::BASE_TYPE,
            std::mem::size_of::<T>(),
            Vec::new(),
            EntryKind::Direct,
            std::mem::size_of::<T>(),
        );
    }

    /// Declare a fixed-extent array variable.
    ///
    /// # Safety
    /// `base` must designate `len` contiguous elements that stay valid until
    /// the entry is removed or the registry is dropped.
    pub unsafe fn declare_array<T: SimValue>(&self, name: &str, base: *const T, len: usize) {
        self.insert(
            name,
            base as VarAddress,
            T::BASE_TYPE,
            std::mem::size_of::<T>(),
            vec![len],
            EntryKind::Direct,
            std::mem::size_of::<T>() * len,
        );
    }

    /// Declare an enumeration variable backed by a 4-byte discriminant.
    ///
    /// # Safety
    /// Same contract as [`declare_scalar`](Self::declare_scalar).
    pub unsafe fn declare_enum(&self, name: &str, value: *const i32) {
        self.insert(
            name,
            value as VarAddress,
            BaseType::Enum,
            std::mem::size_of::<i32>(),
            Vec::new(),
            EntryKind::Direct,
            std::mem::size_of::<i32>(),
        );
    }

    /// Declare a managed narrow text variable.
    ///
    /// The staged bytes track the live string contents each cycle.
    ///
    /// # Safety
    /// `value` must stay valid, at a fixed address, until the entry is
    /// removed or the registry is dropped.
    pub unsafe fn declare_text(&self, name: &str, value: *const String) {
        self.insert(
            name,
            value as VarAddress,
            BaseType::Text,
            1,
            Vec::new(),
            EntryKind::Text,
            std::mem::size_of::<String>(),
        );
    }

    /// Declare a managed wide text variable.
    ///
    /// # Safety
    /// Same contract as [`declare_text`](Self::declare_text).
    pub unsafe fn declare_wtext(&self, name: &str, value: *const U32String) {
        self.insert(
            name,
            value as VarAddress,
            BaseType::WText,
            std::mem::size_of::<u32>(),
            Vec::new(),
            EntryKind::WText,
            std::mem::size_of::<U32String>(),
        );
    }

    /// Declare a dynamically sized array reached through a pointer cell.
    ///
    /// The cell is re-read at every staging cycle, so the payload may be
    /// reallocated between cycles; `count` elements are marshaled.
    ///
    /// # Safety
    /// `cell` must stay valid until the entry is removed or the registry is
    /// dropped, and whenever it is non-null it must point at `count`
    /// readable elements.
    pub unsafe fn declare_indirect<T: SimValue>(
        &self,
        name: &str,
        cell: *const *const T,
        count: usize,
    ) {
        self.insert(
            name,
            cell as VarAddress,
            T::BASE_TYPE,
            std::mem::size_of::<T>(),
            vec![0],
            EntryKind::Indirect { count },
            std::mem::size_of::<usize>(),
        );
    }

    /// Declare a NUL-terminated narrow string reached through a pointer
    /// cell (C-string style).
    ///
    /// # Safety
    /// `cell` must stay valid until the entry is removed or the registry is
    /// dropped, and whenever it is non-null it must point at a readable
    /// NUL-terminated byte run.
    pub unsafe fn declare_indirect_text(&self, name: &str, cell: *const *const u8) {
        self.insert(
            name,
            cell as VarAddress,
            BaseType::Char,
            1,
            vec![0],
            EntryKind::Indirect { count: 0 },
            std::mem::size_of::<usize>(),
        );
    }

    /// Attach a base unit to an already-declared variable. Returns `false`
    /// when the name is unknown.
    pub fn set_unit(&self, name: &str, unit: &str) -> bool {
        let mut g = self.inner.write();
        match g.entries.get_mut(name) {
            Some(entry) => {
                entry.desc.unit = Some(unit.to_string());
                true
            }
            None => false,
        }
    }

    /// Forget a variable and its storage region. Stale references to it
    /// fail revalidation from then on. Returns `false` when the name is
    /// unknown.
    pub fn remove(&self, name: &str) -> bool {
        let mut g = self.inner.write();
        match g.entries.remove(name) {
            Some(entry) => {
                g.regions.remove(&entry.desc.addr);
                true
            }
            None => false,
        }
    }

    /// Number of declared variables.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// True when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    #[allow(clippy::too_many_arguments)]
    fn insert(
        &self,
        name: &str,
        addr: VarAddress,
        base_type: BaseType,
        elem_size: usize,
        dims: Vec<usize>,
        kind: EntryKind,
        footprint: usize,
    ) {
        let desc = RefDescriptor {
            name: name.to_string(),
            addr,
            base_type,
            elem_size,
            dims,
            indexed_dims: 0,
            pointer_present: matches!(kind, EntryKind::Indirect { .. }),
            unit: None,
        };
        let mut g = self.inner.write();
        if let Some(old) = g.entries.insert(name.to_string(), Entry { desc, kind }) {
            g.regions.remove(&old.desc.addr);
        }
        g.regions.insert(addr, footprint);
        log::debug!("[vars] declared '{}' at {:#x}", name, addr);
    }
}

/// Split `wave[3]` into `("wave", 3)`. Plain names pass through unchanged.
fn split_index(name: &str) -> Option<(&str, usize)> {
    let stripped = name.strip_suffix(']')?;
    let open = stripped.rfind('[')?;
    let idx: usize = stripped[open + 1..].parse().ok()?;
    Some((&stripped[..open], idx))
}

impl MemoryDirectory for VarRegistry {
    fn resolve(&self, name: &str) -> Option<RefDescriptor> {
        let g = self.inner.read();
        if let Some(entry) = g.entries.get(name) {
            return Some(entry.desc.clone());
        }
        // Single-element addressing into a fixed array: "wave[3]".
        let (base, idx) = split_index(name)?;
        let entry = g.entries.get(base)?;
        if entry.kind != EntryKind::Direct || entry.desc.dims.len() != 1 {
            return None;
        }
        let extent = entry.desc.dims[0];
        if idx >= extent {
            return None;
        }
        let mut desc = entry.desc.clone();
        desc.name = name.to_string();
        desc.addr += idx * desc.elem_size;
        desc.indexed_dims = 1;
        Some(desc)
    }

    fn is_known_region(&self, addr: VarAddress) -> bool {
        let g = self.inner.read();
        match g.regions.range(..=addr).next_back() {
            Some((base, len)) => addr < base + len,
            None => false,
        }
    }

    fn live_element_count(&self, desc: &RefDescriptor) -> usize {
        let g = self.inner.read();
        match g.entries.get(&desc.name).map(|e| e.kind) {
            Some(EntryKind::Indirect { count }) => count,
            _ => 1,
        }
    }

    fn text_handle(&self, addr: VarAddress) -> Option<TextHandle> {
        if addr == NULL_ADDR {
            return None;
        }
        let g = self.inner.read();
        let entry = g.entries.values().find(|e| e.desc.addr == addr)?;
        match entry.kind {
            EntryKind::Text => {
                // SAFETY: declare_text registered addr as a live *const String
                // and the entry is still present, so the declare contract holds.
                let s = unsafe { &*(addr as *const String) };
                Some(TextHandle {
                    addr: s.as_ptr() as VarAddress,
                    len_bytes: s.len(),
                })
            }
            EntryKind::WText => {
                // SAFETY: declare_wtext registered addr as a live *const U32String
                // and the entry is still present, so the declare contract holds.
                let s = unsafe { &*(addr as *const U32String) };
                Some(TextHandle {
                    addr: s.as_ptr() as VarAddress,
                    len_bytes: s.len() * std::mem::size_of::<u32>(),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_resolve_scalar() {
        let reg = VarRegistry::new();
        let value: i32 = 42;
        unsafe { reg.declare_scalar("ball.count", &value) };

        let desc = reg.resolve("ball.count").expect("declared");
        assert_eq!(desc.base_type, BaseType::I32);
        assert_eq!(desc.elem_size, 4);
        assert_eq!(desc.addr, &value as *const i32 as VarAddress);
        assert!(desc.dims.is_empty());
        assert!(!desc.pointer_present);
    }

    #[test]
    fn test_resolve_unknown_name() {
        let reg = VarRegistry::new();
        assert!(reg.resolve("no.such.var").is_none());
    }

    #[test]
    fn test_region_tracking_follows_remove() {
        let reg = VarRegistry::new();
        let value: f64 = 1.5;
        let addr = &value as *const f64 as VarAddress;
        unsafe { reg.declare_scalar("ball.mass", &value) };

        assert!(reg.is_known_region(addr));
        assert!(reg.is_known_region(addr + 7));
        assert!(!reg.is_known_region(addr + 8));

        assert!(reg.remove("ball.mass"));
        assert!(!reg.is_known_region(addr));
        assert!(!reg.remove("ball.mass"));
    }

    #[test]
    fn test_indexed_resolution_into_fixed_array() {
        let reg = VarRegistry::new();
        let wave: [i32; 5] = [1, 2, 3, 4, 5];
        unsafe { reg.declare_array("wave", wave.as_ptr(), wave.len()) };

        let desc = reg.resolve("wave[2]").expect("in range");
        assert_eq!(desc.indexed_dims, 1);
        assert_eq!(desc.addr, wave.as_ptr() as VarAddress + 8);

        assert!(reg.resolve("wave[5]").is_none());
        assert!(reg.resolve("wave[x]").is_none());
    }

    #[test]
    fn test_text_handle_tracks_live_string() {
        let reg = VarRegistry::new();
        let mut text = String::from("hello");
        unsafe { reg.declare_text("msg", &text) };
        let addr = &text as *const String as VarAddress;

        let h = reg.text_handle(addr).expect("text entry");
        assert_eq!(h.len_bytes, 5);

        text.push_str(" world");
        let h = reg.text_handle(addr).expect("text entry");
        assert_eq!(h.len_bytes, 11);
    }

    #[test]
    fn test_set_unit_rewrites_descriptor() {
        let reg = VarRegistry::new();
        let value: f64 = 5000.0;
        unsafe { reg.declare_scalar("obj.length", &value) };
        assert!(reg.set_unit("obj.length", "m"));
        assert_eq!(
            reg.resolve("obj.length").and_then(|d| d.unit),
            Some("m".to_string())
        );
        assert!(!reg.set_unit("obj.width", "m"));
    }

    #[test]
    fn test_live_element_count_for_indirect() {
        let reg = VarRegistry::new();
        let payload: [f64; 3] = [1.0, 2.0, 3.0];
        let cell: *const f64 = payload.as_ptr();
        unsafe { reg.declare_indirect("dyn.wave", &cell, 3) };

        let desc = reg.resolve("dyn.wave").expect("declared");
        assert!(desc.pointer_present);
        assert_eq!(desc.dims, vec![0]);
        assert_eq!(reg.live_element_count(&desc), 3);
    }
}
