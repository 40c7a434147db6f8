// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Type-erased reference to one subscribed variable.
//!
//! A `VariableReference` resolves a name once, then cycles through three
//! steps for the life of the subscription:
//!
//! ```text
//!   scheduler thread                      session thread
//!   ----------------                      --------------
//!   stage()                               prepare_for_write()
//!     copy live bytes ---> [stage_buf]      swap buffers (O(1))
//!                          [write_buf] <--- write_value_ascii()
//!                                           write_value_binary()
//! ```
//!
//! The swap in `prepare_for_write` is the only hand-off between the two
//! sides: buffer ownership is exchanged, never copied. All mutable state
//! sits behind one mutex, so no partial swap is ever observable.
//!
//! Resolution failures are not errors: the reference degrades to an invalid
//! state that marshals a fixed zero token, and every `stage` retries the
//! lookup so late-declared variables start serving real values.

use crate::config::TEXT_CAPACITY_BYTES;
use crate::error::Error;
use crate::reflect::{
    bad_ref_addr, copy_from_addr, narrow_text_len, read_ptr_cell, wide_text_len, BaseType,
    MemoryDirectory, RefDescriptor, NULL_ADDR,
};
use crate::units::{Conversion, UnitConverter};
use crate::var::{ascii, binary};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::io;
use std::sync::Arc;

struct Inner {
    desc: RefDescriptor,
    /// Type driving sizing and rendering. Differs from the descriptor's tag
    /// when a character array with a dynamic extent is served as text.
    wire_type: BaseType,
    /// Bytes currently meaningful in the buffers.
    byte_count: usize,
    /// Declared with at least one array dimension still unindexed.
    array: bool,
    /// The copy source is behind a pointer cell re-read every cycle.
    deref: bool,
    /// Re-check the region on every staging cycle.
    revalidate: bool,
    /// More than one dynamic dimension: sizing is best-effort.
    unpredictable: bool,
    conversion: Conversion,
    requested_unit: Option<String>,
    stage_buf: Vec<u8>,
    write_buf: Vec<u8>,
    staged: bool,
    write_ready: bool,
}

impl Inner {
    fn from_descriptor(desc: RefDescriptor, dir: &dyn MemoryDirectory) -> Inner {
        let mut wire_type = desc.base_type;
        let mut deref = desc.pointer_present;
        let mut unpredictable = false;
        let remaining = &desc.dims[desc.indexed_dims.min(desc.dims.len())..];
        let mut elem_count = 1usize;

        if let Some(&last) = remaining.last() {
            let dynamic = remaining.iter().filter(|&&d| d == 0).count();
            if dynamic > 1 {
                log::warn!(
                    "[vars] variable '{}' has {} dynamic dimensions; data is not contiguous and returned values are unpredictable",
                    desc.name,
                    dynamic
                );
                unpredictable = true;
            }
            if last == 0 {
                deref = true;
                match desc.base_type {
                    BaseType::Char | BaseType::U8 => wire_type = BaseType::Text,
                    BaseType::WChar => wire_type = BaseType::WText,
                    _ => elem_count = dir.live_element_count(&desc),
                }
            } else {
                elem_count = remaining.iter().product();
            }
        }

        let byte_count = match wire_type {
            BaseType::Text | BaseType::WText => TEXT_CAPACITY_BYTES,
            _ => desc.elem_size * elem_count,
        };
        Inner {
            array: !remaining.is_empty(),
            desc,
            wire_type,
            byte_count,
            deref,
            revalidate: false,
            unpredictable,
            conversion: Conversion::Trivial,
            requested_unit: None,
            stage_buf: vec![0; byte_count],
            write_buf: vec![0; byte_count],
            staged: false,
            write_ready: false,
        }
    }

    /// Degrade to the invalid state in place. The staged/committed flags
    /// and the revalidation setting survive the transition.
    fn make_invalid(&mut self, name: &str) {
        let desc = RefDescriptor::error(name);
        let token = desc.elem_size;
        self.wire_type = BaseType::Invalid;
        self.byte_count = token;
        self.array = false;
        self.deref = false;
        self.unpredictable = false;
        self.conversion = Conversion::Trivial;
        self.requested_unit = None;
        self.stage_buf.clear();
        self.stage_buf.resize(token, 0);
        self.write_buf.clear();
        self.write_buf.resize(token, 0);
        self.desc = desc;
    }
}

/// Live handle to one subscribed simulation variable.
///
/// Shared between the staging side (the scheduler) and the serializing side
/// (a client session); all methods take `&self`.
pub struct VariableReference {
    name: String,
    dir: Arc<dyn MemoryDirectory>,
    inner: Mutex<Inner>,
}

impl VariableReference {
    /// Resolve `name` against the directory.
    ///
    /// An unresolvable name is not an error: the reference starts in the
    /// invalid state and keeps retrying at each staging cycle.
    pub fn new(name: &str, dir: Arc<dyn MemoryDirectory>) -> Self {
        let inner = match dir.resolve(name) {
            Some(desc) => Inner::from_descriptor(desc, &*dir),
            None => {
                log::warn!("[vars] could not resolve variable '{}'", name);
                Inner::from_descriptor(RefDescriptor::error(name), &*dir)
            }
        };
        VariableReference {
            name: name.to_string(),
            dir,
            inner: Mutex::new(inner),
        }
    }

    /// Name the reference was created with. Survives invalid transitions.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared base unit, `--` when the variable has none.
    pub fn base_units(&self) -> String {
        let g = self.inner.lock();
        g.desc.unit.clone().unwrap_or_else(|| "--".to_string())
    }

    /// Unit override currently in effect, if any.
    pub fn requested_units(&self) -> Option<String> {
        self.inner.lock().requested_unit.clone()
    }

    /// Type tag the value is served as.
    pub fn value_type(&self) -> BaseType {
        self.inner.lock().wire_type
    }

    /// Bytes currently meaningful in the buffers.
    pub fn byte_count(&self) -> usize {
        self.inner.lock().byte_count
    }

    pub fn is_staged(&self) -> bool {
        self.inner.lock().staged
    }

    pub fn is_write_ready(&self) -> bool {
        self.inner.lock().write_ready
    }

    /// Sizing was declared with more than one dynamic dimension and is
    /// best-effort only.
    pub fn is_unpredictable_size(&self) -> bool {
        self.inner.lock().unpredictable
    }

    /// Enable or disable per-cycle address revalidation.
    ///
    /// The check covers the descriptor's own address; for pointer-backed
    /// variables that is the pointer cell, not the followed target, so a
    /// dangling non-null cell is not caught here.
    pub fn set_revalidation(&self, on: bool) {
        self.inner.lock().revalidate = on;
    }

    /// Install a unit override for rendering.
    ///
    /// Requesting the declared base unit clears the override entirely,
    /// restoring the unconverted rendering. A failed lookup leaves the
    /// previous conversion in place.
    pub fn set_requested_units(
        &self,
        unit: &str,
        converter: &dyn UnitConverter,
    ) -> crate::Result<()> {
        let mut g = self.inner.lock();
        let base = g.desc.unit.clone().unwrap_or_else(|| "--".to_string());
        if unit == base {
            g.conversion = Conversion::Trivial;
            g.requested_unit = None;
            return Ok(());
        }
        match converter.conversion(&base, unit) {
            Ok(c) => {
                g.conversion = c;
                g.requested_unit = Some(unit.to_string());
                Ok(())
            }
            Err(e) => {
                log::error!("[vars] cannot express '{}' in {}: {}", self.name, unit, e);
                Err(e)
            }
        }
    }

    /// Copy the live value into the staging buffer.
    ///
    /// Called once per outgoing cycle by the embedder's scheduler. Never
    /// blocks on I/O and never fails: every anomaly degrades the reference
    /// to the invalid state and the cycle continues.
    pub fn stage(&self) {
        let mut g = self.inner.lock();
        let inner = &mut *g;

        // A name that failed at subscription time may exist now.
        if inner.desc.addr == bad_ref_addr() {
            if let Some(desc) = self.dir.resolve(&self.name) {
                log::info!("[vars] variable '{}' resolved after subscription", self.name);
                let revalidate = inner.revalidate;
                *inner = Inner::from_descriptor(desc, &*self.dir);
                inner.revalidate = revalidate;
            }
        }

        // The variable may have been deleted since the last cycle.
        if inner.revalidate
            && !inner.wire_type.is_text()
            && inner.desc.addr != bad_ref_addr()
            && !self.dir.is_known_region(inner.desc.addr)
        {
            log::error!(
                "[vars] variable '{}' no longer falls in a known region, invalidating",
                self.name
            );
            inner.make_invalid(&self.name);
        }

        let mut src = inner.desc.addr;
        let mut n = inner.byte_count;

        // Managed text: chase the live byte run through the directory.
        if inner.wire_type.is_text() && !inner.deref {
            match self.dir.text_handle(src) {
                Some(h) => {
                    src = h.addr;
                    n = h.len_bytes;
                }
                None => {
                    src = NULL_ADDR;
                    n = 0;
                }
            }
        }

        // Pointer cell: the payload may have been reallocated.
        if inner.deref {
            // SAFETY: the descriptor address designates a live pointer cell
            // per the directory's declare contract.
            src = unsafe { read_ptr_cell(src) };
            if src == NULL_ADDR {
                n = 0;
            } else {
                match inner.wire_type {
                    BaseType::Text => {
                        // SAFETY: a non-null indirect text cell points at a
                        // NUL-terminated run; the scan is capacity-capped.
                        n = unsafe { narrow_text_len(src, inner.stage_buf.len()) };
                    }
                    BaseType::WText => {
                        let cap_units = inner.stage_buf.len() / 4;
                        // SAFETY: as above with a zero-terminated wide run.
                        n = unsafe { wide_text_len(src, cap_units) } * 4;
                    }
                    _ => {}
                }
            }
        }

        let n = n.min(inner.stage_buf.len());
        if src != NULL_ADDR && n > 0 {
            // SAFETY: src spans n readable bytes: direct descriptors cover
            // byte_count by construction, text handles report their live
            // length, and the scans above bounded the indirect runs.
            unsafe { copy_from_addr(src, &mut inner.stage_buf[..n]) };
        }
        if inner.wire_type.is_text() {
            inner.byte_count = n;
        }
        inner.staged = true;
        inner.write_ready = false;
    }

    /// Commit the staged snapshot for writing by swapping buffer ownership.
    ///
    /// O(1): no bytes move. Fails when nothing was staged since the last
    /// commit.
    pub fn prepare_for_write(&self) -> crate::Result<()> {
        let mut g = self.inner.lock();
        if !g.staged {
            return Err(Error::NotStaged(self.name.clone()));
        }
        let inner = &mut *g;
        std::mem::swap(&mut inner.stage_buf, &mut inner.write_buf);
        inner.staged = false;
        inner.write_ready = true;
        Ok(())
    }

    /// Append the committed value as an ASCII token.
    ///
    /// Scalars render per type, arrays comma-join, character arrays render
    /// as escaped text, and a unit override appends ` {unit}` once.
    pub fn write_value_ascii(&self, out: &mut String) -> crate::Result<()> {
        let g = self.inner.lock();
        if !g.write_ready {
            return Err(Error::NotWriteReady(self.name.clone()));
        }
        let bytes = &g.write_buf[..g.byte_count.min(g.write_buf.len())];
        match g.wire_type {
            BaseType::Invalid => {}
            BaseType::Text => ascii::push_escaped(out, bytes),
            BaseType::WText => {
                let units: Vec<u32> = bytes
                    .chunks_exact(4)
                    .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                ascii::push_escaped(out, ascii::narrow_from_wide(&units).as_bytes());
            }
            BaseType::Char | BaseType::U8 if g.array => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                ascii::push_escaped(out, &bytes[..end]);
            }
            BaseType::WChar if g.array => {
                let mut units = Vec::new();
                for c in bytes.chunks_exact(4) {
                    let u = u32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
                    if u == 0 {
                        break;
                    }
                    units.push(u);
                }
                out.push_str(&ascii::narrow_from_wide(&units));
            }
            ty => {
                let sz = g.desc.elem_size.max(1);
                let mut first = true;
                for chunk in bytes.chunks(sz) {
                    if !first {
                        out.push(',');
                    }
                    first = false;
                    ascii::push_scalar(out, ty, chunk, &g.conversion);
                }
            }
        }
        if let Some(u) = &g.requested_unit {
            let _ = write!(out, " {{{}}}", u);
        }
        Ok(())
    }

    /// Write the committed value as raw bytes, unframed.
    ///
    /// With `swap` set, each multi-byte numeric element's bytes are
    /// reversed for peers of opposite byte order. Text is never swapped.
    pub fn write_value_binary(&self, out: &mut dyn io::Write, swap: bool) -> crate::Result<()> {
        let g = self.inner.lock();
        if !g.write_ready {
            return Err(Error::NotWriteReady(self.name.clone()));
        }
        let bytes = &g.write_buf[..g.byte_count.min(g.write_buf.len())];
        let swap = swap && !g.wire_type.is_text() && g.wire_type != BaseType::Invalid;
        binary::write_value_bytes(out, bytes, g.desc.elem_size, swap)?;
        Ok(())
    }

    /// Write the binary name frame: 4-byte little-endian length, then the
    /// name bytes.
    pub fn write_name_binary(&self, out: &mut dyn io::Write) -> crate::Result<()> {
        binary::write_name_frame(out, &self.name)?;
        Ok(())
    }

    /// Confirm the target address still falls inside a known region.
    ///
    /// Text references chase managed storage rather than a fixed span, and
    /// already-invalid references are not re-flagged, so both pass
    /// trivially.
    pub fn validate(&self) -> bool {
        let g = self.inner.lock();
        if g.desc.addr == bad_ref_addr() || g.wire_type.is_text() {
            return true;
        }
        self.dir.is_known_region(g.desc.addr)
    }

    /// Force the reference into the invalid state. Used when the embedder
    /// deletes a variable out from under live subscriptions.
    pub fn tag_as_invalid(&self) {
        self.inner.lock().make_invalid(&self.name);
    }
}
