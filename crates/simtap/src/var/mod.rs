// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Variable marshaling: staged snapshots and their wire renderings.
//!
//! [`reference::VariableReference`] owns the staging protocol; the `ascii`
//! and `binary` helpers hold the encoding rules it renders with.

pub(crate) mod ascii;
pub(crate) mod binary;
pub mod reference;

pub use reference::VariableReference;
