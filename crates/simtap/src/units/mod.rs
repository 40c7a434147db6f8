// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Unit conversion applied to numeric values at serialization time.
//!
//! Conversions are resolved once when a client requests a unit override and
//! then applied per value; the staging path never touches them.

pub mod table;

pub use table::UnitTable;

/// Numeric conversion installed on a variable reference.
///
/// Real unit conversions are affine, so a scale and offset cover the whole
/// table; `Trivial` is the no-override fast path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    /// Identity: the raw value passes through untouched.
    Trivial,
    /// `converted = raw * scale + offset`.
    Linear {
        scale: f64,
        offset: f64,
    },
}

impl Conversion {
    /// Apply the conversion to a raw value.
    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        match self {
            Conversion::Trivial => raw,
            Conversion::Linear { scale, offset } => raw * scale + offset,
        }
    }

    /// True for the identity conversion.
    #[inline]
    pub fn is_trivial(&self) -> bool {
        matches!(self, Conversion::Trivial)
    }
}

/// Resolves a conversion between two unit symbols.
pub trait UnitConverter: Send + Sync {
    /// Conversion taking values in `from` to values in `to`.
    ///
    /// Fails when either symbol is unknown or the dimensions differ; the
    /// caller keeps its previous conversion in that case.
    fn conversion(&self, from: &str, to: &str) -> crate::Result<Conversion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivial_passthrough() {
        assert_eq!(Conversion::Trivial.apply(867.309), 867.309);
        assert!(Conversion::Trivial.is_trivial());
    }

    #[test]
    fn test_linear_scale_and_offset() {
        let c = Conversion::Linear {
            scale: 0.001,
            offset: 0.0,
        };
        assert_eq!(c.apply(5000.0), 5.0);
        assert!(!c.is_trivial());

        let c = Conversion::Linear {
            scale: 1.0,
            offset: 273.15,
        };
        assert_eq!(c.apply(20.0), 293.15);
    }
}
