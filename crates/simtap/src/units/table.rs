// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Built-in affine unit table.
//!
//! Covers the unit families simulation models actually declare (length,
//! time, mass, angle, temperature). Embedders with exotic unit systems can
//! supply their own [`UnitConverter`] instead.

use super::{Conversion, UnitConverter};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Length,
    Time,
    Mass,
    Angle,
    Temperature,
    Dimensionless,
}

struct UnitDef {
    symbol: &'static str,
    dim: Dimension,
    /// Multiplier taking one of this unit to the family base unit.
    scale: f64,
    /// Offset to the family base unit, applied after scaling.
    offset: f64,
}

const fn unit(symbol: &'static str, dim: Dimension, scale: f64) -> UnitDef {
    UnitDef {
        symbol,
        dim,
        scale,
        offset: 0.0,
    }
}

const UNITS: &[UnitDef] = &[
    // Length (base: meter)
    unit("m", Dimension::Length, 1.0),
    unit("km", Dimension::Length, 1000.0),
    unit("cm", Dimension::Length, 0.01),
    unit("mm", Dimension::Length, 0.001),
    unit("ft", Dimension::Length, 0.3048),
    unit("in", Dimension::Length, 0.0254),
    // Time (base: second)
    unit("s", Dimension::Time, 1.0),
    unit("ms", Dimension::Time, 0.001),
    unit("us", Dimension::Time, 1.0e-6),
    unit("min", Dimension::Time, 60.0),
    unit("hr", Dimension::Time, 3600.0),
    // Mass (base: kilogram)
    unit("kg", Dimension::Mass, 1.0),
    unit("g", Dimension::Mass, 0.001),
    // Angle (base: radian)
    unit("rad", Dimension::Angle, 1.0),
    unit("deg", Dimension::Angle, std::f64::consts::PI / 180.0),
    // Temperature (base: kelvin)
    unit("K", Dimension::Temperature, 1.0),
    UnitDef {
        symbol: "degC",
        dim: Dimension::Temperature,
        scale: 1.0,
        offset: 273.15,
    },
    // Unitless markers used by model declarations
    unit("--", Dimension::Dimensionless, 1.0),
    unit("1", Dimension::Dimensionless, 1.0),
    unit("count", Dimension::Dimensionless, 1.0),
];

fn lookup(symbol: &str) -> Option<&'static UnitDef> {
    UNITS.iter().find(|u| u.symbol == symbol)
}

/// Affine conversion over the built-in unit table.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitTable;

impl UnitTable {
    pub fn new() -> Self {
        UnitTable
    }
}

impl UnitConverter for UnitTable {
    fn conversion(&self, from: &str, to: &str) -> crate::Result<Conversion> {
        if from == to {
            return Ok(Conversion::Trivial);
        }
        let unknown = || Error::UnknownUnit {
            from: from.to_string(),
            to: to.to_string(),
        };
        let a = lookup(from).ok_or_else(unknown)?;
        let b = lookup(to).ok_or_else(unknown)?;
        if a.dim != b.dim || a.dim == Dimension::Dimensionless {
            return Err(unknown());
        }
        // raw -> base: raw * a.scale + a.offset
        // base -> target: (base - b.offset) / b.scale
        Ok(Conversion::Linear {
            scale: a.scale / b.scale,
            offset: (a.offset - b.offset) / b.scale,
        })
    }
}
