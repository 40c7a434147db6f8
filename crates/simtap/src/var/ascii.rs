// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! ASCII value rendering.
//!
//! One staged element becomes one text token: integers in decimal, floats
//! with a fixed number of significant digits, text escaped byte by byte.
//! The rules here are wire format; changing them breaks recorded telemetry.

use crate::config::{DOUBLE_ASCII_DIGITS, FLOAT_ASCII_DIGITS};
use crate::reflect::BaseType;
use crate::units::Conversion;
use std::fmt::Write;

/// Read one native-endian value out of a staged byte run. Short slices read
/// as zero-padded; sizing upstream guarantees full elements.
macro_rules! read_ne {
    ($ty:ty, $bytes:expr) => {{
        let mut buf = [0u8; std::mem::size_of::<$ty>()];
        let n = $bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&$bytes[..n]);
        <$ty>::from_ne_bytes(buf)
    }};
}

/// Append the escaped form of raw text bytes.
///
/// Printable ASCII passes through, the classic control characters use their
/// backslash escapes, everything else becomes `\xHH`. A carriage return
/// renders as the newline escape; CR-bearing payloads normalize lossily.
pub(crate) fn push_escaped(out: &mut String, bytes: &[u8]) {
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            0x08 => out.push_str("\\b"),
            0x07 => out.push_str("\\a"),
            0x0c => out.push_str("\\f"),
            b'\r' => out.push_str("\\n"),
            0x0b => out.push_str("\\v"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", b);
            }
        }
    }
}

/// Convert wide code units to a narrow string. Unpaired or out-of-range
/// units degrade to the replacement character.
pub(crate) fn narrow_from_wide(units: &[u32]) -> String {
    units
        .iter()
        .map(|&u| char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Render a float with up to `digits` significant digits, printf `%g`
/// style: fixed or scientific notation by magnitude, trailing zeros
/// stripped, exponent always signed with at least two digits.
pub(crate) fn format_sig(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value.is_sign_negative() {
            "-inf".to_string()
        } else {
            "inf".to_string()
        };
    }
    if value == 0.0 {
        return if value.is_sign_negative() {
            "-0".to_string()
        } else {
            "0".to_string()
        };
    }
    let digits = digits.max(1);
    let sci = format!("{:.*e}", digits - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= digits as i32 {
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            if exp < 0 { '-' } else { '+' },
            exp.abs()
        )
    } else {
        let decimals = (digits as i32 - 1 - exp).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, value))
    }
}

fn strip_trailing_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

fn push_glyph(out: &mut String, b: u8) {
    if (0x20..=0x7e).contains(&b) {
        out.push(b as char);
    } else {
        let _ = write!(out, "\\x{:02x}", b);
    }
}

fn push_signed(out: &mut String, raw: i64, conv: &Conversion) {
    if conv.is_trivial() {
        let _ = write!(out, "{}", raw);
    } else {
        let _ = write!(out, "{}", conv.apply(raw as f64) as i64);
    }
}

fn push_unsigned(out: &mut String, raw: u64, conv: &Conversion) {
    if conv.is_trivial() {
        let _ = write!(out, "{}", raw);
    } else {
        let _ = write!(out, "{}", conv.apply(raw as f64) as u64);
    }
}

/// Render one scalar element from its staged bytes.
///
/// Unit conversions apply to the numeric types only; `Bool`, `Char`, and
/// `WChar` render their raw value. Text runs are handled by the caller.
pub(crate) fn push_scalar(out: &mut String, ty: BaseType, bytes: &[u8], conv: &Conversion) {
    match ty {
        BaseType::Bool => out.push(if bytes.first().copied().unwrap_or(0) != 0 {
            '1'
        } else {
            '0'
        }),
        BaseType::Char => push_glyph(out, bytes.first().copied().unwrap_or(0)),
        BaseType::U8 => push_unsigned(out, u64::from(bytes.first().copied().unwrap_or(0)), conv),
        BaseType::WChar => {
            let _ = write!(out, "{}", read_ne!(u32, bytes));
        }
        BaseType::I16 => push_signed(out, i64::from(read_ne!(i16, bytes)), conv),
        BaseType::U16 => push_unsigned(out, u64::from(read_ne!(u16, bytes)), conv),
        BaseType::I32 | BaseType::Enum => push_signed(out, i64::from(read_ne!(i32, bytes)), conv),
        BaseType::U32 => push_unsigned(out, u64::from(read_ne!(u32, bytes)), conv),
        BaseType::I64 => push_signed(out, read_ne!(i64, bytes), conv),
        BaseType::U64 => push_unsigned(out, read_ne!(u64, bytes), conv),
        BaseType::F32 => out.push_str(&format_sig(
            conv.apply(f64::from(read_ne!(f32, bytes))),
            FLOAT_ASCII_DIGITS,
        )),
        BaseType::F64 => out.push_str(&format_sig(
            conv.apply(read_ne!(f64, bytes)),
            DOUBLE_ASCII_DIGITS,
        )),
        BaseType::Text | BaseType::WText | BaseType::Invalid => {}
    }
}
