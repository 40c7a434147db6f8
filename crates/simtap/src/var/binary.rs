// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Binary wire helpers.
//!
//! Value payloads are the raw staged bytes with no framing; receivers know
//! the sizes from the subscription handshake. Name frames carry a 4-byte
//! little-endian length so names survive on any peer byte order.

use std::io;

/// Largest element the byte swapper handles.
const MAX_SWAP_ELEM: usize = 16;

/// Write a staged value payload.
///
/// With `swap` set, each `elem_size` group is emitted reversed so a peer of
/// opposite byte order reads native values. Text runs and single-byte
/// elements are emitted as-is.
pub(crate) fn write_value_bytes(
    out: &mut dyn io::Write,
    bytes: &[u8],
    elem_size: usize,
    swap: bool,
) -> io::Result<()> {
    if !swap || elem_size <= 1 || elem_size > MAX_SWAP_ELEM {
        return out.write_all(bytes);
    }
    let mut tmp = [0u8; MAX_SWAP_ELEM];
    for chunk in bytes.chunks(elem_size) {
        let n = chunk.len();
        for (i, &b) in chunk.iter().enumerate() {
            tmp[n - 1 - i] = b;
        }
        out.write_all(&tmp[..n])?;
    }
    Ok(())
}

/// Write a name frame: 4-byte little-endian byte length, then the name
/// bytes, no terminator.
pub(crate) fn write_name_frame(out: &mut dyn io::Write, name: &str) -> io::Result<()> {
    let len = u32::try_from(name.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "variable name exceeds u32::MAX bytes",
        )
    })?;
    out.write_all(&len.to_le_bytes())?;
    out.write_all(name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_bytes_pass_through_unswapped() {
        let mut out = Vec::new();
        write_value_bytes(&mut out, &[0xff, 0x0f, 0x00, 0x00], 4, false).expect("vec sink");
        assert_eq!(out, vec![0xff, 0x0f, 0x00, 0x00]);
    }

    #[test]
    fn test_value_bytes_swapped_per_element() {
        let mut out = Vec::new();
        write_value_bytes(&mut out, &[0xff, 0x0f, 0x00, 0x00], 4, true).expect("vec sink");
        assert_eq!(out, vec![0x00, 0x00, 0x0f, 0xff]);

        // Each element reverses independently; the element order is kept.
        let bytes = [1u8, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0];
        let mut out = Vec::new();
        write_value_bytes(&mut out, &bytes, 4, true).expect("vec sink");
        assert_eq!(out, vec![0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3]);
    }

    #[test]
    fn test_value_bytes_single_byte_elements_never_swap() {
        let mut out = Vec::new();
        write_value_bytes(&mut out, b"abcdef", 1, true).expect("vec sink");
        assert_eq!(out, b"abcdef");
    }

    #[test]
    fn test_name_frame_layout() {
        let mut out = Vec::new();
        write_name_frame(&mut out, "test_a").expect("vec sink");
        assert_eq!(
            out,
            vec![0x06, 0x00, 0x00, 0x00, b't', b'e', b's', b't', b'_', b'a'],
        );
    }
}
