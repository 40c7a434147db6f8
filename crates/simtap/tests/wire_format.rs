// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Binary wire format tests
//!
//! Value frames are raw unframed bytes; name frames carry a 4-byte
//! little-endian length. Byte swapping reverses each numeric element
//! independently and never touches text.

use simtap::{VarRegistry, VariableReference};
use std::sync::Arc;

fn subscribe(reg: &Arc<VarRegistry>, name: &str) -> VariableReference {
    VariableReference::new(name, Arc::clone(reg) as Arc<dyn simtap::MemoryDirectory>)
}

/// Run one cycle and return the binary value frame.
fn frame(r: &VariableReference, swap: bool) -> Vec<u8> {
    r.stage();
    r.prepare_for_write().expect("staged");
    let mut out = Vec::new();
    r.write_value_binary(&mut out, swap).expect("committed");
    out
}

#[test]
fn test_int_value_frame_is_native_bytes() {
    let reg = VarRegistry::shared();
    let value: i32 = 4095;
    unsafe { reg.declare_scalar("v", &value) };
    let r = subscribe(&reg, "v");

    assert_eq!(frame(&r, false), value.to_ne_bytes());
    #[cfg(target_endian = "little")]
    assert_eq!(frame(&r, false), [0xff, 0x0f, 0x00, 0x00]);
}

#[test]
fn test_int_value_frame_swapped() {
    let reg = VarRegistry::shared();
    let value: i32 = 4095;
    unsafe { reg.declare_scalar("v", &value) };
    let r = subscribe(&reg, "v");

    let mut reversed = value.to_ne_bytes();
    reversed.reverse();
    assert_eq!(frame(&r, true), reversed);
    #[cfg(target_endian = "little")]
    assert_eq!(frame(&r, true), [0x00, 0x00, 0x0f, 0xff]);
}

#[test]
fn test_float_value_frame() {
    let reg = VarRegistry::shared();
    let value: f32 = 40.95;
    unsafe { reg.declare_scalar("v", &value) };
    let r = subscribe(&reg, "v");

    assert_eq!(frame(&r, false), value.to_ne_bytes());
    #[cfg(target_endian = "little")]
    assert_eq!(frame(&r, false), [0xcd, 0xcc, 0x23, 0x42]);
}

#[test]
fn test_array_frame_concatenates_elements() {
    let reg = VarRegistry::shared();
    let wave: [i32; 3] = [1, 2, 3];
    unsafe { reg.declare_array("wave", wave.as_ptr(), wave.len()) };
    let r = subscribe(&reg, "wave");

    let bytes = frame(&r, false);
    assert_eq!(bytes.len(), 12);
    let mut expected = Vec::new();
    for v in wave {
        expected.extend_from_slice(&v.to_ne_bytes());
    }
    assert_eq!(bytes, expected);
    assert_eq!(r.byte_count(), 12);
}

#[test]
fn test_array_swap_reverses_each_element_not_the_buffer() {
    let reg = VarRegistry::shared();
    let wave: [i32; 3] = [1, 2, 3];
    unsafe { reg.declare_array("wave", wave.as_ptr(), wave.len()) };
    let r = subscribe(&reg, "wave");

    let mut expected = Vec::new();
    for v in wave {
        let mut elem = v.to_ne_bytes();
        elem.reverse();
        expected.extend_from_slice(&elem);
    }
    assert_eq!(frame(&r, true), expected);
}

#[test]
fn test_double_swap_reverses_eight_bytes() {
    let reg = VarRegistry::shared();
    let value: f64 = 867.309;
    unsafe { reg.declare_scalar("v", &value) };
    let r = subscribe(&reg, "v");

    let mut reversed = value.to_ne_bytes();
    reversed.reverse();
    assert_eq!(frame(&r, true), reversed);
}

#[test]
fn test_text_frame_is_never_swapped() {
    let reg = VarRegistry::shared();
    let text = String::from("abcdef");
    unsafe { reg.declare_text("text", &text) };
    let r = subscribe(&reg, "text");

    assert_eq!(frame(&r, false), b"abcdef");
    assert_eq!(frame(&r, true), b"abcdef");
}

#[test]
fn test_name_frame_little_endian_length_plus_bytes() {
    let reg = VarRegistry::shared();
    let value: i32 = 5;
    unsafe { reg.declare_scalar("test_a", &value) };
    let r = subscribe(&reg, "test_a");

    let mut out = Vec::new();
    r.write_name_binary(&mut out).expect("name frame");
    assert_eq!(
        out,
        [0x06, 0x00, 0x00, 0x00, b't', b'e', b's', b't', b'_', b'a']
    );
}

#[test]
fn test_name_frame_needs_no_staging() {
    let reg = VarRegistry::shared();
    let r = subscribe(&reg, "unresolved.name");

    let mut out = Vec::new();
    r.write_name_binary(&mut out).expect("name frame");
    let len = u32::from_le_bytes([out[0], out[1], out[2], out[3]]) as usize;
    assert_eq!(len, "unresolved.name".len());
    assert_eq!(&out[4..], b"unresolved.name");
}
