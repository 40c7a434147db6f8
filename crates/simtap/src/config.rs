// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Global configuration constants - single source of truth.
//!
//! Every tunable shared by more than one module lives here. **Never hardcode
//! these values elsewhere!**

use std::net::Ipv4Addr;

// =======================================================================
// Listen endpoint
// =======================================================================

/// Host used when the embedder does not request a bind address.
///
/// Resolved through the normal address lookup, so the reported hostname
/// becomes the resolved IP (`127.0.0.1`), not the literal string.
pub const DEFAULT_LISTEN_HOST: &str = "localhost";

/// Readiness-poll timeout for the listen socket, in milliseconds.
///
/// The accept loop blocks at most this long per cycle, which also bounds
/// how quickly a cancellation request is observed.
pub const LISTEN_POLL_TIMEOUT_MS: i32 = 2_000;

// =======================================================================
// Endpoint announcement (UDP multicast)
// =======================================================================

/// Multicast group the announcer publishes the bound endpoint to.
///
/// Administratively scoped (RFC 2365); stays on the local network.
pub const ANNOUNCE_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 42, 5);

/// UDP port for endpoint announcements.
pub const ANNOUNCE_PORT: u16 = 9465;

// =======================================================================
// Variable marshaling
// =======================================================================

/// Staging capacity for text and wide-text values, in bytes.
///
/// Live strings longer than this are truncated at staging time; the copy
/// never runs past the staging buffers.
pub const TEXT_CAPACITY_BYTES: usize = 4096;

/// Byte count staged for a reference in the invalid state.
///
/// Invalid references marshal a fixed zero token of this size so that a
/// subscription cycle never stalls on a bad name.
pub const ERROR_TOKEN_BYTES: usize = std::mem::size_of::<i32>();

/// Significant digits used when rendering `f32` values in ASCII.
pub const FLOAT_ASCII_DIGITS: usize = 8;

/// Significant digits used when rendering `f64` values in ASCII.
pub const DOUBLE_ASCII_DIGITS: usize = 16;
