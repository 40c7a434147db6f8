// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Crate-wide error type.
//!
//! Nothing in this crate terminates the process: per-variable failures
//! degrade the reference to its invalid state, per-connection failures stay
//! on the session that hit them, and everything else surfaces through this
//! enum.

/// Errors reported by variable marshaling, unit conversion, and the listen
/// service.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Staging protocol errors
    // ========================================================================
    /// `prepare_for_write` was called before `stage` produced a snapshot.
    NotStaged(String),
    /// A write entry point was called before `prepare_for_write` committed
    /// a staged snapshot.
    NotWriteReady(String),

    // ========================================================================
    // Unit conversion errors
    // ========================================================================
    /// No conversion exists between the two unit symbols (unknown symbol or
    /// dimension mismatch).
    UnknownUnit {
        /// Declared base unit of the variable.
        from: String,
        /// Unit the caller requested.
        to: String,
    },

    // ========================================================================
    // Listen endpoint errors
    // ========================================================================
    /// Operation requires an initialized listen socket.
    ListenerUninitialized,
    /// Hostname did not resolve to a usable IPv4 address.
    AddressLookup(String),
    /// The socket bound to a different port than the one requested.
    PortMismatch {
        /// Port the embedder asked for.
        requested: u16,
        /// Port the kernel actually bound.
        bound: u16,
    },
    /// The accept loop is already running.
    AlreadyListening,

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// I/O error with underlying cause.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotStaged(name) => {
                write!(f, "variable '{}' has no staged value to commit", name)
            }
            Error::NotWriteReady(name) => {
                write!(f, "variable '{}' has no committed value to write", name)
            }
            Error::UnknownUnit { from, to } => {
                write!(f, "no unit conversion from '{}' to '{}'", from, to)
            }
            Error::ListenerUninitialized => write!(f, "listen socket is not initialized"),
            Error::AddressLookup(host) => {
                write!(f, "hostname '{}' did not resolve to an IPv4 address", host)
            }
            Error::PortMismatch { requested, bound } => {
                write!(f, "requested port {} but bound port {}", requested, bound)
            }
            Error::AlreadyListening => write!(f, "accept loop is already running"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
