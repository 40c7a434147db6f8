// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! # simtap - Live variable telemetry and tuning tap for simulations
//!
//! An embeddable service that lets external clients watch and steer the
//! variables of a running simulation over TCP: type-erased references
//! snapshot live memory on the simulation's schedule, sessions serialize
//! those snapshots in ASCII or binary, and a listen service accepts and
//! tracks client connections without ever stalling the simulation loop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use simtap::{ListenConfig, ListenService, SessionRegistry, VarRegistry, VariableReference};
//! use std::sync::Arc;
//!
//! fn main() -> simtap::Result<()> {
//!     // Expose a simulation variable by name.
//!     static SPEED: f64 = 3.5;
//!     let vars = VarRegistry::shared();
//!     unsafe { vars.declare_scalar("ball.speed", &SPEED) };
//!
//!     // Accept clients; the factory runs one session per connection.
//!     let service = ListenService::new(
//!         ListenConfig::new().with_port(9100).with_tag("dyn_sim"),
//!         Arc::new(|_stream: std::net::TcpStream, _peer: std::net::SocketAddr| {
//!             // parse commands, cycle references, write frames
//!         }),
//!         SessionRegistry::shared(),
//!         None,
//!     );
//!     service.start()?;
//!
//!     // Cycle a subscribed reference by hand.
//!     let speed = VariableReference::new("ball.speed", vars);
//!     speed.stage();
//!     speed.prepare_for_write()?;
//!     let mut line = String::new();
//!     speed.write_value_ascii(&mut line)?;
//!     assert_eq!(line, "3.5");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Embedding Simulation                        |
//! |     VarRegistry (declare_*) | scheduler calls stage() per cycle    |
//! +--------------------------------------------------------------------+
//! |                          Variable Layer                            |
//! |  VariableReference: resolve -> stage -> swap -> ASCII / binary     |
//! |  UnitTable: linear conversions applied at render time              |
//! +--------------------------------------------------------------------+
//! |                          Session Layer                             |
//! |  SessionRegistry + CancelToken | Session::spawn per connection     |
//! +--------------------------------------------------------------------+
//! |                           Listen Layer                             |
//! |  ClientListener (2 s poll) | ListenService accept loop | announce  |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`VariableReference`] | Type-erased, double-buffered handle to one variable |
//! | [`VarRegistry`] | In-process name/address directory of declared variables |
//! | [`ListenService`] | Accept-loop thread with pause gate and announcements |
//! | [`SessionRegistry`] | Live-session tracker with cooperative shutdown |
//! | [`UnitTable`] | Built-in measurement units and linear conversions |
//!
//! ## Modules Overview
//!
//! - [`var`] - Staging protocol and wire renderings (start here)
//! - [`reflect`] - Variable directory and type descriptors
//! - [`listen`] - Listen socket and accept-loop service
//! - [`session`] - Session bookkeeping and cancellation
//! - [`units`] - Unit conversion table
//! - [`announce`] - Multicast presence announcements

/// Multicast presence announcements for discovery tools.
pub mod announce;
/// Crate-wide constants (poll slices, capacities, announce endpoint).
pub mod config;
/// Error type and crate-wide `Result` alias.
pub mod error;
/// Listen socket and accept-loop service.
pub mod listen;
/// Variable directory: descriptors, addresses, the in-process registry.
pub mod reflect;
/// Session bookkeeping and cooperative shutdown.
pub mod session;
/// Measurement units and conversions.
pub mod units;
/// Variable references, staging, and wire renderings.
pub mod var;

pub use announce::{Announcer, MulticastAnnouncer};
pub use error::{Error, Result};
pub use listen::{ClientListener, ListenConfig, ListenService};
pub use reflect::registry::{SimValue, VarRegistry};
pub use reflect::{BaseType, MemoryDirectory, RefDescriptor, TextHandle, VarAddress};
pub use session::{CancelToken, Session, SessionFactory, SessionId, SessionRegistry};
pub use units::{Conversion, UnitConverter, UnitTable};
pub use var::VariableReference;

/// simtap version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
