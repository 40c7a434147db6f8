// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Listening front end: the TCP listen socket and the accept-loop service
//! built on top of it.

pub mod listener;
pub mod service;

pub use listener::ClientListener;
pub use service::{ListenConfig, ListenService};
