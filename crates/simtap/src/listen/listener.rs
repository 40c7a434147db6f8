// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! TCP listen socket with bounded readiness polling.
//!
//! The listener is deliberately dumb: it binds, reports readiness in 2 s
//! slices, and hands accepted connections to the caller. Loop control and
//! session bookkeeping live in [`crate::listen::service::ListenService`].

use crate::config::{DEFAULT_LISTEN_HOST, LISTEN_POLL_TIMEOUT_MS};
use crate::error::Error;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::unix::io::AsRawFd;

// ============================================================================
// Listener
// ============================================================================

/// IPv4 TCP listen socket.
///
/// Starts uninitialized: `hostname()` is empty and `port()` is -1 until
/// [`initialize`](Self::initialize) succeeds.
#[derive(Debug)]
pub struct ClientListener {
    socket: Option<Socket>,
    hostname: String,
    port: i32,
}

impl Default for ClientListener {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientListener {
    pub fn new() -> Self {
        ClientListener {
            socket: None,
            hostname: String::new(),
            port: -1,
        }
    }

    /// Bind and start listening.
    ///
    /// An empty `host` selects the default loopback host. `port` 0 requests
    /// an ephemeral port; the bound port is readable via [`port`](Self::port)
    /// afterwards. A listener that was already bound is torn down first.
    /// On failure the listener is left uninitialized.
    pub fn initialize(&mut self, host: &str, port: u16) -> crate::Result<()> {
        self.disconnect();

        let host = if host.is_empty() {
            DEFAULT_LISTEN_HOST
        } else {
            host
        };
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|_| Error::AddressLookup(host.to_string()))?
            .find(|a| a.is_ipv4())
            .ok_or_else(|| Error::AddressLookup(host.to_string()))?;

        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nodelay(true)?;
        socket.bind(&addr.into())?;
        socket.listen(libc::SOMAXCONN)?;

        let bound = socket
            .local_addr()?
            .as_socket()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "non-inet local address"))?;
        if port != 0 && bound.port() != port {
            return Err(Error::PortMismatch {
                requested: port,
                bound: bound.port(),
            });
        }

        log::debug!("[listen] bound {}:{}", bound.ip(), bound.port());
        self.hostname = bound.ip().to_string();
        self.port = i32::from(bound.port());
        self.socket = Some(socket);
        Ok(())
    }

    /// Poll the listen socket for a pending connection.
    ///
    /// Blocks for at most the configured poll slice (2 s). Returns true only
    /// when an accept would not block; timeouts, poll errors and an
    /// uninitialized listener all report false.
    pub fn check_for_new_connections(&self) -> bool {
        let Some(socket) = &self.socket else {
            return false;
        };
        let mut pfd = libc::pollfd {
            fd: socket.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: pfd points at one initialized pollfd for the call duration.
        let rc = unsafe { libc::poll(&mut pfd, 1, LISTEN_POLL_TIMEOUT_MS) };
        rc > 0 && (pfd.revents & libc::POLLIN) != 0
    }

    /// Accept one pending connection. Blocks until a peer arrives, so pair
    /// with [`check_for_new_connections`](Self::check_for_new_connections).
    pub fn accept(&self) -> crate::Result<(TcpStream, SocketAddr)> {
        let socket = self.socket.as_ref().ok_or(Error::ListenerUninitialized)?;
        let (conn, peer) = socket.accept()?;
        conn.set_nodelay(true)?;
        let peer = peer
            .as_socket()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "non-inet peer address"))?;
        Ok((conn.into(), peer))
    }

    /// Resolved listen address, empty until initialized.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Bound port, -1 until initialized.
    pub fn port(&self) -> i32 {
        self.port
    }

    pub fn is_initialized(&self) -> bool {
        self.socket.is_some()
    }

    /// Close the listen socket and return to the uninitialized state.
    pub fn disconnect(&mut self) {
        if self.socket.take().is_some() {
            log::debug!("[listen] closed {}:{}", self.hostname, self.port);
        }
        self.hostname.clear();
        self.port = -1;
    }
}
