// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 simtap contributors

//! Multicast presence announcements.
//!
//! When broadcasting is enabled, the accept loop announces the service once
//! per poll slice so discovery tools on the local network can find it
//! without configuration. The payload is one tab-separated line:
//!
//! ```text
//! simtap\t<hostname>\t<port>\t<tag>\n
//! ```

use crate::config::{ANNOUNCE_MULTICAST_GROUP, ANNOUNCE_PORT};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

/// Emits one presence datagram per call.
///
/// A trait so tests can capture announcements without touching the network.
pub trait Announcer: Send + Sync {
    fn announce(&self, hostname: &str, port: u16, tag: &str);
}

/// [`Announcer`] backed by a UDP multicast socket.
pub struct MulticastAnnouncer {
    socket: UdpSocket,
}

impl MulticastAnnouncer {
    /// Open the announce socket. TTL 1 keeps datagrams on the local
    /// network; loopback stays on so same-host discovery works.
    pub fn new() -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_multicast_ttl_v4(1)?;
        socket.set_multicast_loop_v4(true)?;
        socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())?;
        Ok(MulticastAnnouncer {
            socket: socket.into(),
        })
    }
}

impl Announcer for MulticastAnnouncer {
    fn announce(&self, hostname: &str, port: u16, tag: &str) {
        let payload = format!("simtap\t{hostname}\t{port}\t{tag}\n");
        let group = SocketAddrV4::new(ANNOUNCE_MULTICAST_GROUP, ANNOUNCE_PORT);
        if let Err(e) = self.socket.send_to(payload.as_bytes(), group) {
            // Announcements are advisory; a send failure must not stall
            // the accept loop.
            log::debug!("[announce] send to {} failed: {}", group, e);
        }
    }
}
