// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket construction for the JUDP transport.
//!
//! One socket serves both roles: it receives multicast broadcasts on the
//! JAUS group and sends unicast/multicast datagrams. Loopback stays enabled
//! so components on the same host hear each other's broadcasts.

use crate::config::{MULTICAST_ADDR, MULTICAST_TTL};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

/// Bind a reusable UDP socket on `addr`, configured non-blocking for the
/// async runtime.
pub fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    log::debug!("[judp] socket bound addr={}", addr);
    Ok(socket.into())
}

/// Bind on `0.0.0.0:port` and join the JAUS multicast group.
pub fn bind_multicast(port: u16) -> io::Result<UdpSocket> {
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    let socket = bind_socket(addr)?;
    join_multicast_group(&socket)?;
    Ok(socket)
}

/// Join the JAUS group on the default interface, with loopback on and a TTL
/// that survives site-local routing.
pub fn join_multicast_group(socket: &UdpSocket) -> io::Result<()> {
    match socket.join_multicast_v4(&MULTICAST_ADDR, &Ipv4Addr::UNSPECIFIED) {
        Ok(()) => {
            log::debug!("[judp] joined multicast group {}", MULTICAST_ADDR);
        }
        Err(err) => {
            log::debug!(
                "[judp] join_multicast_group failed group={} err={}",
                MULTICAST_ADDR,
                err
            );
            return Err(err);
        }
    }
    socket.set_multicast_loop_v4(true)?;
    socket.set_multicast_ttl_v4(MULTICAST_TTL)?;
    Ok(())
}
