// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::core::Transport;
use super::resolve::{AddressFamily, Resolver};
use crate::batch::Framing;
use log::debug;
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Fire and forget transport writing one datagram per payload.
///
/// The socket is bound on first use. The destination is resolved before
/// every datagram so that DNS changes are picked up, unless `cache_dns` is
/// set in which case the first resolved address is reused until a send
/// fails.
pub(crate) struct UdpTransport {
    host: String,
    port: u16,
    family: AddressFamily,
    resolver: Arc<dyn Resolver>,
    cache_dns: bool,
    cached: Option<SocketAddr>,
    socket: Option<UdpSocket>,
    closed: bool,
}

impl UdpTransport {
    pub(crate) fn new(
        host: &str,
        port: u16,
        family: AddressFamily,
        resolver: Arc<dyn Resolver>,
        cache_dns: bool,
    ) -> Self {
        UdpTransport {
            host: host.to_owned(),
            port,
            family,
            resolver,
            cache_dns,
            cached: None,
            socket: None,
            closed: false,
        }
    }

    fn bind_addr(&self) -> SocketAddr {
        match self.family {
            AddressFamily::Ipv6 => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
            AddressFamily::Ipv4 | AddressFamily::Any => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        }
    }

    async fn destination(&mut self) -> io::Result<SocketAddr> {
        if let Some(addr) = self.cached {
            return Ok(addr);
        }

        let addr = self.resolver.resolve(&self.host, self.port, self.family).await?;
        if self.cache_dns {
            debug!("caching address {} for {}", addr, self.host);
            self.cached = Some(addr);
        }

        Ok(addr)
    }
}

impl Transport for UdpTransport {
    async fn send(&mut self, payload: &str) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "UDP transport is closed"));
        }

        let addr = self.destination().await?;
        if self.socket.is_none() {
            let socket = UdpSocket::bind(self.bind_addr()).await?;
            self.socket = Some(socket);
        }

        let res = match self.socket {
            Some(ref socket) => socket.send_to(payload.as_bytes(), addr).await,
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "UDP socket unavailable")),
        };

        if res.is_err() {
            self.cached = None;
        }

        res
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.socket = None;
        Ok(())
    }

    fn framing(&self) -> Framing {
        Framing::Datagram
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("family", &self.family)
            .field("cache_dns", &self.cache_dns)
            .field("cached", &self.cached)
            .finish()
    }
}
