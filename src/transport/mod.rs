// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Transports that carry payloads from the background worker to the
//! metrics server.

mod backoff;
mod core;
mod mock;
mod resolve;
mod tcp;
mod udp;

pub use self::backoff::Backoff;
pub use self::core::TransportStats;
pub use self::mock::MockBuffer;
pub use self::resolve::{AddressFamily, ResolveFuture, Resolver, SystemResolver};

pub(crate) use self::core::{SocketStats, Transport};
pub(crate) use self::mock::MockTransport;
pub(crate) use self::tcp::TcpTransport;
pub(crate) use self::udp::UdpTransport;
