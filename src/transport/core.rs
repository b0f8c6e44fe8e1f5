// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::batch::Framing;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// Something that payloads can be written to.
///
/// A transport is owned by a single background worker and is never shared,
/// so methods take `&mut self`. Payloads have already been framed according
/// to [`Transport::framing`] when they arrive.
pub(crate) trait Transport: Send + 'static {
    /// Write one payload, returning the number of bytes written.
    ///
    /// `Ok(0)` means the payload was accepted without being written yet,
    /// for example because it was queued while reconnecting.
    fn send(&mut self, payload: &str) -> impl Future<Output = io::Result<usize>> + Send;

    /// Release any sockets. Sends after a close fail.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// How lines must be joined into payloads for this transport.
    fn framing(&self) -> Framing;

    /// When the worker should next call [`Transport::retry`], if ever.
    fn retry_at(&self) -> Option<Instant> {
        None
    }

    /// Attempt to recover a lost connection.
    ///
    /// The worker drops this future unfinished when the client is closed, so
    /// state must stay consistent at every await point.
    fn retry(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Point in time view of what a client has written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub bytes_dropped: u64,
    pub packets_dropped: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SocketStats {
    bytes_sent: Arc<AtomicU64>,
    packets_sent: Arc<AtomicU64>,
    bytes_dropped: Arc<AtomicU64>,
    packets_dropped: Arc<AtomicU64>,
}

impl SocketStats {
    /// Record the outcome of writing a payload of `len` bytes.
    pub(crate) fn update(&self, res: &io::Result<usize>, len: usize) {
        match *res {
            Ok(written) => {
                self.bytes_sent.fetch_add(written as u64, Ordering::Relaxed);
                self.packets_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.bytes_dropped.fetch_add(len as u64, Ordering::Relaxed);
                self.packets_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl From<&SocketStats> for TransportStats {
    fn from(stats: &SocketStats) -> Self {
        TransportStats {
            bytes_sent: stats.bytes_sent.load(Ordering::Relaxed),
            packets_sent: stats.packets_sent.load(Ordering::Relaxed),
            bytes_dropped: stats.bytes_dropped.load(Ordering::Relaxed),
            packets_dropped: stats.packets_dropped.load(Ordering::Relaxed),
        }
    }
}
