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
use crate::batch::Framing;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// Shared list of every payload a mocked client would have sent.
#[derive(Debug, Clone, Default)]
pub struct MockBuffer {
    inner: Arc<Mutex<Vec<String>>>,
}

impl MockBuffer {
    pub(crate) fn push(&self, payload: &str) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.to_owned());
    }

    /// Copy of the payloads recorded so far, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Transport that records payloads instead of writing them anywhere.
#[derive(Debug)]
pub(crate) struct MockTransport {
    buffer: MockBuffer,
}

impl MockTransport {
    pub(crate) fn new(buffer: MockBuffer) -> Self {
        MockTransport { buffer }
    }
}

impl Transport for MockTransport {
    async fn send(&mut self, payload: &str) -> io::Result<usize> {
        self.buffer.push(payload);
        Ok(0)
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn framing(&self) -> Framing {
        Framing::Datagram
    }
}
