// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::types::{Callback, MetricResult};
use std::fmt;

/// How lines are joined into a single payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Lines are separated by `\n`, with no trailing newline. Used for
    /// UDP where the datagram boundary ends the last line.
    Datagram,
    /// Every line is terminated by `\n`. Used for TCP where the reader
    /// needs the terminator to find the end of each line.
    Stream,
}

impl Framing {
    /// Extra bytes needed to add a line to a payload currently `current`
    /// bytes long.
    fn overhead(self, current: usize) -> usize {
        match self {
            Framing::Datagram if current == 0 => 0,
            Framing::Datagram | Framing::Stream => 1,
        }
    }
}

/// A single formatted line plus the callback waiting on it.
pub(crate) struct Line {
    pub(crate) text: String,
    pub(crate) callback: Option<Callback>,
}

impl Line {
    pub(crate) fn new(text: String, callback: Option<Callback>) -> Self {
        Line { text, callback }
    }

    /// Report `result` to the callback, if any, without sending anything.
    pub(crate) fn complete(self, result: MetricResult<usize>) {
        if let Some(cb) = self.callback {
            cb(result);
        }
    }
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Line")
            .field("text", &self.text)
            .field("callback", &self.callback.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Payload ready to be handed to a transport, along with the callbacks of
/// every line it contains.
pub(crate) struct Batch {
    pub(crate) payload: String,
    pub(crate) lines: usize,
    callbacks: Vec<Callback>,
}

impl Batch {
    /// Deliver the outcome of sending this payload to every callback.
    pub(crate) fn complete(self, result: &MetricResult<usize>) {
        for cb in self.callbacks {
            cb(result.clone());
        }
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("payload", &self.payload)
            .field("lines", &self.lines)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Accumulates lines into payloads no larger than `capacity` bytes.
///
/// A capacity of zero disables buffering: every line becomes its own
/// payload as soon as it is pushed. A line that is larger than the capacity
/// on its own is never split or dropped, it is sent alone after whatever was
/// already buffered.
pub(crate) struct Batcher {
    buf: String,
    lines: usize,
    capacity: usize,
    framing: Framing,
    callbacks: Vec<Callback>,
}

impl Batcher {
    pub(crate) fn new(capacity: usize, framing: Framing) -> Self {
        Batcher {
            buf: String::with_capacity(capacity),
            lines: 0,
            capacity,
            framing,
            callbacks: Vec::new(),
        }
    }

    pub(crate) fn is_buffered(&self) -> bool {
        self.capacity > 0
    }

    /// Bytes currently buffered, including separators.
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lines == 0
    }

    /// Add a line, returning the payloads that have to be sent right away
    /// in the order they must be sent.
    pub(crate) fn push(&mut self, line: Line) -> Vec<Batch> {
        let mut ready = Vec::new();

        if !self.is_buffered() {
            ready.push(self.single(line));
            return ready;
        }

        let alone = line.text.len() + self.framing.overhead(0);
        let needed = line.text.len() + self.framing.overhead(self.buf.len());

        if self.buf.len() + needed > self.capacity {
            ready.extend(self.take());
        }

        if alone > self.capacity {
            ready.push(self.single(line));
        } else {
            self.append(line);
        }

        ready
    }

    /// Remove everything buffered as a single payload.
    pub(crate) fn take(&mut self) -> Option<Batch> {
        if self.is_empty() {
            return None;
        }

        let payload = std::mem::replace(&mut self.buf, String::with_capacity(self.capacity));
        let lines = std::mem::replace(&mut self.lines, 0);
        let callbacks = std::mem::take(&mut self.callbacks);

        Some(Batch {
            payload,
            lines,
            callbacks,
        })
    }

    fn append(&mut self, line: Line) {
        if self.framing == Framing::Datagram && !self.buf.is_empty() {
            self.buf.push('\n');
        }
        self.buf.push_str(&line.text);
        if self.framing == Framing::Stream {
            self.buf.push('\n');
        }

        self.lines += 1;
        if let Some(cb) = line.callback {
            self.callbacks.push(cb);
        }
    }

    fn single(&self, line: Line) -> Batch {
        let Line { mut text, callback } = line;
        if self.framing == Framing::Stream {
            text.push('\n');
        }

        Batch {
            payload: text,
            lines: 1,
            callbacks: callback.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Batcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batcher")
            .field("len", &self.buf.len())
            .field("lines", &self.lines)
            .field("capacity", &self.capacity)
            .field("framing", &self.framing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Batcher, Framing, Line};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn line(s: &str) -> Line {
        Line::new(s.to_string(), None)
    }

    fn payloads(batches: Vec<super::Batch>) -> Vec<String> {
        batches.into_iter().map(|b| b.payload).collect()
    }

    #[test]
    fn test_unbuffered_sends_each_line() {
        let mut batcher = Batcher::new(0, Framing::Datagram);

        assert_eq!(vec!["foo:1|c"], payloads(batcher.push(line("foo:1|c"))));
        assert_eq!(vec!["bar:2|c"], payloads(batcher.push(line("bar:2|c"))));
        assert!(batcher.take().is_none());
    }

    #[test]
    fn test_unbuffered_stream_is_newline_terminated() {
        let mut batcher = Batcher::new(0, Framing::Stream);

        assert_eq!(vec!["foo:1|c\n"], payloads(batcher.push(line("foo:1|c"))));
    }

    #[test]
    fn test_datagram_lines_joined_without_trailing_newline() {
        let mut batcher = Batcher::new(64, Framing::Datagram);

        assert!(batcher.push(line("abc:3|g")).is_empty());
        assert!(batcher.push(line("def:4|g")).is_empty());
        assert_eq!(15, batcher.len());

        let batch = batcher.take().unwrap();
        assert_eq!("abc:3|g\ndef:4|g", batch.payload);
        assert_eq!(2, batch.lines);
        assert_eq!(0, batcher.len());
    }

    #[test]
    fn test_stream_lines_all_terminated() {
        let mut batcher = Batcher::new(64, Framing::Stream);

        batcher.push(line("abc:3|g"));
        batcher.push(line("def:4|g"));

        assert_eq!("abc:3|g\ndef:4|g\n", batcher.take().unwrap().payload);
    }

    #[test]
    fn test_overflow_flushes_previous_first() {
        let mut batcher = Batcher::new(16, Framing::Datagram);

        assert!(batcher.push(line("foo:1234|c")).is_empty());
        let ready = payloads(batcher.push(line("baz:56789|c")));

        assert_eq!(vec!["foo:1234|c"], ready);
        assert_eq!("baz:56789|c", batcher.take().unwrap().payload);
    }

    #[test]
    fn test_exact_fit_is_kept() {
        // 7 + 1 + 7 == 15
        let mut batcher = Batcher::new(15, Framing::Datagram);

        batcher.push(line("abc:3|g"));
        assert!(batcher.push(line("def:4|g")).is_empty());
        assert_eq!(15, batcher.len());
    }

    #[test]
    fn test_oversized_line_sent_alone_after_buffer() {
        let mut batcher = Batcher::new(16, Framing::Datagram);

        batcher.push(line("abc:4|g"));
        let ready = payloads(batcher.push(line("some_really_long_metric:456|c")));

        assert_eq!(vec!["abc:4|g", "some_really_long_metric:456|c"], ready);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_payloads_never_exceed_capacity() {
        let mut batcher = Batcher::new(32, Framing::Stream);
        let mut sent = Vec::new();

        for i in 0..50 {
            sent.extend(payloads(batcher.push(line(&format!("metric.{}:{}|c", i, i * 7)))));
        }
        sent.extend(batcher.take().map(|b| b.payload));

        assert!(sent.iter().all(|p| p.len() <= 32));
        assert_eq!(50, sent.iter().map(|p| p.lines().count()).sum::<usize>());
    }

    #[test]
    fn test_callbacks_travel_with_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut batcher = Batcher::new(64, Framing::Datagram);

        for _ in 0..3 {
            let calls = calls.clone();
            batcher.push(Line::new(
                "x:1|c".to_string(),
                Some(Box::new(move |res| {
                    assert_eq!(17, res.unwrap());
                    calls.fetch_add(1, Ordering::Release);
                })),
            ));
        }

        batcher.take().unwrap().complete(&Ok(17));
        assert_eq!(3, calls.load(Ordering::Acquire));
    }
}
