// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::batch::{Batch, Batcher, Line};
use crate::transport::{SocketStats, Transport};
use crate::types::{ErrorReporter, MetricError, MetricResult};
use log::{debug, trace};
use std::future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::sync::{oneshot, Notify};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};

pub(crate) type Reply = oneshot::Sender<MetricResult<()>>;

pub(crate) enum Cmd {
    Write(Line),
    Flush(Reply),
    Close(Reply),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerSettings {
    pub(crate) max_buffer_size: usize,
    pub(crate) flush_interval: Duration,
}

pub(crate) fn closed_error() -> MetricError {
    MetricError::from(io::Error::new(io::ErrorKind::NotConnected, "client is closed"))
}

async fn dispatch<T: Transport>(
    transport: &mut T,
    batch: Batch,
    errors: &ErrorReporter,
    stats: &SocketStats,
) -> MetricResult<usize> {
    let res = transport.send(&batch.payload).await;
    stats.update(&res, batch.payload.len());

    let res = match res {
        Ok(n) => {
            debug!("sent {} bytes ({} lines)", n, batch.lines);
            Ok(n)
        }
        Err(e) => {
            let err = MetricError::from(e);
            errors.report(err.clone());
            Err(err)
        }
    };

    batch.complete(&res);
    res
}

async fn flush<T: Transport>(
    transport: &mut T,
    batcher: &mut Batcher,
    errors: &ErrorReporter,
    stats: &SocketStats,
) -> MetricResult<()> {
    match batcher.take() {
        Some(batch) => dispatch(transport, batch, errors, stats).await.map(|_| ()),
        None => Ok(()),
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending::<()>().await,
    }
}

async fn retry_due(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => future::pending::<()>().await,
    }
}

/// Background task owning the buffer and transport of one root client.
///
/// Runs until a `Close` command arrives or every sender is dropped. Either
/// way, buffered lines get one final flush and the transport is closed.
/// Commands still queued after that are answered with a "closed" error.
///
/// `closing` is notified before `Close` is sent. A reconnect attempt in
/// progress at that point is dropped and no further attempts are made.
pub(crate) async fn run<T: Transport>(
    mut rx: Receiver<Cmd>,
    mut transport: T,
    settings: WorkerSettings,
    errors: ErrorReporter,
    stats: SocketStats,
    closing: Arc<Notify>,
) {
    let mut batcher = Batcher::new(settings.max_buffer_size, transport.framing());
    let mut ticker = if batcher.is_buffered() && !settings.flush_interval.is_zero() {
        let period = settings.flush_interval;
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(interval)
    } else {
        None
    };

    let mut stopping = false;

    loop {
        let retry_at = if stopping { None } else { transport.retry_at() };

        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Cmd::Write(line)) => {
                    trace!("write: {}", line.text);
                    for batch in batcher.push(line) {
                        let _ = dispatch(&mut transport, batch, &errors, &stats).await;
                    }
                }

                Some(Cmd::Flush(reply)) => {
                    trace!("flush");
                    let res = flush(&mut transport, &mut batcher, &errors, &stats).await;
                    let _ = reply.send(res);
                }

                Some(Cmd::Close(reply)) => {
                    debug!("close");
                    let res = flush(&mut transport, &mut batcher, &errors, &stats).await;
                    let closed = transport.close().await.map_err(MetricError::from);
                    let _ = reply.send(res.and(closed));
                    break;
                }

                None => {
                    debug!("stop");
                    let _ = flush(&mut transport, &mut batcher, &errors, &stats).await;
                    if let Err(e) = transport.close().await {
                        debug!("error closing transport: {}", e);
                    }
                    break;
                }
            },

            _ = tick(&mut ticker) => {
                trace!("timeout with {} bytes buffered", batcher.len());
                let _ = flush(&mut transport, &mut batcher, &errors, &stats).await;
            }

            _ = retry_due(retry_at) => {
                trace!("retry");
                tokio::select! {
                    _ = transport.retry() => {}
                    _ = closing.notified() => {
                        debug!("close requested, abandoning reconnect");
                        stopping = true;
                    }
                }
            }
        }
    }

    rx.close();
    while let Ok(cmd) = rx.try_recv() {
        match cmd {
            Cmd::Write(line) => line.complete(Err(closed_error())),
            Cmd::Flush(reply) | Cmd::Close(reply) => {
                let _ = reply.send(Ok(()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{run, Cmd, WorkerSettings};
    use crate::batch::{Framing, Line};
    use crate::transport::{MockBuffer, MockTransport, SocketStats, Transport, TransportStats};
    use crate::types::{ErrorKind, ErrorReporter, MetricError};
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot, Notify};
    use tokio::time::Instant;

    struct BrokenTransport;

    impl Transport for BrokenTransport {
        async fn send(&mut self, _payload: &str) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }

        async fn close(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn framing(&self) -> Framing {
            Framing::Datagram
        }
    }

    /// Always due for a reconnect that never completes.
    struct StalledTransport;

    impl Transport for StalledTransport {
        async fn send(&mut self, _payload: &str) -> io::Result<usize> {
            Ok(0)
        }

        async fn close(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn framing(&self) -> Framing {
            Framing::Stream
        }

        fn retry_at(&self) -> Option<Instant> {
            Some(Instant::now())
        }

        async fn retry(&mut self) {
            std::future::pending::<()>().await
        }
    }

    fn settings(max_buffer_size: usize, flush_interval: Duration) -> WorkerSettings {
        WorkerSettings {
            max_buffer_size,
            flush_interval,
        }
    }

    fn write(s: &str) -> Cmd {
        Cmd::Write(Line::new(s.to_string(), None))
    }

    #[tokio::test]
    async fn test_worker_send_single_line() {
        let (tx, rx) = mpsc::channel(10);
        let buffer = MockBuffer::default();

        tx.send(write("test1")).await.unwrap();
        drop(tx);

        run(
            rx,
            MockTransport::new(buffer.clone()),
            settings(0, Duration::from_millis(100)),
            ErrorReporter::default(),
            SocketStats::default(),
            Arc::new(Notify::new()),
        )
        .await;

        assert_eq!(vec!["test1"], buffer.snapshot());
    }

    #[tokio::test]
    async fn test_worker_flushes_buffer_on_stop() {
        let (tx, rx) = mpsc::channel(10);
        let buffer = MockBuffer::default();

        tx.send(write("a:1|c")).await.unwrap();
        tx.send(write("b:2|c")).await.unwrap();
        drop(tx);

        run(
            rx,
            MockTransport::new(buffer.clone()),
            settings(1024, Duration::from_secs(60)),
            ErrorReporter::default(),
            SocketStats::default(),
            Arc::new(Notify::new()),
        )
        .await;

        assert_eq!(vec!["a:1|c\nb:2|c"], buffer.snapshot());
    }

    #[tokio::test]
    async fn test_worker_explicit_flush() {
        let (tx, rx) = mpsc::channel(10);
        let buffer = MockBuffer::default();
        let handle = tokio::spawn(run(
            rx,
            MockTransport::new(buffer.clone()),
            settings(1024, Duration::from_secs(60)),
            ErrorReporter::default(),
            SocketStats::default(),
            Arc::new(Notify::new()),
        ));

        tx.send(write("a:1|c")).await.unwrap();
        let (reply, done) = oneshot::channel();
        tx.send(Cmd::Flush(reply)).await.unwrap();
        done.await.unwrap().unwrap();

        assert_eq!(vec!["a:1|c"], buffer.snapshot());

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_periodic_flush() {
        let (tx, rx) = mpsc::channel(10);
        let buffer = MockBuffer::default();
        let handle = tokio::spawn(run(
            rx,
            MockTransport::new(buffer.clone()),
            settings(1024, Duration::from_millis(20)),
            ErrorReporter::default(),
            SocketStats::default(),
            Arc::new(Notify::new()),
        ));

        tx.send(write("a:1|c")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(vec!["a:1|c"], buffer.snapshot());

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_close_rejects_later_writes() {
        let (tx, rx) = mpsc::channel(10);
        let buffer = MockBuffer::default();
        let failed = Arc::new(Mutex::new(None));
        let failed_ref = failed.clone();

        let (reply, done) = oneshot::channel();
        tx.send(write("a:1|c")).await.unwrap();
        tx.send(Cmd::Close(reply)).await.unwrap();
        tx.send(Cmd::Write(Line::new(
            "b:2|c".to_string(),
            Some(Box::new(move |res| {
                *failed_ref.lock().unwrap() = Some(res);
            })),
        )))
        .await
        .unwrap();

        run(
            rx,
            MockTransport::new(buffer.clone()),
            settings(1024, Duration::from_secs(60)),
            ErrorReporter::default(),
            SocketStats::default(),
            Arc::new(Notify::new()),
        )
        .await;

        done.await.unwrap().unwrap();
        assert_eq!(vec!["a:1|c"], buffer.snapshot());
        assert!(failed.lock().unwrap().take().unwrap().is_err());
    }

    #[tokio::test]
    async fn test_worker_error_reaches_handler_and_callbacks_once() {
        let (tx, rx) = mpsc::channel(10);
        let handled: Arc<Mutex<Vec<MetricError>>> = Arc::new(Mutex::new(Vec::new()));
        let handled_ref = handled.clone();
        let errors = ErrorReporter::new(Some(Arc::new(move |e: MetricError| {
            handled_ref.lock().unwrap().push(e);
        })));
        let results = Arc::new(Mutex::new(Vec::new()));

        for name in &["a:1|c", "b:2|c"] {
            let results = results.clone();
            tx.send(Cmd::Write(Line::new(
                name.to_string(),
                Some(Box::new(move |res| results.lock().unwrap().push(res))),
            )))
            .await
            .unwrap();
        }
        drop(tx);

        let stats = SocketStats::default();
        run(
            rx,
            BrokenTransport,
            settings(1024, Duration::from_secs(60)),
            errors,
            stats.clone(),
            Arc::new(Notify::new()),
        )
        .await;

        let handled = handled.lock().unwrap();
        assert_eq!(1, handled.len());
        assert_eq!(ErrorKind::IoError, handled[0].kind());

        let results = results.lock().unwrap();
        assert_eq!(2, results.len());
        assert!(results.iter().all(|r| r.is_err()));

        let stats = TransportStats::from(&stats);
        assert_eq!(1, stats.packets_dropped);
        assert_eq!(11, stats.bytes_dropped);
    }

    #[tokio::test]
    async fn test_worker_close_abandons_reconnect() {
        let (tx, rx) = mpsc::channel(10);
        let closing = Arc::new(Notify::new());
        let handle = tokio::spawn(run(
            rx,
            StalledTransport,
            settings(0, Duration::from_secs(60)),
            ErrorReporter::default(),
            SocketStats::default(),
            closing.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (reply, done) = oneshot::channel();
        closing.notify_one();
        tx.send(Cmd::Close(reply)).await.unwrap();

        let res = tokio::time::timeout(Duration::from_secs(2), done).await;
        assert!(res.unwrap().unwrap().is_ok());
        handle.await.unwrap();
    }
}
