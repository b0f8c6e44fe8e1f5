// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::backoff::Backoff;
use super::core::Transport;
use super::resolve::{AddressFamily, Resolver};
use crate::batch::Framing;
use crate::types::{ErrorReporter, MetricError};
use log::{debug, warn};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Lifecycle of the single connection owned by the TCP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ConnectionState {
    /// No connection; the next send connects.
    Disconnected,
    Connecting,
    Connected,
    /// The connection was lost. Payloads are queued until the next retry
    /// succeeds.
    Reconnecting,
    Closing,
    Closed,
}

/// Transport writing newline terminated payloads over one persistent TCP
/// connection.
///
/// The connection is made lazily on the first send. When a connect or write
/// fails, or the server turns out to have closed the connection, the payload
/// is queued, the error is returned to the worker, and the transport enters
/// `Reconnecting`. Later payloads are queued (up to `max_queue_size` bytes,
/// oldest dropped first) and replayed in order once a reconnect attempt
/// succeeds. Whatever is still queued at close is dropped and reported.
pub(crate) struct TcpTransport {
    host: String,
    port: u16,
    resolver: Arc<dyn Resolver>,
    backoff: Backoff,
    errors: ErrorReporter,
    state: ConnectionState,
    stream: Option<TcpStream>,
    queue: VecDeque<String>,
    queued_bytes: usize,
    max_queue_size: usize,
    failures: u32,
    next_retry: Option<Instant>,
}

impl TcpTransport {
    pub(crate) fn new(
        host: &str,
        port: u16,
        resolver: Arc<dyn Resolver>,
        backoff: Backoff,
        max_queue_size: usize,
        errors: ErrorReporter,
    ) -> Self {
        TcpTransport {
            host: host.to_owned(),
            port,
            resolver,
            backoff,
            errors,
            state: ConnectionState::Disconnected,
            stream: None,
            queue: VecDeque::new(),
            queued_bytes: 0,
            max_queue_size,
            failures: 0,
            next_retry: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("tcp {}:{} {:?} -> {:?}", self.host, self.port, self.state, state);
            self.state = state;
        }
    }

    /// Resolve and connect without touching any state, so that dropping
    /// the future part way leaves the transport as it was.
    async fn open(&self) -> io::Result<TcpStream> {
        let addr = self.resolver.resolve(&self.host, self.port, AddressFamily::Any).await?;
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn attach(&mut self, stream: TcpStream) {
        self.stream = Some(stream);
        self.failures = 0;
        self.next_retry = None;
        self.set_state(ConnectionState::Connected);
    }

    async fn connect(&mut self) -> io::Result<()> {
        self.set_state(ConnectionState::Connecting);
        let stream = self.open().await?;
        self.attach(stream);
        Ok(())
    }

    /// Whether the server has closed or reset the connection.
    ///
    /// A write to a socket the peer already closed still succeeds locally, so
    /// the payload would be lost without an error. Reading shows the EOF
    /// instead. Anything the server sent is discarded.
    fn peer_closed(&self) -> bool {
        let stream = match self.stream {
            Some(ref stream) => stream,
            None => return false,
        };

        let mut buf = [0u8; 64];
        loop {
            match stream.try_read(&mut buf) {
                Ok(0) => return true,
                Ok(_) => continue,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return false,
                Err(e) => {
                    debug!("tcp read check failed: {}", e);
                    return true;
                }
            }
        }
    }

    async fn write(&mut self, payload: &str) -> io::Result<usize> {
        let stream = match self.stream {
            Some(ref mut stream) => stream,
            None => return Err(io::Error::new(io::ErrorKind::NotConnected, "no TCP connection")),
        };

        stream.write_all(payload.as_bytes()).await?;
        Ok(payload.len())
    }

    /// Queue a payload for replay, dropping the oldest data if the queue
    /// grows beyond its byte limit.
    fn enqueue(&mut self, payload: String) {
        self.queued_bytes += payload.len();
        self.queue.push_back(payload);

        let mut dropped = 0;
        let mut dropped_bytes = 0;
        while self.queued_bytes > self.max_queue_size {
            match self.queue.pop_front() {
                Some(old) => {
                    self.queued_bytes -= old.len();
                    dropped_bytes += old.len();
                    dropped += 1;
                }
                None => break,
            }
        }

        if dropped > 0 {
            warn!("tcp retry queue full, dropped {} payloads ({} bytes)", dropped, dropped_bytes);
            self.errors.report(MetricError::overflow(format!(
                "TCP retry queue exceeded {} bytes, dropped {} payloads ({} bytes)",
                self.max_queue_size, dropped, dropped_bytes
            )));
        }
    }

    fn schedule_retry(&mut self) {
        let delay = self.backoff.delay(self.failures);
        debug!("tcp reconnect attempt {} in {:?}", self.failures + 1, delay);
        self.next_retry = Some(Instant::now() + delay);
        self.set_state(ConnectionState::Reconnecting);
    }

    /// Drop the connection after `payload` couldn't be written and start
    /// reconnecting.
    fn fail(&mut self, payload: &str) {
        self.stream = None;
        self.enqueue(payload.to_owned());
        self.schedule_retry();
    }

    fn retry_failed(&mut self, err: io::Error) {
        self.stream = None;
        self.failures = self.failures.saturating_add(1);

        if self.backoff.exhausted(self.failures) {
            let dropped = self.queue.len();
            self.queue.clear();
            self.queued_bytes = 0;
            self.failures = 0;
            self.next_retry = None;
            self.set_state(ConnectionState::Disconnected);

            warn!("giving up on tcp reconnect, dropped {} queued payloads", dropped);
            self.errors.report(MetricError::from(io::Error::new(
                err.kind(),
                format!(
                    "unable to reconnect to {}:{}, dropped {} queued payloads: {}",
                    self.host, self.port, dropped, err
                ),
            )));
        } else {
            debug!("tcp reconnect failed: {}", err);
            self.schedule_retry();
        }
    }

    /// Write everything queued, oldest first. A payload leaves the queue
    /// only once it has been written.
    async fn replay(&mut self) -> io::Result<()> {
        while let Some(payload) = self.queue.front().cloned() {
            self.write(&payload).await?;
            self.queue.pop_front();
            self.queued_bytes -= payload.len();
            debug!("replayed {} bytes", payload.len());
        }

        Ok(())
    }
}

impl Transport for TcpTransport {
    async fn send(&mut self, payload: &str) -> io::Result<usize> {
        match self.state {
            ConnectionState::Closing | ConnectionState::Closed => {
                Err(io::Error::new(io::ErrorKind::NotConnected, "TCP transport is closed"))
            }
            ConnectionState::Reconnecting => {
                self.enqueue(payload.to_owned());
                Ok(0)
            }
            ConnectionState::Disconnected | ConnectionState::Connecting | ConnectionState::Connected => {
                if self.peer_closed() {
                    debug!("tcp {}:{} closed by peer", self.host, self.port);
                    self.fail(payload);
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "TCP connection closed by peer"));
                }

                if self.stream.is_none() {
                    if let Err(e) = self.connect().await {
                        self.fail(payload);
                        return Err(e);
                    }
                }

                match self.write(payload).await {
                    Ok(n) => Ok(n),
                    Err(e) => {
                        self.fail(payload);
                        Err(e)
                    }
                }
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.set_state(ConnectionState::Closing);
        self.next_retry = None;

        if !self.queue.is_empty() {
            let dropped = self.queue.len();
            let dropped_bytes = self.queued_bytes;
            self.queue.clear();
            self.queued_bytes = 0;

            warn!("closing with {} undelivered tcp payloads", dropped);
            self.errors.report(MetricError::from(io::Error::new(
                io::ErrorKind::NotConnected,
                format!(
                    "closed before reconnecting to {}:{}, dropped {} queued payloads ({} bytes)",
                    self.host, self.port, dropped, dropped_bytes
                ),
            )));
        }

        let res = match self.stream.take() {
            Some(mut stream) => stream.shutdown().await,
            None => Ok(()),
        };

        self.set_state(ConnectionState::Closed);
        res
    }

    fn framing(&self) -> Framing {
        Framing::Stream
    }

    fn retry_at(&self) -> Option<Instant> {
        match self.state {
            ConnectionState::Reconnecting => self.next_retry,
            _ => None,
        }
    }

    // Stays in `Reconnecting` until the attempt finishes, so the worker can
    // drop it mid way and later sends still queue.
    async fn retry(&mut self) {
        if self.state != ConnectionState::Reconnecting {
            return;
        }

        let stream = match self.open().await {
            Ok(stream) => stream,
            Err(e) => {
                self.retry_failed(e);
                return;
            }
        };
        self.attach(stream);

        if let Err(e) = self.replay().await {
            self.retry_failed(e);
        }
    }
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &self.state)
            .field("queued", &self.queue.len())
            .field("queued_bytes", &self.queued_bytes)
            .field("failures", &self.failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionState, TcpTransport};
    use crate::transport::{AddressFamily, Backoff, ResolveFuture, Resolver, SystemResolver, Transport};
    use crate::types::{ErrorKind, ErrorReporter, MetricError};
    use std::future;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Fails the first lookup and never answers after that.
    #[derive(Default)]
    struct StallingResolver {
        calls: AtomicUsize,
    }

    impl Resolver for StallingResolver {
        fn resolve<'a>(&'a self, _host: &'a str, _port: u16, _family: AddressFamily) -> ResolveFuture<'a> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Box::pin(async { Err::<SocketAddr, _>(io::Error::new(io::ErrorKind::Other, "lookup failed")) })
            } else {
                Box::pin(future::pending::<io::Result<SocketAddr>>())
            }
        }
    }

    fn quick_backoff(max_retries: Option<u32>) -> Backoff {
        Backoff {
            initial: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            jitter: false,
            max_retries,
        }
    }

    fn recording_reporter() -> (ErrorReporter, Arc<Mutex<Vec<MetricError>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let errors_ref = errors.clone();
        let reporter = ErrorReporter::new(Some(Arc::new(move |e: MetricError| {
            errors_ref.lock().unwrap().push(e);
        })));
        (reporter, errors)
    }

    /// Port that nothing listens on, at least until it is bound again.
    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn read_exact_string(stream: &mut tokio::net::TcpStream, len: usize) -> String {
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_tcp_connects_lazily_and_writes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut transport = TcpTransport::new(
            "127.0.0.1",
            port,
            Arc::new(SystemResolver),
            quick_backoff(Some(3)),
            1024,
            ErrorReporter::default(),
        );
        assert_eq!(ConnectionState::Disconnected, transport.state());

        let written = transport.send("foo:1|c\n").await.unwrap();
        let (mut conn, _) = listener.accept().await.unwrap();

        assert_eq!(8, written);
        assert_eq!(ConnectionState::Connected, transport.state());
        assert_eq!("foo:1|c\n", read_exact_string(&mut conn, 8).await);
    }

    #[tokio::test]
    async fn test_tcp_queues_and_replays_in_order() {
        let port = free_port().await;
        let mut transport = TcpTransport::new(
            "127.0.0.1",
            port,
            Arc::new(SystemResolver),
            quick_backoff(None),
            1024,
            ErrorReporter::default(),
        );

        assert!(transport.send("a:1|c\n").await.is_err());
        assert_eq!(ConnectionState::Reconnecting, transport.state());
        assert!(transport.retry_at().is_some());

        assert_eq!(0, transport.send("b:2|c\n").await.unwrap());
        assert_eq!(0, transport.send("c:3|c\n").await.unwrap());

        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        transport.retry().await;
        let (mut conn, _) = listener.accept().await.unwrap();

        assert_eq!(ConnectionState::Connected, transport.state());
        assert!(transport.retry_at().is_none());
        assert_eq!(6, transport.send("d:4|c\n").await.unwrap());
        assert_eq!("a:1|c\nb:2|c\nc:3|c\nd:4|c\n", read_exact_string(&mut conn, 24).await);
    }

    #[tokio::test]
    async fn test_tcp_queue_overflow_drops_oldest() {
        let port = free_port().await;
        let (reporter, errors) = recording_reporter();
        let mut transport = TcpTransport::new(
            "127.0.0.1",
            port,
            Arc::new(SystemResolver),
            quick_backoff(None),
            12,
            reporter,
        );

        assert!(transport.send("a:1|c\n").await.is_err());
        transport.send("b:2|c\n").await.unwrap();
        assert!(errors.lock().unwrap().is_empty());

        transport.send("c:3|c\n").await.unwrap();

        {
            let errors = errors.lock().unwrap();
            assert_eq!(1, errors.len());
            assert_eq!(ErrorKind::Overflow, errors[0].kind());
        }

        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        transport.retry().await;
        let (mut conn, _) = listener.accept().await.unwrap();
        transport.close().await.unwrap();

        let mut rest = String::new();
        conn.read_to_string(&mut rest).await.unwrap();
        assert_eq!("b:2|c\nc:3|c\n", rest);
    }

    #[tokio::test]
    async fn test_tcp_gives_up_after_max_retries() {
        let port = free_port().await;
        let (reporter, errors) = recording_reporter();
        let mut transport = TcpTransport::new(
            "127.0.0.1",
            port,
            Arc::new(SystemResolver),
            quick_backoff(Some(2)),
            1024,
            reporter,
        );

        assert!(transport.send("a:1|c\n").await.is_err());
        transport.retry().await;
        assert_eq!(ConnectionState::Reconnecting, transport.state());
        transport.retry().await;

        assert_eq!(ConnectionState::Disconnected, transport.state());
        assert!(transport.retry_at().is_none());
        let errors = errors.lock().unwrap();
        assert_eq!(1, errors.len());
        assert_eq!(ErrorKind::IoError, errors[0].kind());
    }

    #[tokio::test]
    async fn test_tcp_close_is_final() {
        let port = free_port().await;
        let mut transport = TcpTransport::new(
            "127.0.0.1",
            port,
            Arc::new(SystemResolver),
            quick_backoff(None),
            1024,
            ErrorReporter::default(),
        );

        assert!(transport.send("a:1|c\n").await.is_err());
        transport.close().await.unwrap();

        assert_eq!(ConnectionState::Closed, transport.state());
        assert!(transport.retry_at().is_none());
        assert!(transport.send("b:2|c\n").await.is_err());
    }

    #[tokio::test]
    async fn test_tcp_detects_peer_close_before_write() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut transport = TcpTransport::new(
            "127.0.0.1",
            port,
            Arc::new(SystemResolver),
            quick_backoff(None),
            1024,
            ErrorReporter::default(),
        );

        transport.send("a:1|c\n").await.unwrap();
        let (mut conn, _) = listener.accept().await.unwrap();
        assert_eq!("a:1|c\n", read_exact_string(&mut conn, 6).await);
        drop(conn);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = transport.send("b:2|c\n").await.unwrap_err();
        assert_eq!(io::ErrorKind::ConnectionReset, err.kind());
        assert_eq!(ConnectionState::Reconnecting, transport.state());
        assert_eq!(0, transport.send("c:3|c\n").await.unwrap());

        transport.retry().await;
        let (mut conn, _) = listener.accept().await.unwrap();

        assert_eq!(ConnectionState::Connected, transport.state());
        assert_eq!("b:2|c\nc:3|c\n", read_exact_string(&mut conn, 12).await);
    }

    #[tokio::test]
    async fn test_tcp_close_reports_queued_payloads() {
        let port = free_port().await;
        let (reporter, errors) = recording_reporter();
        let mut transport = TcpTransport::new(
            "127.0.0.1",
            port,
            Arc::new(SystemResolver),
            quick_backoff(None),
            1024,
            reporter,
        );

        assert!(transport.send("a:1|c\n").await.is_err());
        assert_eq!(0, transport.send("b:2|c\n").await.unwrap());
        assert!(errors.lock().unwrap().is_empty());

        transport.close().await.unwrap();

        let errors = errors.lock().unwrap();
        assert_eq!(1, errors.len());
        assert_eq!(ErrorKind::IoError, errors[0].kind());
        assert!(errors[0].to_string().contains("dropped 2 queued payloads"));
    }

    #[tokio::test]
    async fn test_tcp_abandoned_retry_keeps_queueing() {
        let mut transport = TcpTransport::new(
            "127.0.0.1",
            8125,
            Arc::new(StallingResolver::default()),
            quick_backoff(None),
            1024,
            ErrorReporter::default(),
        );

        assert!(transport.send("a:1|c\n").await.is_err());
        let res = tokio::time::timeout(Duration::from_millis(20), transport.retry()).await;

        assert!(res.is_err());
        assert_eq!(ConnectionState::Reconnecting, transport.state());
        assert_eq!(0, transport.send("b:2|c\n").await.unwrap());

        transport.close().await.unwrap();
        assert_eq!(ConnectionState::Closed, transport.state());
    }
}
