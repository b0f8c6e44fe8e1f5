// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::batch::Line;
use crate::builder::{
    key_value_tag, MetricBuilder, MetricFormatter, MetricType, MetricValue, RandomSource, RawFormatter, SampleRate,
    Sampler, ThreadRandom,
};
use crate::datadog::{CheckStatus, EventBuilder, EventFormatter, ServiceCheckBuilder, ServiceCheckFormatter};
use crate::options::{ClientOptions, Protocol};
use crate::transport::{
    MockBuffer, MockTransport, Resolver, SocketStats, SystemResolver, TcpTransport, TransportStats, UdpTransport,
};
use crate::types::{Callback, ErrorHandler, ErrorReporter, MetricError, MetricResult};
use crate::worker::{self, closed_error, Cmd, WorkerSettings};
use log::debug;
use std::fmt;
use std::future::Future;
use std::io;
use std::panic::RefUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Notify};

/// Prefix, suffix and tags applied to everything a client emits.
///
/// Child clients get a flattened copy of their parent's scope with their own
/// additions appended, so rendering a line never walks a parent chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Scope {
    pub(crate) prefix: String,
    pub(crate) suffix: String,
    pub(crate) tags: Vec<String>,
}

impl Scope {
    pub(crate) fn new(prefix: &str, suffix: &str, tags: Vec<String>) -> Self {
        Scope {
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
            tags,
        }
    }
}

/// State shared by a root client and all of its clones and children.
struct Core {
    tx: mpsc::Sender<Cmd>,
    errors: ErrorReporter,
    sampler: Sampler,
    telegraf: bool,
    closed: AtomicBool,
    closing: Arc<Notify>,
    mock: Option<MockBuffer>,
    stats: SocketStats,
}

/// Builder for creating and customizing `StatsdClient` instances.
///
/// Instances of the builder should be created by calling the `::builder()`
/// method on the `StatsdClient` struct.
///
/// # Example
///
/// ```no_run
/// use tempo::{ClientOptions, MetricError, StatsdClient};
///
/// fn my_error_handler(err: MetricError) {
///     eprintln!("Metric error! {}", err);
/// }
///
/// # async fn run() -> tempo::MetricResult<()> {
/// let client = StatsdClient::builder(ClientOptions::new("metrics.example.com", 8125))
///     .with_error_handler(my_error_handler)
///     .with_tag("environment", "production")
///     .with_tag_value("rust")
///     .build()?;
///
/// client.count("something", 123)?;
/// client.count_with_tags("some.counter", 42)
///     .with_tag("region", "us-east-2")
///     .send();
/// # Ok(())
/// # }
/// ```
pub struct StatsdClientBuilder {
    options: ClientOptions,
    errors: Option<ErrorHandler>,
    resolver: Arc<dyn Resolver>,
    random: Arc<dyn RandomSource>,
}

impl StatsdClientBuilder {
    fn new(options: ClientOptions) -> Self {
        StatsdClientBuilder {
            options,
            errors: None,
            resolver: Arc::new(SystemResolver),
            random: Arc::new(ThreadRandom),
        }
    }

    /// Set a handler for errors that have no caller waiting on them.
    ///
    /// The handler is invoked exactly once per failure: a payload that
    /// couldn't be written, a TCP retry queue overflow, giving up on a
    /// reconnect, or a metric sent with `MetricBuilder::send()` that couldn't
    /// be queued. Without a handler these errors are logged at debug level
    /// and discarded.
    ///
    /// The handler runs on the background worker for transport errors and
    /// should consume the error without panicking or blocking.
    pub fn with_error_handler<F>(mut self, errors: F) -> Self
    where
        F: Fn(MetricError) + Sync + Send + RefUnwindSafe + 'static,
    {
        self.errors = Some(Arc::new(errors));
        self
    }

    /// Use a custom resolver for the server's host name.
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: Resolver + 'static,
    {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Use a custom source of randomness for sampling.
    pub fn with_random_source<R>(mut self, random: R) -> Self
    where
        R: RandomSource + 'static,
    {
        self.random = Arc::new(random);
        self
    }

    /// Add a `key:value` tag to everything the built client emits.
    pub fn with_tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: ToString,
        V: ToString,
    {
        self.options
            .global_tags
            .push(key_value_tag(&key.to_string(), &value.to_string()));
        self
    }

    /// Add a value-only tag to everything the built client emits.
    pub fn with_tag_value<V>(mut self, value: V) -> Self
    where
        V: ToString,
    {
        self.options.global_tags.push(value.to_string());
        self
    }

    /// Validate the options and start the background worker on the current
    /// Tokio runtime.
    ///
    /// Fails with a configuration error when called outside of a runtime or
    /// when the options can never work (see `ClientOptions::validate`).
    pub fn build(self) -> MetricResult<StatsdClient> {
        let handle =
            Handle::try_current().map_err(|_| MetricError::config("a Tokio runtime is required to build a client"))?;
        let StatsdClientBuilder {
            options,
            errors,
            resolver,
            random,
        } = self;
        options.validate()?;

        let errors = ErrorReporter::new(errors);
        let stats = SocketStats::default();
        let settings = WorkerSettings {
            max_buffer_size: options.max_buffer_size,
            flush_interval: options.buffer_flush_interval,
        };
        let (tx, rx) = mpsc::channel(options.queue_capacity);
        let closing = Arc::new(Notify::new());

        let mock = if options.mock {
            let buffer = MockBuffer::default();
            let transport = MockTransport::new(buffer.clone());
            handle.spawn(worker::run(
                rx,
                transport,
                settings,
                errors.clone(),
                stats.clone(),
                closing.clone(),
            ));
            debug!("started mock client");
            Some(buffer)
        } else {
            match options.protocol {
                Protocol::Tcp => {
                    let transport = TcpTransport::new(
                        &options.host,
                        options.port,
                        resolver,
                        options.reconnect.clone(),
                        options.retry_queue_size(),
                        errors.clone(),
                    );
                    handle.spawn(worker::run(
                        rx,
                        transport,
                        settings,
                        errors.clone(),
                        stats.clone(),
                        closing.clone(),
                    ));
                }
                udp @ (Protocol::Udp4 | Protocol::Udp6) => {
                    let transport = UdpTransport::new(
                        &options.host,
                        options.port,
                        udp.family(),
                        resolver,
                        options.cache_dns,
                    );
                    handle.spawn(worker::run(
                        rx,
                        transport,
                        settings,
                        errors.clone(),
                        stats.clone(),
                        closing.clone(),
                    ));
                }
            }
            debug!("started {} client for {}:{}", options.protocol, options.host, options.port);
            None
        };

        let core = Core {
            tx,
            errors,
            sampler: Sampler::new(random),
            telegraf: options.telegraf,
            closed: AtomicBool::new(false),
            closing,
            mock,
            stats,
        };

        Ok(StatsdClient {
            scope: Arc::new(Scope::new(&options.prefix, &options.suffix, options.global_tags)),
            sample_rate: SampleRate::new(options.sample_rate),
            core: Arc::new(core),
        })
    }
}

impl fmt::Debug for StatsdClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdClientBuilder")
            .field("options", &self.options)
            .field("errors", &self.errors.as_ref().map(|_| "..."))
            .finish_non_exhaustive()
    }
}

/// Client for a StatsD or DogStatsD server.
///
/// Emitting a metric never blocks and never waits on the network: the line
/// is formatted on the calling task and handed to a background worker that
/// buffers it and writes it out. The `Result` returned by the emitting
/// methods only says whether that hand-off worked. Network failures are
/// delivered to the error handler and to per-metric callbacks.
///
/// Clients are cheap to clone. Clones and child clients share the worker
/// of the client they came from. The worker stops, after flushing anything
/// buffered, when `close()` is called or when the last handle is dropped.
///
/// # Example
///
/// ```no_run
/// use tempo::{ClientOptions, StatsdClient};
///
/// # async fn run() -> tempo::MetricResult<()> {
/// let client = StatsdClient::from_options(ClientOptions {
///     prefix: "my.app.".to_string(),
///     max_buffer_size: 1432,
///     ..ClientOptions::default()
/// })?;
///
/// client.increment("requests")?;
/// client.gauge("queue.depth", 17)?;
/// client.timing("db.query", std::time::Duration::from_millis(12))?;
///
/// let jobs = client.child().with_prefix("jobs.").with_tag("queue", "default").build();
/// jobs.increment("started")?;
///
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StatsdClient {
    scope: Arc<Scope>,
    sample_rate: SampleRate,
    core: Arc<Core>,
}

impl StatsdClient {
    /// Create a new client from the given options with no error handler.
    pub fn from_options(options: ClientOptions) -> MetricResult<Self> {
        Self::builder(options).build()
    }

    /// Create a builder that allows an error handler, resolver or random
    /// source to be set before the client is created.
    pub fn builder(options: ClientOptions) -> StatsdClientBuilder {
        StatsdClientBuilder::new(options)
    }

    pub(crate) fn should_send(&self, rate: SampleRate) -> bool {
        self.core.sampler.should_send(rate)
    }

    pub(crate) fn consume_error(&self, err: MetricError) {
        self.core.errors.report(err);
    }

    /// Hand a finished line to the worker. Failure to do so is reported to
    /// the callback as well as returned.
    pub(crate) fn dispatch(&self, line: String, callback: Option<Callback>) -> MetricResult<()> {
        if self.core.closed.load(Ordering::Acquire) {
            let err = closed_error();
            Line::new(line, callback).complete(Err(err.clone()));
            return Err(err);
        }

        self.core.tx.try_send(Cmd::Write(Line::new(line, callback))).map_err(|e| {
            let (cmd, err) = match e {
                TrySendError::Full(cmd) => {
                    let err = io::Error::new(io::ErrorKind::WouldBlock, "metric queue is full");
                    (cmd, MetricError::from(err))
                }
                TrySendError::Closed(cmd) => (cmd, closed_error()),
            };

            if let Cmd::Write(line) = cmd {
                line.complete(Err(err.clone()));
            }
            err
        })
    }

    fn metric<'a>(&'a self, key: &'a str, val: MetricValue, type_: MetricType) -> MetricBuilder<'a, 'a> {
        let fmt = MetricFormatter::new(&self.scope, key, val, type_)
            .with_telegraf(self.core.telegraf)
            .with_sample_rate(self.sample_rate);
        MetricBuilder::from_fmt(fmt, self)
    }

    /// Increment or decrement a counter by the given amount.
    pub fn count<V: Into<MetricValue>>(&self, key: &str, value: V) -> MetricResult<()> {
        self.count_with_tags(key, value).try_send()
    }

    pub fn count_with_tags<'a, V: Into<MetricValue>>(&'a self, key: &'a str, value: V) -> MetricBuilder<'a, 'a> {
        self.metric(key, value.into(), MetricType::Counter)
    }

    /// Increment a counter by `1`.
    pub fn increment(&self, key: &str) -> MetricResult<()> {
        self.count(key, 1)
    }

    pub fn increment_with_tags<'a>(&'a self, key: &'a str) -> MetricBuilder<'a, 'a> {
        self.count_with_tags(key, 1)
    }

    pub fn increment_by(&self, key: &str, value: i64) -> MetricResult<()> {
        self.count(key, value)
    }

    /// Decrement a counter by `1`.
    pub fn decrement(&self, key: &str) -> MetricResult<()> {
        self.count(key, -1)
    }

    pub fn decrement_with_tags<'a>(&'a self, key: &'a str) -> MetricBuilder<'a, 'a> {
        self.count_with_tags(key, -1)
    }

    pub fn decrement_by(&self, key: &str, value: i64) -> MetricResult<()> {
        self.count(key, value.saturating_neg())
    }

    /// Set a gauge to an absolute value.
    pub fn gauge<V: Into<MetricValue>>(&self, key: &str, value: V) -> MetricResult<()> {
        self.gauge_with_tags(key, value).try_send()
    }

    pub fn gauge_with_tags<'a, V: Into<MetricValue>>(&'a self, key: &'a str, value: V) -> MetricBuilder<'a, 'a> {
        self.metric(key, value.into(), MetricType::Gauge)
    }

    /// Adjust a gauge relative to its current value, e.g. `+5` or `-3`.
    pub fn gauge_delta(&self, key: &str, delta: i64) -> MetricResult<()> {
        self.gauge_delta_with_tags(key, delta).try_send()
    }

    pub fn gauge_delta_with_tags<'a>(&'a self, key: &'a str, delta: i64) -> MetricBuilder<'a, 'a> {
        self.metric(key, MetricValue::Delta(delta), MetricType::Gauge)
    }

    /// Record a timing. Durations are sent as fractional milliseconds.
    pub fn timing<V: Into<MetricValue>>(&self, key: &str, value: V) -> MetricResult<()> {
        self.timing_with_tags(key, value).try_send()
    }

    pub fn timing_with_tags<'a, V: Into<MetricValue>>(&'a self, key: &'a str, value: V) -> MetricBuilder<'a, 'a> {
        self.metric(key, value.into(), MetricType::Timer)
    }

    pub fn histogram<V: Into<MetricValue>>(&self, key: &str, value: V) -> MetricResult<()> {
        self.histogram_with_tags(key, value).try_send()
    }

    pub fn histogram_with_tags<'a, V: Into<MetricValue>>(&'a self, key: &'a str, value: V) -> MetricBuilder<'a, 'a> {
        self.metric(key, value.into(), MetricType::Histogram)
    }

    pub fn distribution<V: Into<MetricValue>>(&self, key: &str, value: V) -> MetricResult<()> {
        self.distribution_with_tags(key, value).try_send()
    }

    pub fn distribution_with_tags<'a, V: Into<MetricValue>>(
        &'a self,
        key: &'a str,
        value: V,
    ) -> MetricBuilder<'a, 'a> {
        self.metric(key, value.into(), MetricType::Distribution)
    }

    /// Count a unique occurrence of `value`.
    pub fn set<V: Into<MetricValue>>(&self, key: &str, value: V) -> MetricResult<()> {
        self.set_with_tags(key, value).try_send()
    }

    pub fn set_with_tags<'a, V: Into<MetricValue>>(&'a self, key: &'a str, value: V) -> MetricBuilder<'a, 'a> {
        self.metric(key, value.into(), MetricType::Set)
    }

    /// Send an event. Fails with a configuration error in Telegraf mode.
    pub fn event(&self, title: &str, text: &str) -> MetricResult<()> {
        self.event_with_options(title).with_text(text).send()
    }

    pub fn event_with_options<'a>(&'a self, title: &'a str) -> EventBuilder<'a, 'a> {
        if self.core.telegraf {
            let err = MetricError::config("events are not supported in Telegraf mode");
            return EventBuilder::from_error(err, self);
        }

        EventBuilder::new(EventFormatter::new(title, &self.scope.tags), self)
    }

    /// Send a service check. Fails with a configuration error in Telegraf
    /// mode.
    pub fn check(&self, name: &str, status: CheckStatus) -> MetricResult<()> {
        self.check_with_options(name, status).send()
    }

    pub fn check_with_options<'a>(&'a self, name: &'a str, status: CheckStatus) -> ServiceCheckBuilder<'a, 'a> {
        if self.core.telegraf {
            let err = MetricError::config("service checks are not supported in Telegraf mode");
            return ServiceCheckBuilder::from_error(err, self);
        }

        ServiceCheckBuilder::new(ServiceCheckFormatter::new(&self.scope, name, status), self)
    }

    /// Send a caller formatted line. Only the client's tags are added.
    pub fn send(&self, data: &str) -> MetricResult<()> {
        self.send_with_tags(data).try_send()
    }

    pub fn send_with_tags<'a>(&'a self, data: &'a str) -> MetricBuilder<'a, 'a> {
        MetricBuilder::from_raw(RawFormatter::new(&self.scope, data, self.core.telegraf), self)
    }

    /// Start building a child client that shares this client's worker.
    pub fn child(&self) -> ChildClientBuilder<'_> {
        ChildClientBuilder::new(self)
    }

    /// Wrap `f` so that every call records its duration as a timing,
    /// including calls that panic.
    ///
    /// Functions of several arguments can be wrapped by taking a tuple.
    pub fn timer<F, A, R>(&self, f: F, key: &str, sample_rate: Option<f64>, tags: &[&str]) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        let client = self.clone();
        let key = key.to_owned();
        let rate = sample_rate.map_or(self.sample_rate, SampleRate::new);
        let tags: Vec<String> = tags.iter().map(|t| (*t).to_owned()).collect();

        move |arg| {
            let _guard = TimingGuard::new(client.clone(), key.clone(), rate, tags.clone());
            f(arg)
        }
    }

    /// Call `f` once and record how long it took, even if it panics.
    pub fn time_fn<F, R>(&self, key: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = TimingGuard::new(self.clone(), key.to_owned(), self.sample_rate, Vec::new());
        f()
    }

    /// Wrap a future so that its duration, from first poll to completion, is
    /// recorded as a timing. A future that is dropped before it completes
    /// still records the time it ran.
    pub fn async_timer<F>(&self, fut: F, key: &str) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let client = self.clone();
        let key = key.to_owned();

        async move {
            let rate = client.sample_rate;
            let _guard = TimingGuard::new(client, key, rate, Vec::new());
            fut.await
        }
    }

    /// Send anything buffered and wait for the write to finish.
    pub async fn flush(&self) -> MetricResult<()> {
        let (reply, done) = oneshot::channel();
        if self.core.tx.send(Cmd::Flush(reply)).await.is_err() {
            return Ok(());
        }

        done.await.unwrap_or(Ok(()))
    }

    /// Flush anything buffered, release the transport and stop the worker.
    ///
    /// Affects every clone and child of this client. Emitting afterwards
    /// fails. Calling `close` again is a no-op. A TCP reconnect in progress
    /// is abandoned rather than waited for.
    pub async fn close(&self) -> MetricResult<()> {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.core.closing.notify_one();

        let (reply, done) = oneshot::channel();
        if self.core.tx.send(Cmd::Close(reply)).await.is_err() {
            return Ok(());
        }

        done.await.unwrap_or(Ok(()))
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::Acquire)
    }

    /// Payloads recorded by a mocked client, oldest first. Always empty for
    /// clients that use the network.
    pub fn mock_buffer(&self) -> Vec<String> {
        self.core.mock.as_ref().map(MockBuffer::snapshot).unwrap_or_default()
    }

    /// Counts of bytes and payloads written or dropped by the transport.
    pub fn stats(&self) -> TransportStats {
        TransportStats::from(&self.core.stats)
    }
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdClient")
            .field("prefix", &self.scope.prefix)
            .field("suffix", &self.scope.suffix)
            .field("tags", &self.scope.tags)
            .field("sample_rate", &self.sample_rate)
            .field("telegraf", &self.core.telegraf)
            .field("mock", &self.core.mock.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Emits the time since it was created as a timing when dropped.
struct TimingGuard {
    client: StatsdClient,
    key: String,
    rate: SampleRate,
    tags: Vec<String>,
    start: Instant,
}

impl TimingGuard {
    fn new(client: StatsdClient, key: String, rate: SampleRate, tags: Vec<String>) -> Self {
        TimingGuard {
            client,
            key,
            rate,
            tags,
            start: Instant::now(),
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        self.client
            .timing_with_tags(&self.key, self.start.elapsed())
            .with_sample_rate(self.rate)
            .with_tags(&self.tags)
            .send();
    }
}

/// Builder for a client that adds to the prefix, suffix and tags of its
/// parent.
///
/// Additions accumulate from the root down: a child with prefix `b.` of a
/// client with prefix `a.` emits `a.b.<name>`. Tags are the parent's
/// followed by the child's.
#[must_use = "Did you forget to call .build()?"]
#[derive(Debug)]
pub struct ChildClientBuilder<'p> {
    parent: &'p StatsdClient,
    prefix: String,
    suffix: String,
    tags: Vec<String>,
    sample_rate: Option<SampleRate>,
}

impl<'p> ChildClientBuilder<'p> {
    fn new(parent: &'p StatsdClient) -> Self {
        ChildClientBuilder {
            parent,
            prefix: String::new(),
            suffix: String::new(),
            tags: Vec::new(),
            sample_rate: None,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix.push_str(prefix);
        self
    }

    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix.push_str(suffix);
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push(key_value_tag(key, value));
        self
    }

    pub fn with_tag_value(mut self, value: &str) -> Self {
        self.tags.push(value.to_owned());
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.tags.extend(tags.into_iter().map(|t| t.as_ref().to_owned()));
        self
    }

    /// Default sample rate of the child. Inherited from the parent if unset.
    pub fn with_sample_rate<R: Into<SampleRate>>(mut self, rate: R) -> Self {
        self.sample_rate = Some(rate.into());
        self
    }

    pub fn build(self) -> StatsdClient {
        let parent = &self.parent.scope;
        let mut tags = parent.tags.clone();
        tags.extend(self.tags);

        let scope = Scope {
            prefix: format!("{}{}", parent.prefix, self.prefix),
            suffix: format!("{}{}", parent.suffix, self.suffix),
            tags,
        };

        StatsdClient {
            scope: Arc::new(scope),
            sample_rate: self.sample_rate.unwrap_or(self.parent.sample_rate),
            core: self.parent.core.clone(),
        }
    }
}
