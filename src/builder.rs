// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::client::{Scope, StatsdClient};
use crate::types::{Callback, MetricResult};
use std::borrow::Cow;
use std::fmt::{self, Write};
use std::time::Duration;

mod sample_rate;
mod sampler;

pub use self::sample_rate::SampleRate;
pub use self::sampler::{FixedRandom, RandomSource, ThreadRandom};
pub(crate) use self::sampler::Sampler;

/// Value of a single metric, as it will be rendered on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    /// Explicitly signed value, rendered with a leading `+` or `-` so that
    /// the server treats a gauge as a relative change.
    Delta(i64),
    Text(String),
}

impl MetricValue {
    /// Text value from anything that can be displayed.
    pub fn text<T: fmt::Display>(value: T) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricValue::Signed(v) => v.fmt(f),
            MetricValue::Unsigned(v) => v.fmt(f),
            MetricValue::Float(v) => v.fmt(f),
            MetricValue::Delta(v) => write!(f, "{:+}", v),
            MetricValue::Text(ref v) => v.fmt(f),
        }
    }
}

macro_rules! metric_value_from {
    ($variant:ident, $target:ty, $($source:ty),+) => {
        $(
            impl From<$source> for MetricValue {
                fn from(v: $source) -> Self {
                    MetricValue::$variant(<$target>::from(v))
                }
            }
        )+
    };
}

metric_value_from!(Signed, i64, i64, i32, i16, i8);
metric_value_from!(Unsigned, u64, u64, u32, u16, u8);
metric_value_from!(Float, f64, f64, f32);
metric_value_from!(Text, String, String, &str);

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Unsigned(v as u64)
    }
}

/// Durations are rendered as fractional milliseconds.
impl From<Duration> for MetricValue {
    fn from(d: Duration) -> Self {
        MetricValue::Float(d.as_nanos() as f64 / 1_000_000.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetricType {
    Counter,
    Gauge,
    Timer,
    Histogram,
    Distribution,
    Set,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MetricType::Counter => "c".fmt(f),
            MetricType::Gauge => "g".fmt(f),
            MetricType::Timer => "ms".fmt(f),
            MetricType::Histogram => "h".fmt(f),
            MetricType::Distribution => "d".fmt(f),
            MetricType::Set => "s".fmt(f),
        }
    }
}

fn is_reserved(c: char) -> bool {
    matches!(c, '|' | ',' | '#' | '\n')
}

fn sanitize(s: &str) -> Cow<'_, str> {
    if s.contains(is_reserved) {
        Cow::Owned(s.replace(is_reserved, "_"))
    } else {
        Cow::Borrowed(s)
    }
}

/// Render a `key:value` tag, replacing characters that would break the
/// line protocol with `_`.
pub(crate) fn key_value_tag(key: &str, value: &str) -> String {
    let key = sanitize(key);
    let value = sanitize(value);
    let mut tag = String::with_capacity(key.len() + value.len() + 1);
    tag.push_str(&key);
    tag.push(':');
    tag.push_str(&value);
    tag
}

/// Append `|#tag1,tag2` to a line, or nothing if there are no tags.
pub(crate) fn push_datadog_tags<'t, I>(out: &mut String, tags: I)
where
    I: IntoIterator<Item = &'t str>,
{
    for (i, tag) in tags.into_iter().enumerate() {
        out.push_str(if i == 0 { "|#" } else { "," });
        out.push_str(tag);
    }
}

/// Append `,k=v,...` to a metric name for Telegraf.
fn push_telegraf_tags<'t, I>(out: &mut String, tags: I)
where
    I: IntoIterator<Item = &'t str>,
{
    for tag in tags {
        out.push(',');
        out.extend(tag.chars().map(|c| if c == ':' { '=' } else { c }));
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MetricFormatter<'a> {
    scope: &'a Scope,
    key: &'a str,
    val: MetricValue,
    type_: MetricType,
    tags: Vec<String>,
    rate: SampleRate,
    telegraf: bool,
}

impl<'a> MetricFormatter<'a> {
    pub(crate) fn new(scope: &'a Scope, key: &'a str, val: MetricValue, type_: MetricType) -> Self {
        MetricFormatter {
            scope,
            key,
            val,
            type_,
            tags: Vec::new(),
            rate: SampleRate::ALWAYS,
            telegraf: false,
        }
    }

    pub(crate) fn with_telegraf(mut self, telegraf: bool) -> Self {
        self.telegraf = telegraf;
        self
    }

    pub(crate) fn with_sample_rate(mut self, rate: SampleRate) -> Self {
        self.rate = rate;
        self
    }

    fn all_tags(&self) -> impl Iterator<Item = &str> {
        self.scope.tags.iter().chain(self.tags.iter()).map(String::as_str)
    }

    fn size_hint(&self) -> usize {
        // the value, type and rate rarely need more than this
        let base = self.scope.prefix.len() + self.key.len() + self.scope.suffix.len() + 32;
        base + self.all_tags().map(|t| t.len() + 1).sum::<usize>() + 2
    }

    pub(crate) fn format(&self) -> String {
        let mut out = String::with_capacity(self.size_hint());
        out.push_str(&self.scope.prefix);
        out.push_str(self.key);
        out.push_str(&self.scope.suffix);

        if self.telegraf {
            push_telegraf_tags(&mut out, self.all_tags());
        }

        let _ = write!(out, ":{}|{}", self.val, self.type_);
        self.rate.write_suffix(&mut out);

        if !self.telegraf {
            push_datadog_tags(&mut out, self.all_tags());
        }

        out
    }
}

/// Formatter for caller supplied lines sent through `StatsdClient::send`.
/// Only tags are appended; the data itself is not validated.
#[derive(Debug, Clone)]
pub(crate) struct RawFormatter<'a> {
    scope: &'a Scope,
    data: &'a str,
    tags: Vec<String>,
    telegraf: bool,
}

impl<'a> RawFormatter<'a> {
    pub(crate) fn new(scope: &'a Scope, data: &'a str, telegraf: bool) -> Self {
        RawFormatter {
            scope,
            data,
            tags: Vec::new(),
            telegraf,
        }
    }

    pub(crate) fn format(&self) -> String {
        let tags = self.scope.tags.iter().chain(self.tags.iter()).map(String::as_str);
        let mut out = String::with_capacity(self.data.len() + 16);

        if self.telegraf {
            let split = self.data.find(':').unwrap_or(self.data.len());
            out.push_str(&self.data[..split]);
            push_telegraf_tags(&mut out, tags);
            out.push_str(&self.data[split..]);
        } else {
            out.push_str(self.data);
            push_datadog_tags(&mut out, tags);
        }

        out
    }
}

#[derive(Debug, Clone)]
enum Pending<'a> {
    Metric(MetricFormatter<'a>),
    Raw(RawFormatter<'a>),
}

impl<'a> Pending<'a> {
    fn tags_mut(&mut self) -> &mut Vec<String> {
        match *self {
            Pending::Metric(ref mut f) => &mut f.tags,
            Pending::Raw(ref mut f) => &mut f.tags,
        }
    }

    fn rate(&self) -> SampleRate {
        match *self {
            Pending::Metric(ref f) => f.rate,
            Pending::Raw(_) => SampleRate::ALWAYS,
        }
    }

    fn format(&self) -> String {
        match *self {
            Pending::Metric(ref f) => f.format(),
            Pending::Raw(ref f) => f.format(),
        }
    }
}

/// Builder for adding tags, a sample rate, or a completion callback to a
/// metric before it is sent.
///
/// Created by the `*_with_tags` methods of `StatsdClient`. Tags are rendered
/// after any tags inherited from the client, in the order they are added.
///
/// # Example
///
/// ```no_run
/// use tempo::{ClientOptions, StatsdClient};
///
/// # async fn run() -> tempo::MetricResult<()> {
/// let client = StatsdClient::from_options(ClientOptions::default())?;
/// client
///     .count_with_tags("requests", 1)
///     .with_tag("route", "/login")
///     .with_tag_value("canary")
///     .with_sample_rate(0.5)
///     .send();
/// # Ok(())
/// # }
/// ```
#[must_use = "Did you forget to call .send() after adding tags?"]
pub struct MetricBuilder<'m, 'c> {
    pending: Pending<'m>,
    client: &'c StatsdClient,
    callback: Option<Callback>,
}

impl<'m, 'c> MetricBuilder<'m, 'c> {
    pub(crate) fn from_fmt(formatter: MetricFormatter<'m>, client: &'c StatsdClient) -> Self {
        MetricBuilder {
            pending: Pending::Metric(formatter),
            client,
            callback: None,
        }
    }

    pub(crate) fn from_raw(formatter: RawFormatter<'m>, client: &'c StatsdClient) -> Self {
        MetricBuilder {
            pending: Pending::Raw(formatter),
            client,
            callback: None,
        }
    }

    /// Add a `key:value` tag. `|`, `,`, `#` and newlines in either part are
    /// replaced with `_`.
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.pending.tags_mut().push(key_value_tag(key, value));
        self
    }

    /// Add a tag consisting only of a value, emitted verbatim.
    pub fn with_tag_value(mut self, value: &str) -> Self {
        self.pending.tags_mut().push(value.to_owned());
        self
    }

    /// Add several value-only tags, e.g. `["env:prod", "canary"]`.
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        self.pending
            .tags_mut()
            .extend(tags.into_iter().map(|t| t.as_ref().to_owned()));
        self
    }

    /// Override the client's default sample rate for this metric. Raw lines
    /// are never sampled.
    pub fn with_sample_rate<R: Into<SampleRate>>(mut self, rate: R) -> Self {
        if let Pending::Metric(ref mut f) = self.pending {
            f.rate = rate.into();
        }
        self
    }

    /// Run `callback` once the payload containing this metric has been
    /// written, or has failed to be written.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(MetricResult<usize>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Queue the metric, returning an error if it couldn't be handed to the
    /// background worker (the queue is full or the client is closed).
    ///
    /// Network failures happen later and are never returned here. They go
    /// to the callback and error handler instead.
    pub fn try_send(self) -> MetricResult<()> {
        let MetricBuilder {
            pending,
            client,
            callback,
        } = self;

        if !client.should_send(pending.rate()) {
            if let Some(cb) = callback {
                cb(Ok(0));
            }
            return Ok(());
        }

        client.dispatch(pending.format(), callback)
    }

    /// Queue the metric, passing any error to the client's error handler.
    pub fn send(self) {
        let client = self.client;
        if let Err(e) = self.try_send() {
            client.consume_error(e);
        }
    }
}

impl<'m, 'c> fmt::Debug for MetricBuilder<'m, 'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricBuilder")
            .field("pending", &self.pending)
            .field("callback", &self.callback.as_ref().map(|_| "..."))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{key_value_tag, push_datadog_tags, MetricFormatter, MetricType, MetricValue, RawFormatter};
    use crate::builder::SampleRate;
    use crate::client::Scope;
    use std::time::Duration;

    fn scope(prefix: &str, suffix: &str, tags: &[&str]) -> Scope {
        Scope::new(prefix, suffix, tags.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_push_datadog_tags() {
        let mut m = "some.counter:1|c".to_string();
        push_datadog_tags(&mut m, vec!["host:app01.example.com", "bucket:A", "file-server"]);

        assert_eq!("some.counter:1|c|#host:app01.example.com,bucket:A,file-server", m);
    }

    #[test]
    fn test_push_datadog_tags_empty() {
        let mut m = "some.counter:1|c".to_string();
        push_datadog_tags(&mut m, Vec::new());

        assert_eq!("some.counter:1|c", m);
    }

    #[test]
    fn test_key_value_tag_sanitizes_reserved() {
        assert_eq!("a_b:c_d_e_f", key_value_tag("a|b", "c,d#e\nf"));
        assert_eq!("env:prod", key_value_tag("env", "prod"));
    }

    #[test]
    fn test_format_plain_metric_types() {
        let s = scope("", "", &[]);
        let cases = vec![
            (MetricType::Counter, MetricValue::Signed(3), "test:3|c"),
            (MetricType::Gauge, MetricValue::Unsigned(7), "test:7|g"),
            (MetricType::Timer, MetricValue::Float(0.123), "test:0.123|ms"),
            (MetricType::Histogram, MetricValue::Signed(42), "test:42|h"),
            (MetricType::Distribution, MetricValue::Float(1.5), "test:1.5|d"),
            (MetricType::Set, MetricValue::Text("user-1".into()), "test:user-1|s"),
        ];

        for (type_, val, expected) in cases {
            assert_eq!(expected, MetricFormatter::new(&s, "test", val, type_).format());
        }
    }

    #[test]
    fn test_format_prefix_suffix_rate_and_tags() {
        let s = scope("prefix.", ".suffix", &["global"]);
        let mut f = MetricFormatter::new(&s, "test", MetricValue::Signed(1), MetricType::Counter)
            .with_sample_rate(SampleRate::new(0.5));
        f.tags.push("foo:bar".to_string());

        assert_eq!("prefix.test.suffix:1|c|@0.5|#global,foo:bar", f.format());
    }

    #[test]
    fn test_format_telegraf_tags_follow_name() {
        let s = scope("", "", &["gtag:1"]);
        let mut f = MetricFormatter::new(&s, "test", MetricValue::Signed(1), MetricType::Counter)
            .with_telegraf(true)
            .with_sample_rate(SampleRate::new(0.5));
        f.tags.push("foo:bar".to_string());

        assert_eq!("test,gtag=1,foo=bar:1|c|@0.5", f.format());
    }

    #[test]
    fn test_format_gauge_delta_is_signed() {
        let s = scope("", "", &[]);

        let up = MetricFormatter::new(&s, "g", MetricValue::Delta(5), MetricType::Gauge);
        let down = MetricFormatter::new(&s, "g", MetricValue::Delta(-3), MetricType::Gauge);

        assert_eq!("g:+5|g", up.format());
        assert_eq!("g:-3|g", down.format());
    }

    #[test]
    fn test_duration_renders_fractional_millis() {
        assert_eq!(MetricValue::Float(1.5), MetricValue::from(Duration::from_micros(1500)));
    }

    #[test]
    fn test_raw_format_appends_tags() {
        let s = scope("ignored.", "", &["a:b"]);
        let mut f = RawFormatter::new(&s, "custom:1|c", false);
        f.tags.push("c".to_string());

        assert_eq!("custom:1|c|#a:b,c", f.format());
    }

    #[test]
    fn test_raw_format_telegraf_inserts_before_value() {
        let s = scope("", "", &["a:b"]);
        let f = RawFormatter::new(&s, "custom:1|c", true);

        assert_eq!("custom,a=b:1|c", f.format());
    }
}
