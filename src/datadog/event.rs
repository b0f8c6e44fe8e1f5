// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::{epoch_seconds, escape_newlines};
use crate::builder::{key_value_tag, push_datadog_tags};
use crate::client::StatsdClient;
use crate::types::{Callback, MetricError, MetricResult};
use std::borrow::Cow;
use std::fmt::{self, Write};
use std::time::SystemTime;

/// The priority of an event.
///
/// See [Datadog](https://docs.datadoghq.com/developers/dogstatsd/).
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum EventPriority {
    Low,
    Normal,
}

impl fmt::Display for EventPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EventPriority::Low => "low".fmt(f),
            EventPriority::Normal => "normal".fmt(f),
        }
    }
}

/// The alert type of an event.
///
/// See [Datadog](https://docs.datadoghq.com/developers/dogstatsd/).
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum EventAlertType {
    Info,
    Error,
    Warning,
    Success,
}

impl fmt::Display for EventAlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EventAlertType::Info => "info".fmt(f),
            EventAlertType::Error => "error".fmt(f),
            EventAlertType::Warning => "warning".fmt(f),
            EventAlertType::Success => "success".fmt(f),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EventFormatter<'a> {
    title: Cow<'a, str>,
    text: Option<Cow<'a, str>>,
    timestamp: Option<u64>,
    hostname: Option<&'a str>,
    aggregation_key: Option<&'a str>,
    priority: Option<EventPriority>,
    source_type: Option<&'a str>,
    alert_type: Option<EventAlertType>,
    scope_tags: &'a [String],
    tags: Vec<String>,
}

impl<'a> EventFormatter<'a> {
    pub(crate) fn new(title: &'a str, scope_tags: &'a [String]) -> Self {
        EventFormatter {
            title: escape_newlines(title),
            text: None,
            timestamp: None,
            hostname: None,
            aggregation_key: None,
            priority: None,
            source_type: None,
            alert_type: None,
            scope_tags,
            tags: Vec::new(),
        }
    }

    pub(crate) fn with_text(mut self, text: &'a str) -> Self {
        self.text = Some(escape_newlines(text));
        self
    }

    pub(crate) fn format(&self) -> String {
        let title: &str = &self.title;
        // An empty text counts as no text.
        let text: &str = self.text.as_deref().filter(|t| !t.is_empty()).unwrap_or(title);

        let mut out = String::with_capacity(title.len() + text.len() + 64);
        let _ = write!(out, "_e{{{},{}}}:{}|{}", title.len(), text.len(), title, text);

        if let Some(ts) = self.timestamp {
            let _ = write!(out, "|d:{}", ts);
        }
        if let Some(host) = self.hostname {
            let _ = write!(out, "|h:{}", host);
        }
        if let Some(key) = self.aggregation_key {
            let _ = write!(out, "|k:{}", key);
        }
        if let Some(priority) = self.priority {
            let _ = write!(out, "|p:{}", priority);
        }
        if let Some(source) = self.source_type {
            let _ = write!(out, "|s:{}", source);
        }
        if let Some(alert) = self.alert_type {
            let _ = write!(out, "|t:{}", alert);
        }

        let tags = self.scope_tags.iter().chain(self.tags.iter()).map(String::as_str);
        push_datadog_tags(&mut out, tags);
        out
    }
}

/// Builder for the optional parts of an event.
///
/// Events are never prefixed and never sampled. Newlines in the title and
/// text are escaped before their lengths are computed. If no text is set
/// the title is used for both.
#[must_use = "Did you forget to call .send() after building the event?"]
pub struct EventBuilder<'m, 'c> {
    repr: Result<EventFormatter<'m>, MetricError>,
    client: &'c StatsdClient,
    callback: Option<Callback>,
}

impl<'m, 'c> EventBuilder<'m, 'c> {
    pub(crate) fn new(formatter: EventFormatter<'m>, client: &'c StatsdClient) -> Self {
        EventBuilder {
            repr: Ok(formatter),
            client,
            callback: None,
        }
    }

    pub(crate) fn from_error(err: MetricError, client: &'c StatsdClient) -> Self {
        EventBuilder {
            repr: Err(err),
            client,
            callback: None,
        }
    }

    fn map<F>(mut self, f: F) -> Self
    where
        F: FnOnce(EventFormatter<'m>) -> EventFormatter<'m>,
    {
        self.repr = self.repr.map(f);
        self
    }

    pub fn with_text(self, text: &'m str) -> Self {
        self.map(|e| e.with_text(text))
    }

    /// Attach the time the event happened, sent as seconds since the epoch.
    pub fn with_date(self, date: SystemTime) -> Self {
        self.with_timestamp(epoch_seconds(date))
    }

    pub fn with_timestamp(self, secs: u64) -> Self {
        self.map(|mut e| {
            e.timestamp = Some(secs);
            e
        })
    }

    pub fn with_hostname(self, hostname: &'m str) -> Self {
        self.map(|mut e| {
            e.hostname = Some(hostname);
            e
        })
    }

    pub fn with_aggregation_key(self, key: &'m str) -> Self {
        self.map(|mut e| {
            e.aggregation_key = Some(key);
            e
        })
    }

    pub fn with_priority(self, priority: EventPriority) -> Self {
        self.map(|mut e| {
            e.priority = Some(priority);
            e
        })
    }

    pub fn with_source_type(self, source_type: &'m str) -> Self {
        self.map(|mut e| {
            e.source_type = Some(source_type);
            e
        })
    }

    pub fn with_alert_type(self, alert_type: EventAlertType) -> Self {
        self.map(|mut e| {
            e.alert_type = Some(alert_type);
            e
        })
    }

    pub fn with_tag(self, key: &str, value: &str) -> Self {
        let tag = key_value_tag(key, value);
        self.map(|mut e| {
            e.tags.push(tag);
            e
        })
    }

    pub fn with_tag_value(self, value: &str) -> Self {
        self.map(|mut e| {
            e.tags.push(value.to_owned());
            e
        })
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(MetricResult<usize>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Queue the event, returning any error including failure to hand it
    /// to the background worker. An event the client can't send at all
    /// (Telegraf mode) is also reported to the error handler.
    pub fn try_send(self) -> MetricResult<()> {
        let EventBuilder { repr, client, callback } = self;
        match repr {
            Ok(formatter) => client.dispatch(formatter.format(), callback),
            Err(err) => {
                client.consume_error(err.clone());
                if let Some(cb) = callback {
                    cb(Err(err.clone()));
                }
                Err(err)
            }
        }
    }

    /// Queue the event. Configuration errors are returned, anything else is
    /// passed to the client's error handler.
    pub fn send(self) -> MetricResult<()> {
        let client = self.client;
        let rejected = self.repr.is_err();
        match self.try_send() {
            Err(e) if !rejected => {
                client.consume_error(e);
                Ok(())
            }
            res => res,
        }
    }
}

impl<'m, 'c> fmt::Debug for EventBuilder<'m, 'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBuilder")
            .field("repr", &self.repr)
            .field("callback", &self.callback.as_ref().map(|_| "..."))
            .finish()
    }
}
