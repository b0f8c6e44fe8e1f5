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
use crate::client::{Scope, StatsdClient};
use crate::types::{Callback, MetricError, MetricResult};
use std::borrow::Cow;
use std::fmt::{self, Write};
use std::time::SystemTime;

/// Status reported by a service check.
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum CheckStatus {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (*self as u8).fmt(f)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServiceCheckFormatter<'a> {
    scope: &'a Scope,
    name: &'a str,
    status: CheckStatus,
    timestamp: Option<u64>,
    hostname: Option<&'a str>,
    message: Option<Cow<'a, str>>,
    tags: Vec<String>,
}

impl<'a> ServiceCheckFormatter<'a> {
    pub(crate) fn new(scope: &'a Scope, name: &'a str, status: CheckStatus) -> Self {
        ServiceCheckFormatter {
            scope,
            name,
            status,
            timestamp: None,
            hostname: None,
            message: None,
            tags: Vec::new(),
        }
    }

    pub(crate) fn format(&self) -> String {
        let mut out = String::with_capacity(self.scope.prefix.len() + self.name.len() + 64);
        let _ = write!(
            out,
            "_sc|{}{}{}|{}",
            self.scope.prefix, self.name, self.scope.suffix, self.status
        );

        if let Some(ts) = self.timestamp {
            let _ = write!(out, "|d:{}", ts);
        }
        if let Some(host) = self.hostname {
            let _ = write!(out, "|h:{}", host);
        }
        if let Some(ref message) = self.message {
            let _ = write!(out, "|m:{}", message);
        }

        let tags = self.scope.tags.iter().chain(self.tags.iter()).map(String::as_str);
        push_datadog_tags(&mut out, tags);
        out
    }
}

/// Builder for the optional parts of a service check.
#[must_use = "Did you forget to call .send() after building the service check?"]
pub struct ServiceCheckBuilder<'m, 'c> {
    repr: Result<ServiceCheckFormatter<'m>, MetricError>,
    client: &'c StatsdClient,
    callback: Option<Callback>,
}

impl<'m, 'c> ServiceCheckBuilder<'m, 'c> {
    pub(crate) fn new(formatter: ServiceCheckFormatter<'m>, client: &'c StatsdClient) -> Self {
        ServiceCheckBuilder {
            repr: Ok(formatter),
            client,
            callback: None,
        }
    }

    pub(crate) fn from_error(err: MetricError, client: &'c StatsdClient) -> Self {
        ServiceCheckBuilder {
            repr: Err(err),
            client,
            callback: None,
        }
    }

    pub fn with_date(self, date: SystemTime) -> Self {
        self.with_timestamp(epoch_seconds(date))
    }

    pub fn with_timestamp(mut self, secs: u64) -> Self {
        if let Ok(ref mut c) = self.repr {
            c.timestamp = Some(secs);
        }
        self
    }

    pub fn with_hostname(mut self, hostname: &'m str) -> Self {
        if let Ok(ref mut c) = self.repr {
            c.hostname = Some(hostname);
        }
        self
    }

    /// Human readable description of the status. Newlines are escaped.
    pub fn with_message(mut self, message: &'m str) -> Self {
        if let Ok(ref mut c) = self.repr {
            c.message = Some(escape_newlines(message));
        }
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        if let Ok(ref mut c) = self.repr {
            c.tags.push(key_value_tag(key, value));
        }
        self
    }

    pub fn with_tag_value(mut self, value: &str) -> Self {
        if let Ok(ref mut c) = self.repr {
            c.tags.push(value.to_owned());
        }
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(MetricResult<usize>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn try_send(self) -> MetricResult<()> {
        let ServiceCheckBuilder { repr, client, callback } = self;
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

    /// Queue the check. Configuration errors are returned, anything else is
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

impl<'m, 'c> fmt::Debug for ServiceCheckBuilder<'m, 'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCheckBuilder")
            .field("repr", &self.repr)
            .field("callback", &self.callback.as_ref().map(|_| "..."))
            .finish()
    }
}
