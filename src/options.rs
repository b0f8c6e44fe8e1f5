// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::transport::{AddressFamily, Backoff};
use crate::types::{ErrorKind, MetricError, MetricResult};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default port of a StatsD server, and of the Datadog agent.
pub const DEFAULT_PORT: u16 = 8125;

pub(crate) const DEFAULT_HOST: &str = "localhost";
pub(crate) const DEFAULT_QUEUE_CAPACITY: usize = 4096;
pub(crate) const DEFAULT_RETRY_QUEUE_SIZE: usize = 8192;
pub(crate) const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(1000);

const ENV_HOST: &str = "DD_AGENT_HOST";
const ENV_PORT: &str = "DD_DOGSTATSD_PORT";
const ENV_ENTITY_ID: &str = "DD_ENTITY_ID";
const ENTITY_ID_TAG: &str = "dd.internal.entity_id";

/// Network protocol used to reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    /// UDP from an IPv4 socket.
    #[default]
    Udp4,
    /// UDP from an IPv6 socket.
    Udp6,
    /// One persistent TCP connection.
    Tcp,
}

impl Protocol {
    pub(crate) fn family(self) -> AddressFamily {
        match self {
            Protocol::Udp4 => AddressFamily::Ipv4,
            Protocol::Udp6 => AddressFamily::Ipv6,
            Protocol::Tcp => AddressFamily::Any,
        }
    }
}

impl FromStr for Protocol {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" | "udp4" => Ok(Protocol::Udp4),
            "udp6" => Ok(Protocol::Udp6),
            "tcp" => Ok(Protocol::Tcp),
            _ => Err(MetricError::from((
                ErrorKind::InvalidInput,
                "protocol must be one of udp, udp4, udp6 or tcp",
            ))),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Protocol::Udp4 => "udp4".fmt(f),
            Protocol::Udp6 => "udp6".fmt(f),
            Protocol::Tcp => "tcp".fmt(f),
        }
    }
}

/// Everything needed to build a client.
///
/// `Default` picks up the Datadog agent environment: `DD_AGENT_HOST` and
/// `DD_DOGSTATSD_PORT` override the host and port, and `DD_ENTITY_ID` adds a
/// `dd.internal.entity_id` global tag.
///
/// ```
/// use std::time::Duration;
/// use tempo::{ClientOptions, Protocol};
///
/// let options = ClientOptions {
///     host: "metrics.example.com".to_string(),
///     protocol: Protocol::Tcp,
///     prefix: "my.app.".to_string(),
///     max_buffer_size: 1432,
///     buffer_flush_interval: Duration::from_millis(250),
///     ..ClientOptions::default()
/// };
/// assert_eq!(tempo::DEFAULT_PORT, options.port);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Prepended verbatim to every metric and service check name.
    pub prefix: String,
    /// Appended verbatim to every metric and service check name.
    pub suffix: String,
    /// Tags added to every metric, event and service check.
    pub global_tags: Vec<String>,
    /// Default sample rate, clamped into `[0, 1]`.
    pub sample_rate: f64,
    /// Largest payload in bytes. `0` sends every metric on its own.
    pub max_buffer_size: usize,
    /// How often a partially filled buffer is sent.
    pub buffer_flush_interval: Duration,
    /// Emit Telegraf style lines instead of DogStatsD.
    pub telegraf: bool,
    /// Record payloads in memory instead of sending them.
    pub mock: bool,
    /// Resolve the UDP destination once instead of before every send.
    pub cache_dns: bool,
    /// Lines that can be waiting for the background worker before emits
    /// start failing.
    pub queue_capacity: usize,
    /// Bytes of payloads kept while a TCP connection is re-established.
    /// Defaults to `max_buffer_size`, or 8192 bytes when unbuffered.
    pub max_queue_size: Option<usize>,
    /// TCP reconnect policy.
    pub reconnect: Backoff,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let host = env::var(ENV_HOST)
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = env::var(ENV_PORT)
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let mut global_tags = Vec::new();
        if let Ok(id) = env::var(ENV_ENTITY_ID) {
            if !id.is_empty() {
                global_tags.push(format!("{}:{}", ENTITY_ID_TAG, id));
            }
        }

        ClientOptions {
            host,
            port,
            protocol: Protocol::default(),
            prefix: String::new(),
            suffix: String::new(),
            global_tags,
            sample_rate: 1.0,
            max_buffer_size: 0,
            buffer_flush_interval: DEFAULT_FLUSH_INTERVAL,
            telegraf: false,
            mock: false,
            cache_dns: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_queue_size: None,
            reconnect: Backoff::default(),
        }
    }
}

impl ClientOptions {
    /// Default options pointing at the given server.
    pub fn new(host: &str, port: u16) -> Self {
        ClientOptions {
            host: host.to_string(),
            port,
            ..ClientOptions::default()
        }
    }

    /// Default options for a client that records payloads in memory.
    pub fn mock() -> Self {
        ClientOptions {
            mock: true,
            ..ClientOptions::default()
        }
    }

    pub(crate) fn retry_queue_size(&self) -> usize {
        match self.max_queue_size {
            Some(size) => size,
            None if self.max_buffer_size > 0 => self.max_buffer_size,
            None => DEFAULT_RETRY_QUEUE_SIZE,
        }
    }

    /// Check for settings that can never work.
    pub fn validate(&self) -> MetricResult<()> {
        if self.mock {
            return self.validate_queue();
        }

        if self.host.is_empty() {
            return Err(MetricError::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(MetricError::config("port must not be zero"));
        }

        self.validate_queue()
    }

    fn validate_queue(&self) -> MetricResult<()> {
        if self.queue_capacity == 0 {
            return Err(MetricError::config("queue capacity must be greater than zero"));
        }
        Ok(())
    }
}
