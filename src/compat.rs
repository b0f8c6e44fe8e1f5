// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Support for the older positional way of configuring a client.
//!
//! Before [`ClientOptions`] existed, clients were configured with a list of
//! positional arguments in this order:
//!
//! | # | option                | kind               |
//! |---|-----------------------|--------------------|
//! | 0 | host                  | string             |
//! | 1 | port                  | integer or string  |
//! | 2 | prefix                | string             |
//! | 3 | suffix                | string             |
//! | 4 | globalize             | bool (ignored)     |
//! | 5 | cache DNS             | bool               |
//! | 6 | mock                  | bool               |
//! | 7 | global tags           | list of strings    |
//! | 8 | max buffer size       | integer            |
//! | 9 | buffer flush interval | integer (ms)       |
//! | 10| telegraf              | bool               |
//! | 11| sample rate           | number             |
//! | 12| protocol              | string             |
//!
//! Trailing arguments can be left off and [`LegacyArg::Absent`] keeps the
//! default for a position.

use crate::options::ClientOptions;
use crate::types::{MetricError, MetricResult};
use std::time::Duration;

/// A single positional argument.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyArg {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
    Absent,
}

impl LegacyArg {
    fn kind(&self) -> &'static str {
        match *self {
            LegacyArg::Str(_) => "string",
            LegacyArg::Int(_) => "integer",
            LegacyArg::Float(_) => "float",
            LegacyArg::Bool(_) => "bool",
            LegacyArg::List(_) => "list",
            LegacyArg::Absent => "absent",
        }
    }
}

impl From<&str> for LegacyArg {
    fn from(v: &str) -> Self {
        LegacyArg::Str(v.to_string())
    }
}

impl From<String> for LegacyArg {
    fn from(v: String) -> Self {
        LegacyArg::Str(v)
    }
}

impl From<i64> for LegacyArg {
    fn from(v: i64) -> Self {
        LegacyArg::Int(v)
    }
}

impl From<f64> for LegacyArg {
    fn from(v: f64) -> Self {
        LegacyArg::Float(v)
    }
}

impl From<bool> for LegacyArg {
    fn from(v: bool) -> Self {
        LegacyArg::Bool(v)
    }
}

impl From<Vec<String>> for LegacyArg {
    fn from(v: Vec<String>) -> Self {
        LegacyArg::List(v)
    }
}

impl<T> From<Option<T>> for LegacyArg
where
    T: Into<LegacyArg>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(LegacyArg::Absent, Into::into)
    }
}

const POSITIONS: [&str; 13] = [
    "host",
    "port",
    "prefix",
    "suffix",
    "globalize",
    "cacheDns",
    "mock",
    "globalTags",
    "maxBufferSize",
    "bufferFlushInterval",
    "telegraf",
    "sampleRate",
    "protocol",
];

fn mismatch(position: usize, expected: &str, got: &LegacyArg) -> MetricError {
    MetricError::invalid_input(format!(
        "argument {} ({}) must be {}, got {}",
        position,
        POSITIONS[position],
        expected,
        got.kind()
    ))
}

fn string(position: usize, arg: &LegacyArg) -> MetricResult<String> {
    match *arg {
        LegacyArg::Str(ref s) => Ok(s.clone()),
        ref other => Err(mismatch(position, "a string", other)),
    }
}

fn boolean(position: usize, arg: &LegacyArg) -> MetricResult<bool> {
    match *arg {
        LegacyArg::Bool(b) => Ok(b),
        ref other => Err(mismatch(position, "a bool", other)),
    }
}

fn unsigned(position: usize, arg: &LegacyArg) -> MetricResult<u64> {
    match *arg {
        LegacyArg::Int(i) if i >= 0 => Ok(i as u64),
        LegacyArg::Str(ref s) => s
            .trim()
            .parse()
            .map_err(|_| mismatch(position, "a non-negative integer", arg)),
        ref other => Err(mismatch(position, "a non-negative integer", other)),
    }
}

impl ClientOptions {
    /// Build options from positional arguments, starting from the defaults.
    ///
    /// Returns an `InvalidInput` error when an argument has the wrong type or
    /// there are more arguments than positions.
    ///
    /// ```
    /// use tempo::compat::LegacyArg;
    /// use tempo::{ClientOptions, Protocol};
    ///
    /// let options = ClientOptions::from_positional(&[
    ///     "metrics.local".into(),
    ///     8126i64.into(),
    ///     "app.".into(),
    ///     LegacyArg::Absent,
    ///     false.into(),
    ///     true.into(),
    /// ])
    /// .unwrap();
    ///
    /// assert_eq!("metrics.local", options.host);
    /// assert_eq!(8126, options.port);
    /// assert!(options.cache_dns);
    /// assert_eq!(Protocol::Udp4, options.protocol);
    /// ```
    pub fn from_positional(args: &[LegacyArg]) -> MetricResult<Self> {
        if args.len() > POSITIONS.len() {
            return Err(MetricError::invalid_input(format!(
                "expected at most {} positional arguments, got {}",
                POSITIONS.len(),
                args.len()
            )));
        }

        let mut options = ClientOptions::default();

        for (position, arg) in args.iter().enumerate() {
            if *arg == LegacyArg::Absent {
                continue;
            }

            match position {
                0 => options.host = string(position, arg)?,
                1 => {
                    let port = unsigned(position, arg)?;
                    options.port = u16::try_from(port)
                        .map_err(|_| mismatch(position, "a valid port", arg))?;
                }
                2 => options.prefix = string(position, arg)?,
                3 => options.suffix = string(position, arg)?,
                4 => {
                    boolean(position, arg)?;
                }
                5 => options.cache_dns = boolean(position, arg)?,
                6 => options.mock = boolean(position, arg)?,
                7 => match *arg {
                    LegacyArg::List(ref tags) => options.global_tags.extend(tags.iter().cloned()),
                    ref other => return Err(mismatch(position, "a list", other)),
                },
                8 => options.max_buffer_size = unsigned(position, arg)? as usize,
                9 => options.buffer_flush_interval = Duration::from_millis(unsigned(position, arg)?),
                10 => options.telegraf = boolean(position, arg)?,
                11 => {
                    options.sample_rate = match *arg {
                        LegacyArg::Float(f) => f,
                        LegacyArg::Int(i) => i as f64,
                        ref other => return Err(mismatch(position, "a number", other)),
                    }
                }
                _ => options.protocol = string(position, arg)?.parse()?,
            }
        }

        Ok(options)
    }
}
