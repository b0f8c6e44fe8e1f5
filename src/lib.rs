// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! An asynchronous DogStatsD client for Rust!
//!
//! Tempo emits StatsD metrics plus the Datadog extensions (tags, events and
//! service checks) from applications running on the Tokio runtime.
//!
//! ## Features
//!
//! * Counters, gauges, timers, histograms, distributions and sets, with
//!   per-metric tags and sample rates.
//! * Datadog events and service checks.
//! * Buffering of many lines into a single payload, flushed when full or
//!   on an interval.
//! * UDP over IPv4 or IPv6, or a persistent TCP connection that reconnects
//!   with exponential backoff and replays what it couldn't send.
//! * Child clients that add to the prefix, suffix and tags of their parent.
//! * A mock mode that records payloads in memory for tests.
//! * Optional Telegraf style tags.
//!
//! ## Usage
//!
//! Emitting never blocks. Lines are formatted on the calling task and handed
//! to a background worker spawned on the current Tokio runtime, so clients
//! must be built from within one.
//!
//! ```rust,no_run
//! use tempo::{ClientOptions, StatsdClient};
//! use tempo::datadog::CheckStatus;
//!
//! # async fn run() -> tempo::MetricResult<()> {
//! let client = StatsdClient::builder(ClientOptions::new("127.0.0.1", tempo::DEFAULT_PORT))
//!     .with_error_handler(|err| eprintln!("metric error: {}", err))
//!     .with_tag("service", "checkout")
//!     .build()?;
//!
//! client.increment("orders.placed")?;
//! client.gauge("cart.size", 3)?;
//! client.histogram_with_tags("order.total", 42.5)
//!     .with_tag("currency", "EUR")
//!     .send();
//! client.check("checkout.ready", CheckStatus::Ok)?;
//!
//! // Send whatever is buffered and stop the background worker.
//! client.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! The `Result` returned when emitting only covers handing the line to the
//! worker and configuration mistakes such as sending an event in Telegraf
//! mode. Failures that happen later, on the network, go to the error handler
//! set with `StatsdClientBuilder::with_error_handler` and to any callback
//! attached with `with_callback`. Without a handler they are logged with the
//! `log` crate at debug level.
//!
//! ## Testing
//!
//! A client built with `ClientOptions::mock()` never touches the network and
//! records every payload it would have sent:
//!
//! ```rust
//! use tempo::{ClientOptions, StatsdClient};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tempo::MetricResult<()> {
//! let client = StatsdClient::from_options(ClientOptions::mock())?;
//! client.count("some.counter", 1)?;
//! client.flush().await?;
//!
//! assert_eq!(vec!["some.counter:1|c"], client.mock_buffer());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod batch;
mod builder;
mod client;
pub mod compat;
pub mod datadog;
mod options;
pub mod transport;
mod types;
mod worker;

pub use self::builder::{FixedRandom, MetricBuilder, MetricValue, RandomSource, SampleRate, ThreadRandom};
pub use self::client::{ChildClientBuilder, StatsdClient, StatsdClientBuilder};
pub use self::compat::LegacyArg;
pub use self::options::{ClientOptions, Protocol, DEFAULT_PORT};
pub use self::transport::{Backoff, TransportStats};
pub use self::types::{Callback, ErrorKind, MetricError, MetricResult};
