// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! DogStatsD extensions: events and service checks.
//!
//! [DogStatsD](https://docs.datadoghq.com/developers/dogstatsd/) adds two
//! message types to the StatsD line protocol that aren't metrics at all:
//! events, which show up in the Datadog event stream, and service checks,
//! which report the status of a service.
//!
//! Neither has a Telegraf representation. Creating either on a client
//! configured for Telegraf output returns a configuration error from
//! `send()` (and reports it to the error handler, if there is one).
//!
//! ``` rust,no_run
//! use tempo::{ClientOptions, StatsdClient};
//! use tempo::datadog::{CheckStatus, EventAlertType};
//!
//! # async fn run() -> tempo::MetricResult<()> {
//! let client = StatsdClient::from_options(ClientOptions::default())?;
//!
//! client
//!     .event_with_options("deploy finished")
//!     .with_text("api v1.2.3 is live")
//!     .with_alert_type(EventAlertType::Success)
//!     .with_tag_value("team:api")
//!     .send()?;
//!
//! client
//!     .check_with_options("api.health", CheckStatus::Warning)
//!     .with_message("p99 latency above 2s")
//!     .send()?;
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

mod check;
mod event;

pub use self::check::{CheckStatus, ServiceCheckBuilder};
pub use self::event::{EventAlertType, EventBuilder, EventPriority};

pub(crate) use self::check::ServiceCheckFormatter;
pub(crate) use self::event::EventFormatter;

/// Replace literal newlines with the two character sequence `\n`, which is
/// how DogStatsD expects multi-line text to arrive.
pub(crate) fn escape_newlines(s: &str) -> Cow<'_, str> {
    if s.contains('\n') {
        Cow::Owned(s.replace('\n', "\\n"))
    } else {
        Cow::Borrowed(s)
    }
}

/// Seconds since the UNIX epoch, rounded to the nearest second. Times before
/// the epoch are clamped to zero.
pub(crate) fn epoch_seconds(time: SystemTime) -> u64 {
    let millis = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);

    ((millis + 500) / 1000) as u64
}
