// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt::{self, Write};

/// Fraction of emitted metrics that are actually sent to the server.
///
/// > A float between 0 and 1, inclusive. The default is 1, which samples
/// > 100% of the time.
/// > - via [DataDog](https://docs.datadoghq.com/developers/dogstatsd/datagram_shell)
///
/// Values outside of that range are clamped rather than rejected: anything
/// greater than or equal to `1` (and `NaN`) means "always send" and renders
/// no `|@rate` suffix, anything less than or equal to `0` means "never send".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRate {
    value: f64,
}

impl SampleRate {
    /// Sample rate that keeps every metric.
    pub const ALWAYS: SampleRate = SampleRate { value: 1.0 };

    /// Create a new sample rate, clamping the value into `[0, 1]`.
    pub fn new(value: f64) -> Self {
        let value = if value.is_nan() || value >= 1.0 {
            1.0
        } else if value <= 0.0 {
            0.0
        } else {
            value
        };

        SampleRate { value }
    }

    /// The clamped rate as a float.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// True if this rate drops some metrics and so must be rendered on the
    /// wire for the server to scale counts back up.
    pub fn is_sampled(&self) -> bool {
        self.value < 1.0
    }

    pub(crate) fn write_suffix(&self, out: &mut String) {
        if self.is_sampled() {
            // f64 Display is the shortest representation that round trips
            let _ = write!(out, "|@{}", self.value);
        }
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        SampleRate::ALWAYS
    }
}

impl From<f64> for SampleRate {
    fn from(value: f64) -> Self {
        SampleRate::new(value)
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::SampleRate;

    fn suffix(rate: f64) -> String {
        let mut out = String::new();
        SampleRate::new(rate).write_suffix(&mut out);
        out
    }

    #[test]
    fn test_sample_rate_shortest_decimal() {
        assert_eq!("|@0.5", suffix(0.5));
        assert_eq!("|@0.1", suffix(0.1));
        assert_eq!("|@0.125", suffix(0.125));
    }

    #[test]
    fn test_sample_rate_one_or_more_has_no_suffix() {
        assert_eq!("", suffix(1.0));
        assert_eq!("", suffix(7.0));
        assert_eq!("", suffix(f64::NAN));
    }

    #[test]
    fn test_sample_rate_clamps_negative_to_zero() {
        let rate = SampleRate::new(-2.0);

        assert_eq!(0.0, rate.value());
        assert!(rate.is_sampled());
    }

    #[test]
    fn test_sample_rate_default_always() {
        assert_eq!(SampleRate::ALWAYS, SampleRate::default());
        assert!(!SampleRate::default().is_sampled());
    }
}
