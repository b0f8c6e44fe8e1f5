// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use rand::Rng;
use std::time::Duration;

const MAX_EXPONENT: u32 = 31;

/// Exponential backoff used between TCP reconnect attempts.
///
/// The delay before attempt `n` (starting at zero) is `initial * 2^n`,
/// capped at `max_delay`. With `jitter` enabled the delay is drawn uniformly
/// from `[delay / 2, delay]` so that many clients losing the same agent don't
/// reconnect in lockstep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Consecutive failed attempts after which queued data is dropped.
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            initial: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            jitter: true,
            max_retries: Some(10),
        }
    }
}

impl Backoff {
    /// Delay before the given attempt, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(attempt.min(MAX_EXPONENT));
        self.initial.saturating_mul(multiplier).min(self.max_delay)
    }

    /// Delay before the given attempt, with jitter applied if enabled.
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }

        let half = delay / 2;
        rand::thread_rng().gen_range(half..=delay)
    }

    /// True once `failures` consecutive attempts means giving up.
    pub(crate) fn exhausted(&self, failures: u32) -> bool {
        self.max_retries.map_or(false, |max| failures >= max)
    }
}
