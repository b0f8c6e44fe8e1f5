// Tempo - An asynchronous DogStatsD client for Rust!
//
// Copyright 2026 The Tempo Developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use super::sample_rate::SampleRate;
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Source of uniformly distributed values in `[0, 1)` used to decide
/// whether a sampled metric is kept.
///
/// The default is [`ThreadRandom`]. Tests and deterministic environments can
/// plug in their own source with `StatsdClientBuilder::with_random_source`.
pub trait RandomSource: Send + Sync {
    /// Next value in `[0, 1)`.
    fn next_f64(&self) -> f64;
}

/// Random source backed by `rand::thread_rng`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Random source that always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

#[derive(Clone)]
pub(crate) struct Sampler {
    source: Arc<dyn RandomSource>,
}

impl Sampler {
    pub(crate) fn new(source: Arc<dyn RandomSource>) -> Self {
        Sampler { source }
    }

    /// Decide whether a metric emitted at `rate` is kept. The random source
    /// is only consulted for rates that actually sample.
    pub(crate) fn should_send(&self, rate: SampleRate) -> bool {
        if !rate.is_sampled() {
            return true;
        }

        self.source.next_f64() < rate.value()
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Sampler::new(Arc::new(ThreadRandom))
    }
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{FixedRandom, RandomSource, Sampler};
    use crate::builder::SampleRate;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::sync::{Arc, Mutex};

    struct SeededRandom(Mutex<ChaCha8Rng>);

    impl RandomSource for SeededRandom {
        fn next_f64(&self) -> f64 {
            self.0.lock().unwrap().gen::<f64>()
        }
    }

    #[test]
    fn test_sampler_fixed_value_below_rate() {
        let sampler = Sampler::new(Arc::new(FixedRandom(0.42)));

        assert!(sampler.should_send(SampleRate::new(0.5)));
        assert!(!sampler.should_send(SampleRate::new(0.4)));
    }

    #[test]
    fn test_sampler_rate_one_never_consults_source() {
        // a source outside [0, 1) would reject everything if it were used
        let sampler = Sampler::new(Arc::new(FixedRandom(5.0)));

        assert!(sampler.should_send(SampleRate::ALWAYS));
        assert!(sampler.should_send(SampleRate::new(f64::NAN)));
    }

    #[test]
    fn test_sampler_zero_rate_never_sends() {
        let sampler = Sampler::new(Arc::new(FixedRandom(0.0)));

        assert!(!sampler.should_send(SampleRate::new(0.0)));
        assert!(!sampler.should_send(SampleRate::new(-1.0)));
    }

    #[test]
    fn test_sampler_seeded_rate_is_roughly_honored() {
        let source = SeededRandom(Mutex::new(ChaCha8Rng::seed_from_u64(42)));
        let sampler = Sampler::new(Arc::new(source));
        let rate = SampleRate::new(0.25);

        let kept = (0..10_000).filter(|_| sampler.should_send(rate)).count();

        assert!(kept > 2_000 && kept < 3_000, "kept {} of 10000", kept);
    }
}
