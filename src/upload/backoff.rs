// src/upload/backoff.rs

//! Exponential backoff for the polling loops
//!
//! Delay grows geometrically from an initial value up to a cap, with a
//! uniform random jitter of up to a configurable fraction of the current
//! base added on top so many clients polling the same service do not fall
//! into lockstep. The random source is injected so tests are reproducible.

use rand::Rng;
use std::time::Duration;

/// Backoff tuning knobs. Shared by the storage-URI and commit poll loops.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// First delay
    pub initial: Duration,
    /// Growth factor per attempt
    pub factor: f64,
    /// Upper bound for the base delay
    pub max: Duration,
    /// Jitter as a fraction of the current base delay (0.0 disables)
    pub jitter_fraction: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            factor: 1.5,
            max: Duration::from_secs(30),
            jitter_fraction: 0.5,
        }
    }
}

/// Stateful delay sequence for one poll loop.
pub struct Backoff<R: Rng> {
    current: Duration,
    config: BackoffConfig,
    rng: R,
}

impl<R: Rng> Backoff<R> {
    pub fn new(config: BackoffConfig, rng: R) -> Self {
        // Config files can hand us any float. A factor below 1.0, NaN, or
        // infinity would corrupt the duration arithmetic, as would a
        // negative or non-finite jitter fraction; hold both to the flat
        // case instead.
        let mut config = config;
        config.factor = if config.factor.is_finite() {
            config.factor.max(1.0)
        } else {
            1.0
        };
        config.jitter_fraction = if config.jitter_fraction.is_finite() {
            config.jitter_fraction.max(0.0)
        } else {
            0.0
        };
        Self {
            current: config.initial.min(config.max),
            config,
            rng,
        }
    }

    /// The next inter-poll delay: the current base plus jitter. Advances
    /// the base geometrically, clamped to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;

        let jitter = if self.config.jitter_fraction > 0.0 {
            let span = base.as_secs_f64() * self.config.jitter_fraction;
            Duration::from_secs_f64(self.rng.gen_range(0.0..=span.max(f64::MIN_POSITIVE)))
        } else {
            Duration::ZERO
        };

        // Clamp in f64 first: a huge factor can overflow the product to
        // infinity, which Duration::from_secs_f64 rejects.
        let grown = (base.as_secs_f64() * self.config.factor).min(self.config.max.as_secs_f64());
        self.current = Duration::from_secs_f64(grown);

        base + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn jitterless(initial_ms: u64, factor: f64, max_ms: u64) -> Backoff<StdRng> {
        Backoff::new(
            BackoffConfig {
                initial: Duration::from_millis(initial_ms),
                factor,
                max: Duration::from_millis(max_ms),
                jitter_fraction: 0.0,
            },
            StdRng::seed_from_u64(7),
        )
    }

    #[test]
    fn test_base_delays_non_decreasing_and_capped() {
        let mut backoff = jitterless(1000, 1.5, 30_000);
        let mut previous = Duration::ZERO;
        for _ in 0..40 {
            let delay = backoff.next_delay();
            assert!(delay >= previous, "delay regressed: {delay:?} < {previous:?}");
            assert!(delay <= Duration::from_millis(30_000));
            previous = delay;
        }
        // The geometric growth must have reached the cap by now.
        assert_eq!(previous, Duration::from_millis(30_000));
    }

    #[test]
    fn test_default_sequence_prefix() {
        let mut backoff = jitterless(1000, 1.5, 30_000);
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2250));
    }

    #[test]
    fn test_jitter_bounded_by_fraction() {
        let mut backoff = Backoff::new(
            BackoffConfig {
                initial: Duration::from_millis(1000),
                factor: 1.5,
                max: Duration::from_millis(30_000),
                jitter_fraction: 0.5,
            },
            StdRng::seed_from_u64(42),
        );
        // First base is exactly 1000ms; the jittered delay stays within
        // [base, base * 1.5].
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(1000));
        assert!(delay <= Duration::from_millis(1500));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let mut a = Backoff::new(BackoffConfig::default(), StdRng::seed_from_u64(9));
        let mut b = Backoff::new(BackoffConfig::default(), StdRng::seed_from_u64(9));
        for _ in 0..10 {
            assert_eq!(a.next_delay(), b.next_delay());
        }
    }

    #[test]
    fn test_initial_larger_than_cap_is_clamped() {
        let mut backoff = jitterless(60_000, 1.5, 30_000);
        assert_eq!(backoff.next_delay(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_degenerate_factor_stays_flat() {
        // Shrinking, NaN, and infinite growth factors all fall back to a
        // constant delay instead of panicking in the duration math.
        for factor in [0.25, -3.0, f64::NAN, f64::INFINITY] {
            let mut backoff = jitterless(1000, factor, 30_000);
            assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
            assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_huge_factor_saturates_at_cap() {
        let mut backoff = jitterless(1000, f64::MAX, 30_000);
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_non_finite_jitter_fraction_is_disabled() {
        let mut backoff = Backoff::new(
            BackoffConfig {
                initial: Duration::from_millis(1000),
                factor: 1.5,
                max: Duration::from_millis(30_000),
                jitter_fraction: f64::INFINITY,
            },
            StdRng::seed_from_u64(3),
        );
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }
}
