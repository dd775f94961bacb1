use rand::Rng;
use std::time::Duration;

/// Computes the wait before a retry.
///
/// Implementations cover fixed waits, exponential growth, randomized jitter
/// and arbitrary closures.
pub trait IntervalFunction: Send + Sync {
    /// Wait before the next attempt.
    ///
    /// `attempt` counts retries already scheduled, so the first retry is 0.
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// Same wait before every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// Wait that grows by `multiplier` with each retry.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Creates an exponential backoff doubling from `initial_interval`.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps the wait.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let interval = self
            .initial_interval
            .mul_f64(self.multiplier.powi(exponent).min(u32::MAX as f64));

        match self.max_interval {
            Some(max) => interval.min(max),
            None => interval,
        }
    }
}

/// Adds jitter to another interval function.
///
/// A base wait `b` becomes a uniform sample from `b * (1 - factor / 2)` to
/// `b * (1 + factor / 2)`, so many callers retrying the same target spread
/// out instead of arriving together.
#[derive(Debug, Clone)]
pub struct RandomizedInterval<I> {
    inner: I,
    randomization_factor: f64,
}

impl<I> RandomizedInterval<I> {
    /// `randomization_factor` is clamped to `0.0..=2.0`.
    pub fn new(inner: I, randomization_factor: f64) -> Self {
        Self {
            inner,
            randomization_factor: randomization_factor.clamp(0.0, 2.0),
        }
    }

    fn randomize(&self, base: Duration) -> Duration {
        if self.randomization_factor == 0.0 || base.is_zero() {
            return base;
        }
        let base = base.as_secs_f64();
        let delta = base * self.randomization_factor / 2.0;
        let sampled = rand::rng().random_range((base - delta)..=(base + delta));
        Duration::from_secs_f64(sampled.max(0.0))
    }
}

impl<I> IntervalFunction for RandomizedInterval<I>
where
    I: IntervalFunction,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        self.randomize(self.inner.next_interval(attempt))
    }
}

/// Interval computed by a closure.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
