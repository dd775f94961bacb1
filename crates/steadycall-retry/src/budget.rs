//! Retry budgets.
//!
//! A budget is shared by every call of a client and caps how many retries
//! may happen in total, so a struggling backend is not hit by a multiple of
//! its normal load.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Limits retries across calls.
pub trait RetryBudget: Send + Sync {
    /// Takes one retry token. Returns `false` when the budget is exhausted.
    fn try_withdraw(&self) -> bool;

    /// Returns a token after a call succeeded.
    fn deposit(&self);

    /// Whole tokens currently available.
    fn balance(&self) -> usize;
}

/// Builder for a [`TokenBucketBudget`].
#[derive(Debug, Clone)]
pub struct TokenBucketBuilder {
    tokens_per_second: f64,
    max_tokens: usize,
    initial_tokens: Option<usize>,
    deposit_amount: f64,
}

impl TokenBucketBuilder {
    pub fn new() -> Self {
        Self {
            tokens_per_second: 10.0,
            max_tokens: 100,
            initial_tokens: None,
            deposit_amount: 0.0,
        }
    }

    /// Tokens added per second of wall time.
    ///
    /// Default: 10.0
    pub fn tokens_per_second(mut self, rate: f64) -> Self {
        self.tokens_per_second = rate.max(0.0);
        self
    }

    /// Burst capacity.
    ///
    /// Default: 100
    pub fn max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// Tokens available before any refill.
    ///
    /// Default: same as `max_tokens`
    pub fn initial_tokens(mut self, initial: usize) -> Self {
        self.initial_tokens = Some(initial);
        self
    }

    /// Tokens returned by each successful call, on top of the time-based
    /// refill.
    ///
    /// Default: 0.0
    pub fn deposit_amount(mut self, amount: f64) -> Self {
        self.deposit_amount = amount.max(0.0);
        self
    }

    pub fn build(self) -> Arc<dyn RetryBudget> {
        Arc::new(TokenBucketBudget::new(
            self.tokens_per_second,
            self.max_tokens,
            self.initial_tokens.unwrap_or(self.max_tokens),
            self.deposit_amount,
        ))
    }
}

impl Default for TokenBucketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Token bucket refilled at a fixed rate.
pub struct TokenBucketBudget {
    bucket: Mutex<Bucket>,
    tokens_per_second: f64,
    max_tokens: f64,
    deposit_amount: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketBudget {
    pub fn new(
        tokens_per_second: f64,
        max_tokens: usize,
        initial_tokens: usize,
        deposit_amount: f64,
    ) -> Self {
        let max_tokens = max_tokens as f64;
        Self {
            bucket: Mutex::new(Bucket {
                tokens: (initial_tokens as f64).min(max_tokens),
                last_refill: Instant::now(),
            }),
            tokens_per_second,
            max_tokens,
            deposit_amount,
        }
    }

    pub fn builder() -> TokenBucketBuilder {
        TokenBucketBuilder::new()
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.tokens_per_second).min(self.max_tokens);
        bucket.last_refill = now;
    }
}

impl RetryBudget for TokenBucketBudget {
    fn try_withdraw(&self) -> bool {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn deposit(&self) {
        if self.deposit_amount == 0.0 {
            return;
        }
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens = (bucket.tokens + self.deposit_amount).min(self.max_tokens);
    }

    fn balance(&self) -> usize {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        bucket.tokens as usize
    }
}

impl std::fmt::Debug for TokenBucketBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketBudget")
            .field("tokens_per_second", &self.tokens_per_second)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
