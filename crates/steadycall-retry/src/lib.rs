//! Retry decisions for calls that may or may not have reached the backend.
//!
//! The engine answers one question after every attempt: try again, and
//! after how long, or hand the outcome back? The answer depends on where
//! the attempt failed:
//!
//! - a matching result predicate, a circuit-open rejection, a full bulkhead
//!   or a connect failure is always retried, because nothing was processed
//! - with [`RetryConfigBuilder::retry_on_signal_statuses`], so are the
//!   [`status`] codes a server sends when it processed nothing
//! - a response-phase failure (read timeout, broken response) or an error
//!   status is retried only for idempotent calls or calls explicitly marked
//!   retryable
//! - anything else is handed back
//!
//! Results and errors draw from separate attempt budgets, each with its own
//! maximum and backoff. An optional shared [`RetryBudget`] caps retries
//! across calls.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use steadycall_core::FailureKind;
//! use steadycall_retry::{Outcome, RetryConfig, RetryContext, RetryDecision};
//!
//! let config = Arc::new(
//!     RetryConfig::builder()
//!         .max_attempts(3)
//!         .randomized_wait(Duration::from_millis(100), 0.5)
//!         .build(),
//! );
//!
//! // A POST that timed out waiting for its response: not safe to resend.
//! let mut post = RetryContext::new(Arc::clone(&config), false);
//! let decision = post.on_outcome(Outcome::Failure(FailureKind::ResponseFailure));
//! assert_eq!(decision, RetryDecision::DoNotRetry);
//!
//! // A connect failure never reached the backend.
//! let decision = post.on_outcome(Outcome::Failure(FailureKind::ConnectFailure));
//! assert!(decision.is_retry());
//! ```
//!
//! # Streams
//!
//! [`RetryStream`] applies the same decisions to a stream of attempt
//! results, re-subscribing through a factory after each wait.

mod backoff;
mod budget;
mod config;
mod context;
mod events;
mod policy;
mod stream;
pub mod status;

pub use backoff::{ExponentialBackoff, FixedInterval, FnInterval, IntervalFunction, RandomizedInterval};
pub use budget::{RetryBudget, TokenBucketBudget, TokenBucketBuilder};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use context::RetryContext;
pub use events::RetryEvent;
pub use policy::{Outcome, ResultPredicate, RetryDecision, RetryPolicy, RetryTrigger};
pub use stream::{retry_stream, RetryStream};

#[cfg(feature = "metrics")]
use metrics::describe_counter;
#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!("retry_attempts_total", "Total number of retries scheduled");
        describe_counter!(
            "retry_calls_total",
            "Total number of calls finished by the retry engine, by result"
        );
        describe_counter!(
            "retry_budget_exhausted_total",
            "Total number of retries vetoed by an exhausted retry budget"
        );
    });
}
